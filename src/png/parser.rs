//! Low-level PNG chunk parsing using manual byte slicing.

use crate::utils::{crc32, read_u32, is_png_signature};
use crate::{PdvzipError, PdvzipResult};

/// A single PNG chunk as it appears on disk.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub length: u32,
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
    pub crc: u32,
    /// Offset of the chunk's length field, relative to the start of the file.
    pub start_offset: usize,
}

/// IHDR fields relevant to the preparer.
#[derive(Debug, Clone, Copy)]
pub struct IhdrInfo {
    pub width: u32,
    pub height: u32,
    pub color_type: u8,
}

/// A PNG file, chunk-parsed and CRC-verified.
#[derive(Debug, Clone)]
pub struct ParsedPng {
    pub chunks: Vec<Chunk>,
}

/// Parse every chunk in `data`, verifying the PNG signature and each chunk's CRC.
///
/// Stops after IEND; trailing bytes beyond it are not an error (the final
/// polyglot appends a wrapped-archive IDAT and re-emits its own IEND, so this
/// parser only needs to understand well-formed, not-yet-polyglot input).
pub fn parse_png_chunks(data: &[u8]) -> PdvzipResult<ParsedPng> {
    if !is_png_signature(data) {
        return Err(PdvzipError::BadImage("invalid PNG signature".into()));
    }

    let mut offset = 8;
    let mut chunks = Vec::new();

    while offset + 12 <= data.len() {
        let start_offset = offset;
        let length = read_u32(data, offset, true)?;
        offset += 4;

        let chunk_type: [u8; 4] = data
            .get(offset..offset + 4)
            .ok_or_else(|| PdvzipError::BadImage("truncated chunk type".into()))?
            .try_into()
            .expect("slice of len 4");
        offset += 4;

        let data_end = offset + length as usize;
        if data_end + 4 > data.len() {
            return Err(PdvzipError::BadImage("chunk data extends beyond file".into()));
        }
        let chunk_data = data[offset..data_end].to_vec();
        offset = data_end;

        let crc = read_u32(data, offset, true)?;
        offset += 4;

        let mut crc_input = Vec::with_capacity(4 + chunk_data.len());
        crc_input.extend_from_slice(&chunk_type);
        crc_input.extend_from_slice(&chunk_data);
        if crc32(&crc_input) != crc {
            return Err(PdvzipError::BadImage(format!(
                "CRC mismatch in {} chunk",
                String::from_utf8_lossy(&chunk_type)
            )));
        }

        let is_iend = &chunk_type == b"IEND";
        chunks.push(Chunk { length, chunk_type, data: chunk_data, crc, start_offset });
        if is_iend {
            break;
        }
    }

    if chunks.is_empty() {
        return Err(PdvzipError::BadImage("no PNG chunks found".into()));
    }
    Ok(ParsedPng { chunks })
}

/// Read the IHDR fields of interest (width, height, color type) directly
/// from the raw buffer, without going through [`parse_png_chunks`].
pub fn read_ihdr(data: &[u8]) -> PdvzipResult<IhdrInfo> {
    const MIN_SIZE: usize = 33;
    const IHDR_NAME_OFFSET: usize = 12;
    const WIDTH_OFFSET: usize = 16;
    const HEIGHT_OFFSET: usize = 20;
    const COLOR_TYPE_OFFSET: usize = 25;

    if data.len() < MIN_SIZE {
        return Err(PdvzipError::BadImage("file too small to contain an IHDR chunk".into()));
    }
    if !is_png_signature(data) {
        return Err(PdvzipError::BadImage("invalid PNG signature".into()));
    }
    if &data[IHDR_NAME_OFFSET..IHDR_NAME_OFFSET + 4] != b"IHDR" {
        return Err(PdvzipError::BadImage("first chunk is not IHDR".into()));
    }

    Ok(IhdrInfo {
        width: read_u32(data, WIDTH_OFFSET, true)?,
        height: read_u32(data, HEIGHT_OFFSET, true)?,
        color_type: data[COLOR_TYPE_OFFSET],
    })
}

/// Find the first IDAT chunk.
pub fn find_first_idat(png: &ParsedPng) -> PdvzipResult<&Chunk> {
    png.chunks
        .iter()
        .find(|c| &c.chunk_type == b"IDAT")
        .ok_or(PdvzipError::BadImage("no IDAT chunk found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_png() -> Vec<u8> {
        let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

        let ihdr_data = [
            0x00, 0x00, 0x00, 0x01, // width = 1
            0x00, 0x00, 0x00, 0x01, // height = 1
            0x08, 0x02, 0x00, 0x00, 0x00,
        ];
        push_chunk(&mut png, b"IHDR", &ihdr_data);

        let idat_data = [0x78, 0x9C, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01];
        push_chunk(&mut png, b"IDAT", &idat_data);

        push_chunk(&mut png, b"IEND", &[]);
        png
    }

    fn push_chunk(png: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
        png.extend_from_slice(&(data.len() as u32).to_be_bytes());
        png.extend_from_slice(name);
        png.extend_from_slice(data);
        let mut crc_input = name.to_vec();
        crc_input.extend_from_slice(data);
        png.extend_from_slice(&crc32(&crc_input).to_be_bytes());
    }

    #[test]
    fn parses_minimal_png() {
        let parsed = parse_png_chunks(&minimal_png()).unwrap();
        assert_eq!(parsed.chunks.len(), 3);
        assert_eq!(&parsed.chunks[0].chunk_type, b"IHDR");
    }

    #[test]
    fn rejects_bad_signature() {
        let mut data = minimal_png();
        data[0] = 0x00;
        assert!(matches!(parse_png_chunks(&data), Err(PdvzipError::BadImage(_))));
    }

    #[test]
    fn rejects_crc_mismatch() {
        let mut data = minimal_png();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(parse_png_chunks(&data), Err(PdvzipError::BadImage(_))));
    }

    #[test]
    fn reads_ihdr_fields() {
        let ihdr = read_ihdr(&minimal_png()).unwrap();
        assert_eq!(ihdr.width, 1);
        assert_eq!(ihdr.height, 1);
        assert_eq!(ihdr.color_type, 2);
    }

    #[test]
    fn finds_first_idat() {
        let parsed = parse_png_chunks(&minimal_png()).unwrap();
        let idat = find_first_idat(&parsed).unwrap();
        assert_eq!(&idat.chunk_type, b"IDAT");
    }
}
