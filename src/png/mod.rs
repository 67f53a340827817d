//! The cover-image preparer (component C): signature/size gates, color-type
//! and dimension validation, truecolor-to-indexed palette downgrade,
//! iterative hostile-byte-clearing downscale, and ancillary-chunk pruning.

pub mod parser;
pub mod recolor;

use crate::limits::{
    HOSTILE_BYTES, IHDR_SANITIZE_END, IHDR_SANITIZE_START, INDEXED_DIM_RANGE, MAX_IMAGE_SIZE,
    MIN_IMAGE_SIZE, TRUECOLOR_DIM_RANGE,
};
use crate::utils::{crc32, is_png_signature};
use crate::{PdvzipError, PdvzipResult};
use parser::{parse_png_chunks, IhdrInfo};

const COLOR_TYPE_TRUECOLOR: u8 = 2;
const COLOR_TYPE_INDEXED: u8 = 3;
const COLOR_TYPE_TRUECOLOR_ALPHA: u8 = 6;
const PNG_SIGNATURE_LEN: usize = 8;
const IEND_TRAILER: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44];

/// Run the full §4.C algorithm over a candidate cover image, returning the
/// normalized buffer or a `BadImage` error.
pub fn prepare_cover_image(raw: Vec<u8>) -> PdvzipResult<Vec<u8>> {
    signature_and_size_gate(&raw)?;
    let ihdr = parser::read_ihdr(&raw)?;
    color_and_dimension_gate(&ihdr)?;

    let original_color_type = ihdr.color_type;
    let mut buffer = raw;
    let mut color_type = ihdr.color_type;

    if color_type == COLOR_TYPE_TRUECOLOR || color_type == COLOR_TYPE_TRUECOLOR_ALPHA {
        if let Some(downgraded) = try_palette_downgrade(&buffer)? {
            buffer = downgraded;
            color_type = COLOR_TYPE_INDEXED;
        }
    }

    buffer = clear_hostile_ihdr_bytes(buffer, color_type)?;
    prune_ancillary_chunks(&buffer, original_color_type)
}

fn signature_and_size_gate(data: &[u8]) -> PdvzipResult<()> {
    if data.len() < MIN_IMAGE_SIZE {
        return Err(PdvzipError::BadImage(format!(
            "cover image is {} bytes, minimum is {MIN_IMAGE_SIZE}",
            data.len()
        )));
    }
    if data.len() > MAX_IMAGE_SIZE {
        return Err(PdvzipError::BadImage(format!(
            "cover image is {} bytes, maximum is {MAX_IMAGE_SIZE}",
            data.len()
        )));
    }
    if !is_png_signature(data) {
        return Err(PdvzipError::BadImage("missing PNG signature".into()));
    }
    if !data.ends_with(&IEND_TRAILER) {
        return Err(PdvzipError::BadImage("missing IEND trailer".into()));
    }
    Ok(())
}

fn color_and_dimension_gate(ihdr: &IhdrInfo) -> PdvzipResult<()> {
    match ihdr.color_type {
        COLOR_TYPE_TRUECOLOR | COLOR_TYPE_TRUECOLOR_ALPHA => {
            if !TRUECOLOR_DIM_RANGE.contains(&ihdr.width) || !TRUECOLOR_DIM_RANGE.contains(&ihdr.height) {
                return Err(PdvzipError::BadImage(format!(
                    "truecolor dimensions {}x{} outside {:?}",
                    ihdr.width, ihdr.height, TRUECOLOR_DIM_RANGE
                )));
            }
        }
        COLOR_TYPE_INDEXED => {
            if !INDEXED_DIM_RANGE.contains(&ihdr.width) || !INDEXED_DIM_RANGE.contains(&ihdr.height) {
                return Err(PdvzipError::BadImage(format!(
                    "indexed dimensions {}x{} outside {:?}",
                    ihdr.width, ihdr.height, INDEXED_DIM_RANGE
                )));
            }
        }
        other => return Err(PdvzipError::BadImage(format!("unsupported color type {other}"))),
    }
    Ok(())
}

/// Step 3: if the image is truecolor and has at most 256 unique colors,
/// re-encode it as 8-bit indexed using the exact unique set as the palette.
fn try_palette_downgrade(data: &[u8]) -> PdvzipResult<Option<Vec<u8>>> {
    let decoded = recolor::decode_rgba(data)?;
    match recolor::color_stats(&decoded.rgba) {
        Some((palette, indices)) => {
            let encoded = recolor::encode_indexed(decoded.width, decoded.height, &palette, &indices)?;
            Ok(Some(encoded))
        }
        None => Ok(None),
    }
}

/// Step 4: repeatedly downscale by one pixel until no byte in the IHDR
/// sanitization window is hostile, or either dimension would reach 1.
fn clear_hostile_ihdr_bytes(mut buffer: Vec<u8>, color_type: u8) -> PdvzipResult<Vec<u8>> {
    loop {
        if !ihdr_window_is_hostile(&buffer)? {
            return Ok(buffer);
        }

        let ihdr = parser::read_ihdr(&buffer)?;
        if ihdr.width <= 1 || ihdr.height <= 1 {
            return Err(PdvzipError::BadImage(
                "hostile IHDR bytes remain at minimum dimensions".into(),
            ));
        }

        buffer = downscale_one_pixel(&buffer, color_type)?;
    }
}

fn ihdr_window_is_hostile(buffer: &[u8]) -> PdvzipResult<bool> {
    let window = buffer
        .get(IHDR_SANITIZE_START..=IHDR_SANITIZE_END)
        .ok_or_else(|| PdvzipError::Invariant("IHDR sanitization window out of bounds".into()))?;
    Ok(window.iter().any(|b| HOSTILE_BYTES.contains(b)))
}

fn downscale_one_pixel(buffer: &[u8], color_type: u8) -> PdvzipResult<Vec<u8>> {
    match color_type {
        COLOR_TYPE_INDEXED => {
            let (width, height, palette, indices) = recolor::decode_indexed(buffer)?;
            let (w, h, indices) = recolor::downscale_indexed_nearest(width, height, &indices);
            recolor::encode_indexed_from_source_palette(w, h, &palette, &indices)
        }
        _ => {
            let decoded = recolor::decode_rgba(buffer)?;
            let (w, h, rgba) = recolor::downscale_rgba_bilinear(decoded.width, decoded.height, &decoded.rgba);
            recolor::encode_rgba(w, h, &rgba)
        }
    }
}

/// Step 5: keep only the signature + IHDR, PLTE (indexed only), tRNS (indexed,
/// or the image was originally truecolor-alpha before any palette downgrade),
/// every IDAT, and the final IEND. All other ancillary chunks are discarded.
fn prune_ancillary_chunks(buffer: &[u8], original_color_type: u8) -> PdvzipResult<Vec<u8>> {
    let parsed = parse_png_chunks(buffer)?;
    let ihdr = parser::read_ihdr(buffer)?;
    let keep_trns = ihdr.color_type == COLOR_TYPE_INDEXED || original_color_type == COLOR_TYPE_TRUECOLOR_ALPHA;

    let mut out = buffer[..33].to_vec();
    let mut has_plte = false;

    for chunk in &parsed.chunks {
        match &chunk.chunk_type {
            b"PLTE" if ihdr.color_type == COLOR_TYPE_INDEXED => {
                has_plte = true;
                write_chunk(&mut out, b"PLTE", &chunk.data);
            }
            b"tRNS" if keep_trns => write_chunk(&mut out, b"tRNS", &chunk.data),
            b"IDAT" => write_chunk(&mut out, b"IDAT", &chunk.data),
            _ => {}
        }
    }

    if ihdr.color_type == COLOR_TYPE_INDEXED && !has_plte {
        return Err(PdvzipError::BadImage("indexed image has no PLTE chunk".into()));
    }

    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(data);
    let mut crc_input = name.to_vec();
    crc_input.extend_from_slice(data);
    out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crc32;

    fn push_chunk(png: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
        png.extend_from_slice(&(data.len() as u32).to_be_bytes());
        png.extend_from_slice(name);
        png.extend_from_slice(data);
        let mut crc_input = name.to_vec();
        crc_input.extend_from_slice(data);
        png.extend_from_slice(&crc32(&crc_input).to_be_bytes());
    }

    fn ihdr_data(width: u32, height: u32, color_type: u8) -> Vec<u8> {
        let mut d = Vec::with_capacity(13);
        d.extend_from_slice(&width.to_be_bytes());
        d.extend_from_slice(&height.to_be_bytes());
        d.extend_from_slice(&[8, color_type, 0, 0, 0]);
        d
    }

    #[test]
    fn rejects_undersized_file() {
        assert!(matches!(prepare_cover_image(vec![0u8; 10]), Err(PdvzipError::BadImage(_))));
    }

    #[test]
    fn rejects_out_of_range_truecolor_dimensions() {
        assert!(color_and_dimension_gate(&IhdrInfo { width: 10, height: 10, color_type: 2 }).is_err());
    }

    #[test]
    fn accepts_in_range_indexed_dimensions() {
        assert!(color_and_dimension_gate(&IhdrInfo { width: 68, height: 4096, color_type: 3 }).is_ok());
    }

    #[test]
    fn prunes_ancillary_chunks_and_keeps_idat() {
        let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        push_chunk(&mut png, b"IHDR", &ihdr_data(68, 68, COLOR_TYPE_INDEXED));
        push_chunk(&mut png, b"PLTE", &[0, 0, 0, 255, 255, 255]);
        push_chunk(&mut png, b"tEXt", b"Comment\0hi");
        push_chunk(&mut png, b"IDAT", &[0x78, 0x9C, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01]);
        while png.len() < MIN_IMAGE_SIZE - 12 {
            push_chunk(&mut png, b"tEXt", b"pad");
        }
        push_chunk(&mut png, b"IEND", &[]);

        let prepared = prepare_cover_image(png).unwrap();

        assert!(prepared.windows(4).any(|w| w == b"PLTE"));
        assert!(prepared.windows(4).any(|w| w == b"IDAT"));
        assert!(!prepared.windows(4).any(|w| w == b"tEXt"));
        assert!(prepared.ends_with(&IEND_TRAILER));
    }
}
