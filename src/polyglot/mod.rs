//! Assembler (component H): the top-level pipeline orchestrator wiring
//! together the image preparer, archive wrapper, script selector/builder,
//! and ZIP-offset rewriter into one finished polyglot buffer.

use crate::png::parser::{find_first_idat, parse_png_chunks};
use crate::utils::crc32;
use crate::zip::offsets::rewrite_zip_offsets;
use crate::zip::{determine_file_type, wrap_archive};
use crate::{png, scripts, PdvzipError, PdvzipResult};

/// Build the finished polyglot buffer from a raw cover-image buffer and a
/// raw archive buffer, given the user's per-platform argument strings and
/// whether the archive was supplied with a `.jar` extension.
pub fn build_polyglot(
    cover_image: Vec<u8>,
    archive: Vec<u8>,
    is_jar: bool,
    args_linux: &str,
    args_windows: &str,
) -> PdvzipResult<Vec<u8>> {
    let prepared_image = png::prepare_cover_image(cover_image)?;
    let wrapped_archive = wrap_archive(&archive)?;
    let (file_type, filename) = determine_file_type(&wrapped_archive, is_jar)?;
    let script_chunk = scripts::build_script_chunk(file_type, &filename, args_linux, args_windows)?;

    let mut buffer = assemble(&prepared_image, &script_chunk, &wrapped_archive)?;
    patch_wrapped_archive_crc(&mut buffer, wrapped_archive.len())?;

    let archive_local_start = buffer.len() - wrapped_archive.len() + 8;
    rewrite_zip_offsets(&mut buffer, archive_local_start)?;

    Ok(buffer)
}

/// Splice the script chunk before the first IDAT and the wrapped archive
/// before IEND.
fn assemble(prepared_image: &[u8], script_chunk: &[u8], wrapped_archive: &[u8]) -> PdvzipResult<Vec<u8>> {
    let parsed = parse_png_chunks(prepared_image)?;
    let first_idat = find_first_idat(&parsed)?;
    let insert_at = first_idat.start_offset;

    let mut buffer = Vec::with_capacity(prepared_image.len() + script_chunk.len() + wrapped_archive.len());
    buffer.extend_from_slice(&prepared_image[..insert_at]);
    buffer.extend_from_slice(script_chunk);
    buffer.extend_from_slice(&prepared_image[insert_at..prepared_image.len() - 12]);
    buffer.extend_from_slice(wrapped_archive);
    buffer.extend_from_slice(&prepared_image[prepared_image.len() - 12..]);

    Ok(buffer)
}

/// Compute and patch the trailing wrapped-archive IDAT's CRC, now that it
/// sits at its final position in `buffer`.
fn patch_wrapped_archive_crc(buffer: &mut [u8], wrapped_len: usize) -> PdvzipResult<()> {
    let end = buffer.len() - 12; // start of IEND's length field, one past the CRC placeholder
    let wrapped_start = end - wrapped_len;
    let crc_input_start = wrapped_start + 4; // skip the length field, start at "IDAT"
    let crc_input_end = end - 4; // name ‖ data ends right before the CRC placeholder

    if crc_input_end < crc_input_start {
        return Err(PdvzipError::Invariant("wrapped archive shorter than its own header".into()));
    }

    let crc = crc32(&buffer[crc_input_start..crc_input_end]);
    buffer[crc_input_end..end].copy_from_slice(&crc.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crc32 as crc;

    fn push_chunk(png: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
        png.extend_from_slice(&(data.len() as u32).to_be_bytes());
        png.extend_from_slice(name);
        png.extend_from_slice(data);
        let mut crc_input = name.to_vec();
        crc_input.extend_from_slice(data);
        png.extend_from_slice(&crc(&crc_input).to_be_bytes());
    }

    fn minimal_indexed_png(width: u32, height: u32) -> Vec<u8> {
        let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
        push_chunk(&mut png, b"IHDR", &ihdr);
        push_chunk(&mut png, b"PLTE", &[0, 0, 0, 255, 255, 255]);
        push_chunk(&mut png, b"IDAT", &[0x78, 0x9C, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01]);
        push_chunk(&mut png, b"IEND", &[]);
        png
    }

    fn minimal_zip(name: &str) -> Vec<u8> {
        let mut zip = vec![0x50, 0x4B, 0x03, 0x04];
        zip.extend_from_slice(&[0u8; 22]);
        zip.extend_from_slice(&(name.len() as u16).to_le_bytes());
        zip.extend_from_slice(&[0, 0]);
        zip.extend_from_slice(name.as_bytes());

        let cd_start = zip.len();
        zip.extend_from_slice(&[0x50, 0x4B, 0x01, 0x02]);
        zip.extend_from_slice(&[0u8; 24]);
        zip.extend_from_slice(&(name.len() as u16).to_le_bytes());
        zip.extend_from_slice(&[0u8; 12]);
        zip.extend_from_slice(&0u32.to_le_bytes());
        zip.extend_from_slice(name.as_bytes());
        let cd_size = zip.len() - cd_start;

        zip.extend_from_slice(&[0x50, 0x4B, 0x05, 0x06]);
        zip.extend_from_slice(&[0u8; 4]);
        zip.extend_from_slice(&1u16.to_le_bytes());
        zip.extend_from_slice(&(cd_size as u32).to_le_bytes());
        zip.extend_from_slice(&(cd_start as u32).to_le_bytes());
        zip.extend_from_slice(&0u16.to_le_bytes());
        zip
    }

    #[test]
    fn builds_end_to_end_polyglot() {
        let image = minimal_indexed_png(68, 68);
        let archive = minimal_zip("clip.mp4");

        let polyglot = build_polyglot(image, archive, false, "", "").unwrap();

        assert_eq!(&polyglot[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(&polyglot[polyglot.len() - 8..], &[0, 0, 0, 0, 0x49, 0x45, 0x4E, 0x44]);

        let zip_sig_pos = polyglot.windows(4).position(|w| w == [0x50, 0x4B, 0x03, 0x04]);
        assert!(zip_sig_pos.is_some());
    }
}
