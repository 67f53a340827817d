//! ZIP central-directory offset rewriter (component G).
//!
//! Runs after the assembler has spliced in the script chunk and appended the
//! wrapped-archive IDAT but before the trailing IDAT's CRC is finalized.
//! Every local-header offset the central directory records must be updated
//! to its new absolute position inside the polyglot buffer.

use super::{CENTRAL_DIR_SIG, EOCD_SIG, LOCAL_HEADER_SIG};
use crate::limits::EOCD_COMMENT_LENGTH_EXTENSION;
use crate::utils::{find_signature, find_signature_reverse, read_u16, write_u16, write_u32};
use crate::{PdvzipError, PdvzipResult};

/// Rewrite every central-directory local-header offset in `buffer` (in
/// place) to its new absolute position, given `archive_start`, the absolute
/// offset of the wrapped archive's ZIP local-header signature inside
/// `buffer`.
pub fn rewrite_zip_offsets(buffer: &mut [u8], archive_start: usize) -> PdvzipResult<()> {
    let eocd = find_signature_reverse(buffer, &EOCD_SIG)
        .ok_or_else(|| PdvzipError::Invariant("end-of-central-directory signature not found".into()))?;

    let record_count = read_u16(buffer, eocd + 10, false)? as usize;

    let comment_len = read_u16(buffer, eocd + 20, false)?;
    write_u16(buffer, eocd + 21, comment_len.wrapping_add(EOCD_COMMENT_LENGTH_EXTENSION), false)?;

    let mut search_end = buffer.len();
    let mut central_dir_start = eocd;
    for _ in 0..record_count {
        let pos = find_signature_reverse(&buffer[..search_end], &CENTRAL_DIR_SIG)
            .ok_or_else(|| PdvzipError::Invariant("central directory signature not found".into()))?;
        central_dir_start = pos;
        search_end = pos;
    }

    write_u32(buffer, eocd + 19, central_dir_start as u32, false)?;

    let mut local_cursor = archive_start;
    let mut central_entry_offset = central_dir_start;
    for i in 0..record_count {
        write_u32(buffer, central_entry_offset + 45, local_cursor as u32, false)?;
        if i + 1 < record_count {
            local_cursor = find_signature(buffer, local_cursor + 4, &LOCAL_HEADER_SIG)
                .ok_or_else(|| PdvzipError::Invariant("next local header signature not found".into()))?;
            central_entry_offset = find_signature(buffer, central_entry_offset + 4, &CENTRAL_DIR_SIG)
                .ok_or_else(|| PdvzipError::Invariant("next central directory entry not found".into()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::read_u32;

    /// Build a minimal two-entry ZIP (headers only, no real compressed
    /// data) to exercise the reverse-search/forward-walk logic.
    fn two_entry_zip() -> Vec<u8> {
        let mut buf = Vec::new();

        let local1 = buf.len();
        buf.extend_from_slice(&LOCAL_HEADER_SIG);
        buf.extend_from_slice(&[0u8; 22]);
        buf.extend_from_slice(&3u16.to_le_bytes()); // name len
        buf.extend_from_slice(&[0, 0]); // extra len
        buf.extend_from_slice(b"aaa");

        let local2 = buf.len();
        buf.extend_from_slice(&LOCAL_HEADER_SIG);
        buf.extend_from_slice(&[0u8; 22]);
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(b"bbb");

        let cd_start = buf.len();
        for &local_offset in &[local1, local2] {
            buf.extend_from_slice(&CENTRAL_DIR_SIG);
            buf.extend_from_slice(&[0u8; 24]); // up to filename-length field at entry+28
            buf.extend_from_slice(&3u16.to_le_bytes()); // name len at +28
            buf.extend_from_slice(&[0u8; 12]); // extra/comment lens, disk, attrs, up to +42
            buf.extend_from_slice(&(local_offset as u32).to_le_bytes()); // local offset placeholder at +42
            buf.extend_from_slice(b"xxx");
        }
        let cd_size = buf.len() - cd_start;

        buf.extend_from_slice(&EOCD_SIG);
        buf.extend_from_slice(&[0u8; 4]); // this disk number, disk with start of CD
        buf.extend_from_slice(&2u16.to_le_bytes()); // total records on this disk
        buf.extend_from_slice(&2u16.to_le_bytes()); // total records
        buf.extend_from_slice(&(cd_size as u32).to_le_bytes());
        buf.extend_from_slice(&(cd_start as u32).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // comment length

        buf
    }

    #[test]
    fn rewrites_local_offsets_and_extends_comment_length() {
        let mut buf = two_entry_zip();
        rewrite_zip_offsets(&mut buf, 0).unwrap();

        let eocd = find_signature_reverse(&buf, &EOCD_SIG).unwrap();
        let comment_len = read_u16(&buf, eocd + 20, false).unwrap();
        assert_eq!(comment_len, EOCD_COMMENT_LENGTH_EXTENSION);

        let cd_start = read_u32(&buf, eocd + 16, false).unwrap() as usize;
        assert_eq!(&buf[cd_start..cd_start + 4], &CENTRAL_DIR_SIG);

        let first_local = read_u32(&buf, cd_start + 42, false).unwrap() as usize;
        assert_eq!(&buf[first_local..first_local + 4], &LOCAL_HEADER_SIG);

        let second_entry = find_signature(&buf, cd_start + 4, &CENTRAL_DIR_SIG).unwrap();
        let second_local = read_u32(&buf, second_entry + 42, false).unwrap() as usize;
        assert_eq!(&buf[second_local..second_local + 4], &LOCAL_HEADER_SIG);
        assert_ne!(first_local, second_local);
    }
}
