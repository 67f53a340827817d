//! CRC32 engine and the big-/little-endian byte-field codec.
//!
//! The two endiannesses (big for PNG, little for ZIP) are never unified into
//! a single helper without an explicit `big_endian` parameter -- confusing
//! them is the single most common source of bugs in this kind of byte-level
//! format surgery.

use crate::{PdvzipError, PdvzipResult};
use crc32fast::Hasher;

/// CRC32 (IEEE 802.3, poly 0xEDB88320) over an arbitrary byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Read a 16-bit integer at `index` in the given endianness.
pub fn read_u16(buffer: &[u8], index: usize, big_endian: bool) -> PdvzipResult<u16> {
    let bytes: [u8; 2] = buffer
        .get(index..index + 2)
        .ok_or_else(|| out_of_bounds("read_u16", index, buffer.len()))?
        .try_into()
        .expect("slice of len 2");
    Ok(if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    })
}

/// Read a 32-bit integer at `index` in the given endianness.
pub fn read_u32(buffer: &[u8], index: usize, big_endian: bool) -> PdvzipResult<u32> {
    let bytes: [u8; 4] = buffer
        .get(index..index + 4)
        .ok_or_else(|| out_of_bounds("read_u32", index, buffer.len()))?
        .try_into()
        .expect("slice of len 4");
    Ok(if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    })
}

/// Write a 16-bit integer at `index`.
///
/// On little-endian writes, `index` denotes the *most significant* byte
/// position and bytes are written with decreasing index -- this mirrors the
/// ZIP convention of "write a field whose last byte sits at a known offset".
pub fn write_u16(buffer: &mut [u8], index: usize, value: u16, big_endian: bool) -> PdvzipResult<()> {
    let start = write_start(index, 2, big_endian, buffer.len())?;
    let bytes = if big_endian { value.to_be_bytes() } else { value.to_le_bytes() };
    buffer[start..start + 2].copy_from_slice(&bytes);
    Ok(())
}

/// Write a 32-bit integer at `index`; see [`write_u16`] for the endianness convention.
pub fn write_u32(buffer: &mut [u8], index: usize, value: u32, big_endian: bool) -> PdvzipResult<()> {
    let start = write_start(index, 4, big_endian, buffer.len())?;
    let bytes = if big_endian { value.to_be_bytes() } else { value.to_le_bytes() };
    buffer[start..start + 4].copy_from_slice(&bytes);
    Ok(())
}

fn write_start(index: usize, len: usize, big_endian: bool, buffer_len: usize) -> PdvzipResult<usize> {
    let start = if big_endian {
        index
    } else {
        index.checked_sub(len - 1).ok_or_else(|| out_of_bounds("write", index, buffer_len))?
    };
    if start + len > buffer_len {
        return Err(out_of_bounds("write", index, buffer_len));
    }
    Ok(start)
}

/// Forward linear search for `needle` in `buffer`, starting at `start`.
pub fn find_signature(buffer: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    if start >= buffer.len() {
        return None;
    }
    buffer[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + start)
}

/// Reverse linear search for `needle` in `buffer`, scanning from the end.
///
/// Used to locate the ZIP end-of-central-directory and central-directory
/// signatures, avoiding false matches inside embedded image bytes that
/// happen to precede them.
pub fn find_signature_reverse(buffer: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || buffer.len() < needle.len() {
        return None;
    }
    buffer
        .windows(needle.len())
        .rposition(|w| w == needle)
}

/// Validate the 8-byte PNG signature at the start of `data`.
pub fn is_png_signature(data: &[u8]) -> bool {
    data.len() >= 8 && data[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
}

fn out_of_bounds(op: &str, index: usize, len: usize) -> PdvzipError {
    PdvzipError::Invariant(format!("{op}: index {index} out of bounds for buffer of length {len}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_known_vector() {
        assert_eq!(crc32(b"Hello, World!"), 0x4AC2_B0C9);
    }

    #[test]
    fn big_endian_round_trip() {
        let mut buf = vec![0u8; 4];
        write_u32(&mut buf, 0, 0xDEAD_BEEF, true).unwrap();
        assert_eq!(read_u32(&buf, 0, true).unwrap(), 0xDEAD_BEEF);
        assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn little_endian_round_trip() {
        let mut buf = vec![0u8; 4];
        write_u32(&mut buf, 0, 0xDEAD_BEEF, false).unwrap();
        assert_eq!(read_u32(&buf, 0, false).unwrap(), 0xDEAD_BEEF);
        assert_eq!(buf, [0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn little_endian_write_targets_most_significant_byte_position() {
        // index denotes the MSB position; bytes are written at decreasing index.
        let mut buf = vec![0u8; 4];
        write_u16(&mut buf, 1, 0x0102, false).unwrap();
        assert_eq!(buf, [0x02, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn out_of_bounds_read_is_invariant_error() {
        let buf = [0u8; 2];
        assert!(matches!(read_u32(&buf, 0, true), Err(PdvzipError::Invariant(_))));
    }

    #[test]
    fn find_signature_forward_and_reverse() {
        let buf = [0x00, 0x50, 0x4B, 0x03, 0x04, 0x00, 0x50, 0x4B, 0x03, 0x04];
        assert_eq!(find_signature(&buf, 0, &[0x50, 0x4B, 0x03, 0x04]), Some(1));
        assert_eq!(find_signature(&buf, 2, &[0x50, 0x4B, 0x03, 0x04]), Some(6));
        assert_eq!(find_signature_reverse(&buf, &[0x50, 0x4B, 0x03, 0x04]), Some(6));
    }

    #[test]
    fn png_signature_validation() {
        assert!(is_png_signature(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
        assert!(!is_png_signature(&[0x00, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn be_round_trip(value: u32) {
            let mut buf = vec![0u8; 4];
            write_u32(&mut buf, 0, value, true).unwrap();
            prop_assert_eq!(read_u32(&buf, 0, true).unwrap(), value);
        }

        #[test]
        fn le_round_trip(value: u32) {
            let mut buf = vec![0u8; 4];
            write_u32(&mut buf, 0, value, false).unwrap();
            prop_assert_eq!(read_u32(&buf, 0, false).unwrap(), value);
        }

        #[test]
        fn crc32_is_deterministic(data: Vec<u8>) {
            prop_assert_eq!(crc32(&data), crc32(&data));
        }
    }
}
