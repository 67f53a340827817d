//! Archive wrapping (component D) and first-entry file-type selection
//! (component E).

pub mod offsets;

use crate::limits::{MAX_ARCHIVE_SIZE, MIN_ARCHIVE_SIZE, MIN_FIRST_ENTRY_NAME_LEN};
use crate::{PdvzipError, PdvzipResult};

pub const LOCAL_HEADER_SIG: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
pub const CENTRAL_DIR_SIG: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];
pub const EOCD_SIG: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// Offset of the wrapped-archive's ZIP signature within the `IDAT` envelope.
const WRAPPED_ARCHIVE_OFFSET: usize = 8;

/// Wrap raw archive bytes in a synthetic trailing `IDAT` chunk envelope
/// (component D). Layout: `[len:4][b"IDAT"][archive bytes][crc placeholder:4]`.
pub fn wrap_archive(archive: &[u8]) -> PdvzipResult<Vec<u8>> {
    if archive.len() < MIN_ARCHIVE_SIZE || archive.len() > MAX_ARCHIVE_SIZE {
        return Err(PdvzipError::BadArchive(format!(
            "archive is {} bytes, expected {MIN_ARCHIVE_SIZE}..={MAX_ARCHIVE_SIZE}",
            archive.len()
        )));
    }
    if archive.get(0..4) != Some(&LOCAL_HEADER_SIG) {
        return Err(PdvzipError::BadArchive("first archive entry is not a ZIP local header".into()));
    }

    let mut wrapped = Vec::with_capacity(archive.len() + 12);
    wrapped.extend_from_slice(&(archive.len() as u32).to_be_bytes());
    wrapped.extend_from_slice(b"IDAT");
    wrapped.extend_from_slice(archive);
    wrapped.extend_from_slice(&[0u8; 4]); // CRC placeholder, patched by the assembler

    if wrapped.get(WRAPPED_ARCHIVE_OFFSET..WRAPPED_ARCHIVE_OFFSET + 4) != Some(&LOCAL_HEADER_SIG) {
        return Err(PdvzipError::Invariant("wrapped archive signature mismatch".into()));
    }
    Ok(wrapped)
}

/// The handler family selected for the archive's first entry. Ordinals match
/// the source project's `case_map` keys and are load-bearing: the extension
/// table lookup collapses indices `0..=29` to `VIDEO_AUDIO` via
/// `max(table_index, VIDEO_AUDIO as usize)`, not by assuming the table is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    VideoAudio = 29,
    Pdf = 30,
    Python = 31,
    PowerShell = 32,
    BashShell = 33,
    WindowsExecutable = 34,
    UnknownFileType = 35,
    Folder = 36,
    LinuxExecutable = 37,
    Jar = 38,
}

/// Extension table; index `i` collapses to `VIDEO_AUDIO` whenever
/// `i < FileType::VideoAudio as usize`.
pub const EXTENSION_LIST: [&str; 35] = [
    "mp4", "mp3", "wav", "mpg", "webm", "flac", "3gp", "aac", "aiff", "aif", "alac", "ape", "avchd",
    "avi", "dsd", "divx", "f4v", "flv", "m4a", "m4v", "mkv", "mov", "midi", "mpeg", "ogg", "pcm",
    "swf", "wma", "wmv", "xvid", "pdf", "py", "ps1", "sh", "exe",
];

/// Offsets of the first local record's filename-length byte and filename,
/// relative to the start of the *wrapped* ([`wrap_archive`]) buffer. These
/// already account for the 8-byte `[len][IDAT]` envelope prefix, so they are
/// applied directly against the wrapped buffer with no further adjustment.
const FIRST_FILENAME_LENGTH_OFFSET: usize = 0x22;
const FIRST_FILENAME_OFFSET: usize = 0x26;

/// Component E: read the wrapped archive's first entry and decide which
/// extraction-script template family handles it.
pub fn determine_file_type(wrapped: &[u8], is_jar: bool) -> PdvzipResult<(FileType, String)> {
    let name_len = *wrapped
        .get(FIRST_FILENAME_LENGTH_OFFSET)
        .ok_or_else(|| PdvzipError::BadArchive("archive too short to contain a filename length".into()))?
        as usize;

    if name_len < MIN_FIRST_ENTRY_NAME_LEN {
        return Err(PdvzipError::BadArchive(format!(
            "first entry's filename is {name_len} bytes, minimum is {MIN_FIRST_ENTRY_NAME_LEN}"
        )));
    }

    let name_bytes = wrapped
        .get(FIRST_FILENAME_OFFSET..FIRST_FILENAME_OFFSET + name_len)
        .ok_or_else(|| PdvzipError::BadArchive("archive too short to contain its first filename".into()))?;
    let filename = String::from_utf8_lossy(name_bytes).into_owned();

    if is_jar {
        if filename != "META-INF/MANIFEST.MF" && filename != "META-INF/" {
            return Err(PdvzipError::BadArchive(
                "archive does not appear to be a valid JAR (missing META-INF manifest entry)".into(),
            ));
        }
        return Ok((FileType::Jar, filename));
    }

    let last = *name_bytes.last().expect("non-empty, checked by MIN_FIRST_ENTRY_NAME_LEN");
    let dot_pos = filename.rfind('.');

    if dot_pos.is_none() {
        return Ok(if last == b'/' {
            (FileType::Folder, filename)
        } else {
            (FileType::LinuxExecutable, filename)
        });
    }

    if last == b'/' {
        let second_last = name_bytes[name_bytes.len() - 2];
        if second_last == b'.' {
            return Err(PdvzipError::BadArchive("invalid folder name within ZIP archive".into()));
        }
        return Ok((FileType::Folder, filename));
    }

    let extension = filename[dot_pos.unwrap() + 1..].to_ascii_lowercase();
    match EXTENSION_LIST.iter().position(|&e| e == extension) {
        Some(index) => Ok((index_to_file_type(index), filename)),
        None => Ok((FileType::UnknownFileType, filename)),
    }
}

fn index_to_file_type(index: usize) -> FileType {
    let video_audio = FileType::VideoAudio as usize;
    match index.max(video_audio) {
        v if v == FileType::VideoAudio as usize => FileType::VideoAudio,
        v if v == FileType::Pdf as usize => FileType::Pdf,
        v if v == FileType::Python as usize => FileType::Python,
        v if v == FileType::PowerShell as usize => FileType::PowerShell,
        v if v == FileType::BashShell as usize => FileType::BashShell,
        v if v == FileType::WindowsExecutable as usize => FileType::WindowsExecutable,
        _ => unreachable!("extension table has exactly 35 entries, 0..=29 collapse to VideoAudio above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wrapped(first_name: &str) -> Vec<u8> {
        let mut archive = vec![0x50, 0x4B, 0x03, 0x04];
        archive.extend_from_slice(&[0u8; 22]); // version..crc..sizes, padding to reach name-length field
        archive.extend_from_slice(&(first_name.len() as u16).to_le_bytes());
        archive.extend_from_slice(&[0x00, 0x00]); // extra field length
        archive.extend_from_slice(first_name.as_bytes());

        let mut wrapped = Vec::new();
        wrapped.extend_from_slice(&(archive.len() as u32).to_be_bytes());
        wrapped.extend_from_slice(b"IDAT");
        wrapped.extend_from_slice(&archive);
        wrapped.extend_from_slice(&[0u8; 4]);
        wrapped
    }

    #[test]
    fn wraps_and_validates_signature() {
        let archive = make_wrapped("clip.mp4")[8..].to_vec();
        let wrapped = wrap_archive(&archive).unwrap();
        assert_eq!(&wrapped[4..8], b"IDAT");
        assert_eq!(wrapped.len() - 12, archive.len());
    }

    #[test]
    fn rejects_non_zip_archive() {
        assert!(wrap_archive(&[0u8; 16]).is_err());
    }

    #[test]
    fn video_extension_selects_video_audio() {
        let wrapped = make_wrapped("clip.mp4");
        let (ft, name) = determine_file_type(&wrapped, false).unwrap();
        assert_eq!(ft, FileType::VideoAudio);
        assert_eq!(name, "clip.mp4");
    }

    #[test]
    fn pdf_extension_selects_pdf() {
        let wrapped = make_wrapped("doc.pdf");
        let (ft, _) = determine_file_type(&wrapped, false).unwrap();
        assert_eq!(ft, FileType::Pdf);
    }

    #[test]
    fn jar_requires_manifest_entry() {
        let wrapped = make_wrapped("META-INF/MANIFEST.MF");
        let (ft, _) = determine_file_type(&wrapped, true).unwrap();
        assert_eq!(ft, FileType::Jar);

        let bad = make_wrapped("not-a-manifest.txt");
        assert!(determine_file_type(&bad, true).is_err());
    }

    #[test]
    fn trailing_slash_selects_folder() {
        let wrapped = make_wrapped("payload/");
        let (ft, _) = determine_file_type(&wrapped, false).unwrap();
        assert_eq!(ft, FileType::Folder);
    }

    #[test]
    fn no_dot_no_slash_selects_linux_executable() {
        let wrapped = make_wrapped("runme");
        let (ft, _) = determine_file_type(&wrapped, false).unwrap();
        assert_eq!(ft, FileType::LinuxExecutable);
    }

    #[test]
    fn unknown_extension_selects_unknown_file_type() {
        let wrapped = make_wrapped("payload.xyz");
        let (ft, _) = determine_file_type(&wrapped, false).unwrap();
        assert_eq!(ft, FileType::UnknownFileType);
    }

    #[test]
    fn name_too_short_is_bad_archive() {
        let wrapped = make_wrapped("a.b");
        assert!(matches!(determine_file_type(&wrapped, false), Err(PdvzipError::BadArchive(_))));
    }
}
