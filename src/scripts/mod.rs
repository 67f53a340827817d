//! Extraction-script builder (component F): splices the first archive
//! entry's filename and the user's Linux/Windows argument strings into one
//! of ten fixed templates, then wraps the result in a valid `iCCP` chunk.

pub mod templates;

use crate::limits::{
    HOSTILE_BYTES, HOSTILE_LENGTH_PAD, MAX_HOSTILE_LENGTH_RETRIES, MAX_SCRIPT_CHUNK_SIZE,
};
use crate::utils::crc32;
use crate::zip::FileType;
use crate::{PdvzipError, PdvzipResult};

/// Profile name + null separator + compression method, per the iCCP chunk format.
const ICCP_PROFILE_HEADER: &[u8; 8] = b"DVZIP__\0";
/// Shell no-op / label trailing the profile header, before the template body.
const ICCP_LABEL: &[u8; 6] = b"\rREM;\n";
const ICCP_HEADER_LEN: usize = 4 + 4 + ICCP_PROFILE_HEADER.len() + ICCP_LABEL.len(); // 22

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpliceKind {
    Filename,
    ArgsLinux,
    ArgsWindows,
}

/// Per-`FileType` splice descriptor: `(offset, kind)` pairs into the
/// (header ‖ template) buffer, listed in descending-offset order so each
/// splice's insertion never shifts an offset still to be applied.
fn splice_descriptor(file_type: FileType) -> &'static [(usize, SpliceKind)] {
    use SpliceKind::*;
    match file_type {
        FileType::VideoAudio => &[(0x1E4, Filename), (0x1C, Filename)],
        FileType::Pdf => &[(0x196, Filename), (0x1C, Filename)],
        FileType::Python => &[(0x10B, ArgsWindows), (0x101, Filename), (0xBC, ArgsLinux), (0x1C, Filename)],
        FileType::PowerShell => &[(0x105, ArgsWindows), (0xFB, Filename), (0xB6, ArgsLinux), (0x33, Filename)],
        FileType::BashShell => &[(0x134, ArgsWindows), (0x132, Filename), (0x8E, ArgsLinux), (0x1C, Filename)],
        FileType::WindowsExecutable => &[(0x116, ArgsWindows), (0x114, Filename)],
        FileType::Folder => &[(0x149, Filename), (0x1C, Filename)],
        FileType::LinuxExecutable => &[(0x8E, ArgsLinux), (0x1C, Filename)],
        FileType::Jar => &[(0xA6, ArgsWindows), (0x61, ArgsLinux)],
        FileType::UnknownFileType => &[(0x127, Filename), (0x1C, Filename)],
    }
}

fn template_for(file_type: FileType) -> &'static [u8] {
    match file_type {
        FileType::VideoAudio => templates::VIDEO_AUDIO,
        FileType::Pdf => templates::PDF,
        FileType::Python => templates::PYTHON,
        FileType::PowerShell => templates::POWERSHELL,
        FileType::BashShell => templates::BASH_SHELL,
        FileType::WindowsExecutable => templates::WINDOWS_EXECUTABLE,
        FileType::Folder => templates::FOLDER,
        FileType::LinuxExecutable => templates::LINUX_EXECUTABLE,
        FileType::Jar => templates::JAR,
        FileType::UnknownFileType => templates::UNKNOWN_FILE_TYPE,
    }
}

/// Reject argument strings with an unbalanced (outside of a `\`-escape)
/// count of `'` or `"`.
pub fn validate_arguments(args: &str) -> PdvzipResult<()> {
    let mut singles = 0u32;
    let mut doubles = 0u32;
    let mut chars = args.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\'' => singles += 1,
            '"' => doubles += 1,
            _ => {}
        }
    }
    if singles % 2 != 0 || doubles % 2 != 0 {
        return Err(PdvzipError::BadArguments(format!(
            "unbalanced quotes in argument string: {args:?}"
        )));
    }
    Ok(())
}

/// Build the complete `iCCP` script chunk for `file_type`, splicing in
/// `filename` and the two argument strings, padding and patching CRC/length
/// as needed.
pub fn build_script_chunk(
    file_type: FileType,
    filename: &str,
    args_linux: &str,
    args_windows: &str,
) -> PdvzipResult<Vec<u8>> {
    validate_arguments(args_linux)?;
    validate_arguments(args_windows)?;

    let mut body = Vec::with_capacity(ICCP_HEADER_LEN + template_for(file_type).len());
    body.extend_from_slice(&[0u8; 4]); // length placeholder
    body.extend_from_slice(b"iCCP");
    body.extend_from_slice(ICCP_PROFILE_HEADER);
    body.extend_from_slice(ICCP_LABEL);
    body.extend_from_slice(template_for(file_type));

    for &(offset, kind) in splice_descriptor(file_type) {
        let insert: &[u8] = match kind {
            SpliceKind::Filename => filename.as_bytes(),
            SpliceKind::ArgsLinux => args_linux.as_bytes(),
            SpliceKind::ArgsWindows => args_windows.as_bytes(),
        };
        if offset > body.len() {
            return Err(PdvzipError::Invariant(format!(
                "splice offset {offset:#x} beyond template+header length {}",
                body.len()
            )));
        }
        body.splice(offset..offset, insert.iter().copied());
    }

    body.extend_from_slice(&[0u8; 4]); // trailing CRC placeholder

    let mut data_len = body.len() - 12;
    write_length(&mut body, data_len as u32);

    let mut retries = 0;
    while HOSTILE_BYTES.contains(&body[3]) {
        if retries >= MAX_HOSTILE_LENGTH_RETRIES {
            return Err(PdvzipError::BadImage(
                "could not clear hostile iCCP length byte within retry budget".into(),
            ));
        }
        let pad_at = 8 + data_len;
        body.splice(pad_at..pad_at, HOSTILE_LENGTH_PAD.iter().copied());
        data_len += HOSTILE_LENGTH_PAD.len();
        write_length(&mut body, data_len as u32);
        retries += 1;
    }

    let crc = crc32(&body[4..8 + data_len]);
    let crc_at = 8 + data_len;
    body[crc_at..crc_at + 4].copy_from_slice(&crc.to_be_bytes());

    if body.len() > MAX_SCRIPT_CHUNK_SIZE {
        return Err(PdvzipError::ScriptOversize { limit: MAX_SCRIPT_CHUNK_SIZE, actual: body.len() });
    }

    Ok(body)
}

fn write_length(body: &mut [u8], length: u32) {
    body[0..4].copy_from_slice(&length.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_quotes_pass() {
        assert!(validate_arguments("--foo 'bar' --baz \"qux\"").is_ok());
        assert!(validate_arguments(r#"--esc \' \" not counted"#).is_ok());
    }

    #[test]
    fn unbalanced_quotes_fail() {
        assert!(matches!(validate_arguments("--foo 'bar"), Err(PdvzipError::BadArguments(_))));
        assert!(matches!(validate_arguments("--foo \"bar"), Err(PdvzipError::BadArguments(_))));
    }

    #[test]
    fn builds_video_audio_chunk() {
        let chunk = build_script_chunk(FileType::VideoAudio, "clip.mp4", "", "").unwrap();
        assert_eq!(&chunk[4..8], b"iCCP");
        assert!(chunk.len() <= MAX_SCRIPT_CHUNK_SIZE);
        let data_len = u32::from_be_bytes(chunk[0..4].try_into().unwrap()) as usize;
        assert_eq!(chunk.len(), data_len + 12);
        let crc = crc32(&chunk[4..8 + data_len]);
        assert_eq!(&chunk[8 + data_len..12 + data_len], &crc.to_be_bytes());
    }

    #[test]
    fn builds_jar_chunk_without_filename() {
        let chunk = build_script_chunk(FileType::Jar, "META-INF/MANIFEST.MF", "--lin", "--win").unwrap();
        assert_eq!(&chunk[4..8], b"iCCP");
    }

    #[test]
    fn builds_script_interpreter_chunk_with_four_splices() {
        let chunk = build_script_chunk(FileType::Python, "run.py", "--a", "--b").unwrap();
        assert_eq!(&chunk[4..8], b"iCCP");
    }

    #[test]
    fn rejects_oversize_chunk() {
        let huge_name = "x".repeat(MAX_SCRIPT_CHUNK_SIZE);
        let err = build_script_chunk(FileType::VideoAudio, &huge_name, "", "").unwrap_err();
        assert!(matches!(err, PdvzipError::ScriptOversize { .. }));
    }
}
