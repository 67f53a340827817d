//! Output writer (component I): randomized filename generation, collision
//! retry, and POSIX execute-bit setting for the finished polyglot.

use crate::limits::MAX_FILENAME_RETRIES;
use crate::{PdvzipError, PdvzipResult};
use rand::distributions::{Distribution, Uniform};
use std::path::PathBuf;

/// Write `buffer` to a randomly-named file in the current directory,
/// `pzip_NNNNN.png` for ZIP input or `pjar_NNNNN.png` for JAR input, retrying
/// on filename collision. On POSIX, sets the file mode to `0o755`.
pub fn write_polyglot(buffer: &[u8], is_jar: bool) -> PdvzipResult<PathBuf> {
    let prefix = if is_jar { "pjar" } else { "pzip" };
    let distribution = Uniform::new_inclusive(10_000u32, 99_999u32);
    let mut rng = rand::thread_rng();

    for _ in 0..MAX_FILENAME_RETRIES {
        let candidate = PathBuf::from(format!("{prefix}_{}.png", distribution.sample(&mut rng)));
        if candidate.exists() {
            continue;
        }

        std::fs::write(&candidate, buffer)?;
        set_executable(&candidate)?;
        tracing::info!(bytes = buffer.len(), path = %candidate.display(), "wrote polyglot");
        return Ok(candidate);
    }

    Err(PdvzipError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("could not find a free output filename after {MAX_FILENAME_RETRIES} attempts"),
    )))
}

#[cfg(unix)]
fn set_executable(path: &std::path::Path) -> PdvzipResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &std::path::Path) -> PdvzipResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_names_according_to_jar_flag() {
        let dir = TempDir::new().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let result = write_polyglot(b"hello", false);
        std::env::set_current_dir(original).unwrap();

        let path = result.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pzip_"));
        assert!(name.ends_with(".png"));
    }
}
