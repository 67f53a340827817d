//! Compiled-in size, dimension, and retry budgets.
//!
//! There is no runtime config surface beyond CLI flags; these constants are
//! the single place the pipeline's numeric limits live.

/// Minimum accepted cover-image file size, in bytes.
pub const MIN_IMAGE_SIZE: usize = 87;

/// Maximum accepted cover-image file size, in bytes.
pub const MAX_IMAGE_SIZE: usize = 4 * 1024 * 1024;

/// Minimum accepted archive file size, in bytes.
pub const MIN_ARCHIVE_SIZE: usize = 30;

/// Maximum accepted archive file size, in bytes.
pub const MAX_ARCHIVE_SIZE: usize = 2 * 1024 * 1024 * 1024;

/// Inclusive width/height bounds for truecolor (color type 2/6) covers.
pub const TRUECOLOR_DIM_RANGE: std::ops::RangeInclusive<u32> = 68..=900;

/// Inclusive width/height bounds for indexed (color type 3) covers.
pub const INDEXED_DIM_RANGE: std::ops::RangeInclusive<u32> = 68..=4096;

/// Maximum unique colors a truecolor image may have to qualify for palette downgrade.
pub const MAX_PALETTE_COLORS: usize = 256;

/// Bourne-shell/batch bytes that must not appear in the IHDR sanitization window.
pub const HOSTILE_BYTES: [u8; 7] = [0x22, 0x27, 0x28, 0x29, 0x3B, 0x3E, 0x60];

/// Start of the IHDR sanitization window (inclusive), absolute offset in the image buffer.
pub const IHDR_SANITIZE_START: usize = 18;

/// End of the IHDR sanitization window (inclusive), absolute offset in the image buffer.
pub const IHDR_SANITIZE_END: usize = 32;

/// Maximum size of the assembled iCCP script chunk (length + name + data + CRC).
pub const MAX_SCRIPT_CHUNK_SIZE: usize = 1_500;

/// Bounded retry cap for the "pad iCCP chunk until its length byte is clean" loop.
pub const MAX_HOSTILE_LENGTH_RETRIES: u32 = 5;

/// Filler bytes appended to the iCCP chunk data when its length's high byte is hostile.
pub const HOSTILE_LENGTH_PAD: &[u8] = b"........";

/// The comment-length extension applied to the ZIP end-of-central-directory record,
/// covering the trailing 12-byte PNG IEND chunk plus 4 bytes of parser slack.
pub const EOCD_COMMENT_LENGTH_EXTENSION: u16 = 16;

/// Bounded retry cap for output-filename collisions.
pub const MAX_FILENAME_RETRIES: u32 = 256;

/// Minimum filename length (in bytes) for the first entry of an accepted archive.
pub const MIN_FIRST_ENTRY_NAME_LEN: usize = 4;
