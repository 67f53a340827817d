//! # pdvzip
//!
//! Builds a polyglot file that is simultaneously a valid PNG image, a valid
//! ZIP/JAR archive, and an executable dual-shell (POSIX sh + Windows batch)
//! extraction script.
//!
//! The pipeline is a linear transform over two in-memory byte buffers -- the
//! cover image and the archive -- ending in a single combined buffer written
//! to disk. See [`polyglot::build_polyglot`] for the orchestrator.

pub mod limits;
pub mod utils;
pub mod png;
pub mod zip;
pub mod scripts;
pub mod polyglot;
pub mod cli;
pub mod output;

/// Result type alias for pdvzip operations.
pub type PdvzipResult<T> = Result<T, PdvzipError>;

/// Error taxonomy for the polyglot assembler.
#[derive(Debug, thiserror::Error)]
pub enum PdvzipError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad cover image: {0}")]
    BadImage(String),

    #[error("Bad archive: {0}")]
    BadArchive(String),

    #[error("extraction script exceeds {limit} bytes (got {actual})")]
    ScriptOversize { limit: usize, actual: usize },

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
