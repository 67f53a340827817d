//! CLI surface (component J): flag parsing and the `--info` long-form text.
//!
//! Argument quote-balance validation itself lives in [`crate::scripts::validate_arguments`]
//! (the script builder needs it regardless of how arguments reach it); this
//! module only owns the flag surface.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pdvzip", version, about = "Build a PNG/ZIP(or JAR)/shell-script polyglot")]
pub struct Cli {
    /// Path to the cover PNG image.
    pub cover_image: Option<String>,

    /// Path to the archive (.zip or .jar) whose first entry selects the extraction handler.
    pub archive: Option<String>,

    /// Arguments passed to the payload when extracted and launched on Linux.
    #[arg(long, default_value = "")]
    pub args_linux: String,

    /// Arguments passed to the payload when extracted and launched on Windows.
    #[arg(long, default_value = "")]
    pub args_windows: String,

    /// Print extended usage information and exit without touching any file.
    #[arg(long)]
    pub info: bool,
}

pub const INFO_TEXT: &str = "\
pdvzip -- PNG/ZIP(-or-JAR)/shell-script polyglot builder

USAGE:
    pdvzip <cover_image.png> <archive.{zip|jar}> [--args-linux <STR>] [--args-windows <STR>]
    pdvzip --info

Takes a cover PNG and a ZIP or JAR archive and writes a single polyglot PNG
to the current directory under a randomized name (pzip_NNNNN.png, or
pjar_NNNNN.png for a JAR archive). The output is simultaneously a valid PNG
image and, when renamed and made executable, a dual-shell extraction script
that unpacks the embedded archive and launches its first entry with a
handler chosen from that entry's file extension. The file is written
chmod +x (0755) on Linux.
";

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
