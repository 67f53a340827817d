use clap::Parser;
use pdvzip::cli::{Cli, INFO_TEXT};
use pdvzip::{output, polyglot, PdvzipError};

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if cli.info {
        println!("{INFO_TEXT}");
        return Ok(());
    }

    let (cover_path, archive_path) = match (&cli.cover_image, &cli.archive) {
        (Some(cover), Some(archive)) => (cover, archive),
        _ => {
            return Err(PdvzipError::Usage(
                "expected <cover_image.png> <archive.zip|jar>, or --info".into(),
            )
            .into())
        }
    };

    let is_jar = archive_path.to_ascii_lowercase().ends_with(".jar");

    let span = tracing::info_span!("pdvzip", cover = %cover_path, archive = %archive_path);
    let _enter = span.enter();

    let cover_bytes = std::fs::read(cover_path)?;
    let archive_bytes = std::fs::read(archive_path)?;

    let buffer = polyglot::build_polyglot(cover_bytes, archive_bytes, is_jar, &cli.args_linux, &cli.args_windows)?;
    let written = output::write_polyglot(&buffer, is_jar)?;

    println!("wrote {}", written.display());
    Ok(())
}
