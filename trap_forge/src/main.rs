//! trap_forge — batch entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trap_forge", about = "Forge the serpentine trap MIDI library")]
struct Cli {
    /// Output directory for the rendered .mid files and the manifest.
    #[arg(long, default_value = "serpentine_library")]
    out_dir: PathBuf,

    /// Author tag recorded in the manifest.
    #[arg(long, default_value = "trap_forge")]
    author: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let count = trap_forge::run(&cli.out_dir, &cli.author)?;
    info!(
        "forged {count} tracks into {} (manifest.json alongside)",
        cli.out_dir.display()
    );
    Ok(())
}
