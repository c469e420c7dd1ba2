//! Viarte Studio - command-line host
//!
//! Loads the studio configuration and runs one command.

mod demo;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use viarte_core::StudioConfig;
use viarte_media::{probe_codecs, CodecBackend, SoftwareBackend};

#[derive(Parser)]
#[command(
    name = "viarte",
    version,
    about = "Viarte Studio editing engine",
    long_about = "Drives the Viarte editing engine headlessly: timeline editing, smart transitions, playback and export."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a three-clip timeline, suggest transitions, play and export it
    Demo {
        /// Frames to export
        #[arg(long, default_value_t = 30)]
        frames: u32,

        /// Seconds of real-time playback
        #[arg(long, default_value_t = 1.0)]
        play_seconds: f64,

        /// Where to write the JSON chunk summary
        #[arg(short, long, default_value = "export-summary.json")]
        output: PathBuf,

        /// Also save the editor snapshot here
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Print codec and GPU capabilities as JSON
    Probe,
    /// Write the default configuration as TOML
    Config {
        #[arg(default_value = "viarte.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Viarte Studio v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            StudioConfig::from_file(path)?
        }
        None => StudioConfig::default(),
    };

    match cli.command {
        Command::Demo {
            frames,
            play_seconds,
            output,
            project,
        } => {
            let summary = demo::run(
                &config,
                demo::DemoOptions {
                    frames,
                    play_seconds,
                    output,
                    project,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Probe => {
            let backend = SoftwareBackend::new();
            let codecs = probe_codecs(&backend);
            let gpu = tokio::task::spawn_blocking(viarte_gpu::probe_gpu).await?;
            let report = serde_json::json!({
                "codecBackend": backend.name(),
                "codecs": codecs,
                "gpu": gpu,
                "hardwareAcceleration": gpu.available,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config.save_to_file(&path)?;
            info!("Wrote configuration to {:?}", path);
        }
    }

    Ok(())
}
