//! deckslim - shrink the images inside Keynote documents
//!
//! Unpacks a document, converts TIFFs (and optionally PNGs) to smaller
//! formats, downsamples images to the resolution their slides actually use,
//! recompresses what is left and packs the result next to the original.

use clap::{Args, Parser, Subcommand};
use deckslim_cli::output::Status;
use deckslim_core::config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod logging;
mod presets;

/// Shrink the images inside Keynote documents
#[derive(Parser)]
#[command(name = "deckslim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write JSON logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Configuration file (defaults to .deckslim.toml and friends)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Slim a document and write `<name>_slim.key` next to it
    Slim(SlimArgs),

    /// Show every image, its usage and the planned resize, without changing anything
    Inspect {
        /// Document or already-unpacked directory
        path: PathBuf,
    },
}

/// Options of the `slim` command
#[derive(Args, Debug, Clone, Default)]
pub struct SlimArgs {
    /// Document to slim
    #[arg(required_unless_present = "unpacked", conflicts_with = "unpacked")]
    pub file: Option<PathBuf>,

    /// Work on an already-unpacked directory in place (no unpack or repack)
    #[arg(long, value_name = "DIR")]
    pub unpacked: Option<PathBuf>,

    /// Output document (defaults to `<name><suffix>.<ext>` next to the input)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Quality preset: 0 keeps settings, 1-3 trade quality for size
    #[arg(short = 'q', long = "quality", value_name = "LEVEL",
          value_parser = clap::value_parser!(u8).range(0..=3))]
    pub preset: Option<u8>,

    /// Kept resolution as a multiple of the largest on-slide height
    #[arg(long, value_name = "FACTOR")]
    pub resize_factor: Option<f64>,

    /// JPEG quality for conversions, resizes and cjpeg (0-100)
    #[arg(long, value_name = "Q", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub jpeg_quality: Option<u8>,

    /// Allow converting PNGs to JPEG
    #[arg(long)]
    pub png_convert: bool,

    /// Worker threads (0 = one per core)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep the unpacked work directory
    #[arg(long)]
    pub keep_unpacked: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            Status::error(&format!("cannot set up logging: {e:#}"));
            return ExitCode::FAILURE;
        }
    };

    let json = cli.json;
    let result = Config::load(cli.config.as_deref())
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            if let Some(path) = &config.path {
                tracing::info!(path = %path.display(), "using configuration file");
            }
            match cli.command {
                Commands::Slim(args) => commands::slim::run(&config, &args, json),
                Commands::Inspect { path } => commands::inspect::run(&config, &path, json),
            }
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<deckslim_core::Error>() {
            Some(err) => {
                if json {
                    if let Ok(report) = serde_json::to_string_pretty(&err.to_report()) {
                        println!("{report}");
                    }
                }
                Status::report(err);
                ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
            }
            None => {
                Status::error(&format!("{e:#}"));
                ExitCode::FAILURE
            }
        },
    }
}
