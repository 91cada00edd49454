//! Tracing setup.
//!
//! Human-readable events go to stderr, filtered by `-v` unless `RUST_LOG` is
//! set. `--log-file` adds a JSON layer at debug level.

use std::fs::File;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CRATES: [&str; 3] = ["deckslim", "deckslim_image", "deckslim_core"];

fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn directives(level: &str) -> String {
    CRATES.iter().map(|c| format!("{c}={level}")).collect::<Vec<_>>().join(",")
}

/// Install the global subscriber.
///
/// The returned guard flushes the log file when dropped and must live until
/// the program exits.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level(verbosity))));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 3)
        .with_thread_names(verbosity >= 2)
        .compact()
        .with_filter(filter);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(directives("debug")));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "logging initialized");
    Ok(guard)
}
