//! Tracing setup for the server

use std::io;
use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter level for a verbosity count (0=info, 1=debug, 2+=trace)
#[must_use]
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize logging to stderr, or to `log_file` when given
///
/// `RUST_LOG` overrides the level derived from `verbosity`.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> io::Result<()> {
    let level = level_for(verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("depotd={level},depot_server={level},depot_common={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        None => registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 1)
                    .with_file(verbosity >= 2)
                    .with_line_number(verbosity >= 2),
            )
            .try_init(),
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()
        }
    }
    .map_err(|e| io::Error::other(e.to_string()))
}
