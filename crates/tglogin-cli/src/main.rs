//! tglogin - sign in through a messaging bot from the terminal.
//!
//! Opens the bot's deep link, exchanges the one-time token the bot sends
//! back, and keeps the session renewed. The renewal token is stored between
//! runs so later commands pick the session up again.

mod callback;
mod cli;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tglogin_core::AuthConfig;

use cli::Args;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "tglogin.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard must be held until exit so buffered file logs flush.
fn init_tracing(log_file: bool) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = if log_file {
        match AuthConfig::cache_dir() {
            Ok(dir) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (
                    Some(fmt::layer().with_writer(writer).with_ansi(false)),
                    Some(guard),
                )
            }
            Err(e) => {
                eprintln!("Warning: {e}, logging to stderr only");
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _log_guard = init_tracing(args.log_file);
    info!("tglogin starting");

    commands::run(args).await
}
