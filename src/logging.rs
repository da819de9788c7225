//! Logging configuration and initialization for textchat.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Initialize logging with the given configuration.
///
/// Writes to stdout and, when `config.file` is non-empty, appends to that file
/// as well. Fails if a global subscriber is already installed or the log file
/// cannot be created.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.file.trim().is_empty() {
        return try_init_console(&config.level);
    }

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = Arc::new(File::create(&config.file)?);
    let writer = std::io::stdout.and(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter_for(&config.level))
        .try_init()
        .map_err(|e| crate::TextChatError::Config(format!("logging init failed: {e}")))
}

fn try_init_console(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(filter_for(level))
        .try_init()
        .map_err(|e| crate::TextChatError::Config(format!("logging init failed: {e}")))
}

/// Initialize console-only logging (for development/testing).
///
/// Silently keeps any subscriber that is already installed.
pub fn init_console_only(level: &str) {
    let _ = try_init_console(level);
}
