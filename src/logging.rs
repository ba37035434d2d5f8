//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `level` - Default level directive (`"info"`, `"debug"`, ...).
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for progress and summary output)
/// - The RUST_LOG environment variable can override the log level
/// - Calling it twice is harmless; the second subscriber is ignored
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .try_init()
            .ok();
    }
}

/// Initialize logging from the `[logging]` config section.
///
/// `--verbose` raises the level to at least `debug`; `--json-logs` forces JSON.
pub fn init_from_config(config: &LoggingConfig, verbose_override: bool, json_logs_override: bool) {
    let (level, json) = effective_settings(config, verbose_override, json_logs_override);
    init(level, json);
}

fn effective_settings(config: &LoggingConfig, verbose: bool, json_logs: bool) -> (&str, bool) {
    let level = if verbose && config.level != "trace" {
        "debug"
    } else {
        config.level.as_str()
    };
    let json = json_logs || config.format == LogFormat::Json;
    (level, json)
}
