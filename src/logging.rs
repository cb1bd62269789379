// src/logging.rs

//! Tracing subscriber setup.
//!
//! Filtering is directive-based via [`EnvFilter`], so `FILEFLOW_LOG` accepts
//! anything from a bare level (`debug`) to per-target directives. Status
//! reports are emitted under the `fileflow::status` target, which makes it
//! easy to keep them while silencing the rest:
//!
//! ```text
//! FILEFLOW_LOG="warn,fileflow::status=info"
//! ```
//!
//! An explicit `--log-level` flag overrides the environment entirely.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

const ENV_VAR: &str = "FILEFLOW_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(directive(level)),
        None => EnvFilter::try_from_env(ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
