use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::errors::{EngineError, Result};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "SEEDBED_LOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a global subscriber writing to stderr.
///
/// Fails (instead of panicking) when a subscriber is already installed.
pub fn init_logging(format: LogFormat) -> Result<()> {
    let filter = env_filter();
    let registry = tracing_subscriber::registry().with(filter);

    let base = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Pretty => registry.with(base).try_init(),
        LogFormat::Json => registry.with(base.json()).try_init(),
    };
    installed.map_err(|err| EngineError::Logging(err.to_string()))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
