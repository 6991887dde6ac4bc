//! Logging setup for the `ministack` binary
//!
//! Library code only emits `tracing` events; the binary installs a fmt
//! subscriber writing to stderr. The filter comes from `--log-level` when
//! given, otherwise from `MINISTACK_LOG`, otherwise `warn`.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV_VAR: &str = "MINISTACK_LOG";
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Build the filter without installing anything
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    let parsed = match level {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_env(LOG_ENV_VAR).ok(),
    };
    parsed.unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(level: Option<&str>) {
    fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .ok(); // already initialized
}
