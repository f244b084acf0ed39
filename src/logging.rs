//! Tracing subscriber setup shared by both binaries.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Builds the filter: `RUST_LOG` if set, otherwise `info`, or `debug`
/// when `DEBUG` is on.
#[must_use]
pub fn env_filter(config: LogConfig) -> EnvFilter {
    let default = if config.debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. Calling it twice is a no-op.
pub fn init_tracing(config: LogConfig) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
