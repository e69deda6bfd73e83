//! Tracing subscriber setup.

use crate::config::Settings;
use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber. `RUST_LOG` wins over `settings.debug`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init(settings: &Settings) -> bool {
    let default_level = if settings.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
