//! Log output for hosts embedding the simulation.

use ensemble_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `log_level` when set.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// [`init`] from the `general` config section.
///
/// # Errors
/// Same as [`init`].
pub fn init_from_config(general: &GeneralConfig) -> anyhow::Result<()> {
    init(&general.log_level)
}
