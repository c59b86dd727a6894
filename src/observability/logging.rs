//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. Secret values and workload tokens
//! must never be passed as fields to any event in this crate.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig, ProviderArgs};
use crate::errors::{Error, Result};

/// Initialize the global subscriber from the observability configuration.
///
/// `RUST_LOG` directives take precedence over `LOG_LEVEL` when both are set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    result.map_err(|e| Error::internal(format!("Failed to install log subscriber: {}", e)))?;

    if let Some(rejected) = &config.rejected_log_level {
        tracing::warn!(log_level = %rejected, "Invalid log level, defaulting to info");
    }

    Ok(())
}

/// Log the resolved process configuration at startup
pub fn log_startup_info(args: &ProviderArgs, config: &ObservabilityConfig) {
    tracing::info!(
        version = %crate::full_version_name(),
        socket_path = %args.socket_path.display(),
        health_port = args.health_port,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Kubernetes CSI provider starting up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging() {
        let config = ObservabilityConfig::default();

        // May fail if another test already installed a global subscriber
        let result = init_logging(&config);
        assert!(result.is_ok() || matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn test_log_startup_info() {
        // This should not panic
        log_startup_info(&ProviderArgs::default(), &ObservabilityConfig::default());
    }
}
