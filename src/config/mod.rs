//! # Configuration Management
//!
//! Command line flags for the provider process and environment-driven logging
//! settings. Flag names keep the camelCase spelling the CSI driver deployment
//! manifests already pass, with kebab-case aliases.

pub mod settings;

pub use settings::{LogFormat, ObservabilityConfig};

use std::path::PathBuf;

use clap::Parser;

use crate::{Error, Result};

/// Default port for the liveness server
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Default Unix socket the CSI driver dials for this provider
pub const DEFAULT_SOCKET_PATH: &str = "/etc/kubernetes/secrets-store-csi-providers/conjur.sock";

/// Process flags
#[derive(Parser, Debug, Clone)]
#[command(name = "conjur-csi-provider")]
#[command(about = "Conjur provider for the Kubernetes Secrets Store CSI driver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ProviderArgs {
    /// Port to expose the provider health server on
    #[arg(
        long = "healthPort",
        visible_alias = "health-port",
        env = "CONJUR_CSI_HEALTH_PORT",
        default_value_t = DEFAULT_HEALTH_PORT
    )]
    pub health_port: u16,

    /// Socket to expose the provider gRPC server on
    #[arg(
        long = "socketPath",
        visible_alias = "socket-path",
        env = "CONJUR_CSI_SOCKET_PATH",
        default_value = DEFAULT_SOCKET_PATH
    )]
    pub socket_path: PathBuf,
}

impl Default for ProviderArgs {
    fn default() -> Self {
        Self { health_port: DEFAULT_HEALTH_PORT, socket_path: PathBuf::from(DEFAULT_SOCKET_PATH) }
    }
}

impl ProviderArgs {
    /// Reject flag values no server could start with
    pub fn validate(&self) -> Result<()> {
        if self.health_port == 0 {
            return Err(Error::config("Health port must be between 1 and 65535"));
        }

        if self.socket_path.as_os_str().is_empty() {
            return Err(Error::config("Socket path cannot be empty"));
        }

        Ok(())
    }
}
