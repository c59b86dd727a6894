//! # Conjur CSI Provider
//!
//! A [Secrets Store CSI driver](https://secrets-store-csi-driver.sigs.k8s.io/)
//! provider that mounts secrets from CyberArk Conjur into Kubernetes pods.
//!
//! ## Architecture
//!
//! ```text
//! CSI driver ──gRPC/UDS──▶ ProviderServer ──▶ ConjurProvider ──▶ MountConfig
//!                                                  │                  │
//!                                                  ▼                  ▼
//!                                             SecretStore      PodAnnotations
//!                                           (Conjur authn-jwt)  (Kubernetes API)
//! kubelet ──HTTP──▶ HealthServer ──Version──▶ ConjurProvider
//! ```
//!
//! ## Core Components
//!
//! - **Provider** ([`provider`]): Mount and Version handlers
//! - **Conjur** ([`conjur`]): JWT authentication and batch secret retrieval
//! - **Kubernetes** ([`k8s`]): pod annotation lookup for the secrets spec
//! - **Servers** ([`server`]): gRPC socket, liveness endpoint and shutdown coordination
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use conjur_csi_provider::{
//!     conjur::ConjurClient, k8s::KubePodAnnotations, provider::ConjurProvider,
//!     server::{run_until_shutdown, HealthServer, ProviderServer},
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = Arc::new(ConjurProvider::new(
//!         Arc::new(ConjurClient::default()),
//!         Arc::new(KubePodAnnotations::new()),
//!     ));
//!     let socket = "/var/run/secrets-store-csi-providers/conjur.sock";
//!     let grpc = Arc::new(ProviderServer::new(socket, provider.clone()));
//!     let health = Arc::new(HealthServer::new(provider, 8080));
//!
//!     let report = run_until_shutdown(grpc, health, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//!     assert!(report.is_clean());
//! }
//! ```

pub mod config;
pub mod conjur;
pub mod errors;
pub mod k8s;
pub mod observability;
pub mod proto;
pub mod provider;
pub mod server;

pub use config::{ObservabilityConfig, ProviderArgs};
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Runtime name reported by `Version` and the token audience this provider reads.
pub const PROVIDER_NAME: &str = "conjur";

/// Runtime version reported by `Version`.
pub const PROVIDER_VERSION: &str = VERSION;

/// Build tag appended to the version in the startup banner.
pub const TAG_SUFFIX: &str = match option_env!("CONJUR_CSI_TAG_SUFFIX") {
    Some(tag) => tag,
    None => "dev",
};

/// Full version name, e.g. `v0.2.0-dev`.
pub fn full_version_name() -> String {
    format!("v{}-{}", PROVIDER_VERSION, TAG_SUFFIX)
}
