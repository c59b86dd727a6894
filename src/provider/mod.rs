//! # Conjur CSI Provider
//!
//! Implements the Mount and Version operations of the Secrets Store CSI
//! driver provider API.
//!
//! A mount request flows through three stages:
//! 1. [`MountConfig::from_request`] decodes and validates the request attributes,
//!    looking up the workload pod's annotations when the configuration version
//!    requires it
//! 2. the [`SecretStore`](crate::conjur::SecretStore) authenticates with the pod's
//!    service account token and fetches every requested secret in one batch
//! 3. [`ConjurProvider`] maps the fetched values onto the destination paths
//!
//! The provider keeps no state between requests.

pub mod config;
pub mod error;
pub mod mount;
pub mod secrets_spec;

pub use config::{ConfigVersion, MountConfig, SecretsSource};
pub use error::{MountConfigError, MountError};
pub use mount::{ConjurProvider, CsiProvider};
pub use secrets_spec::parse_secrets_spec;

/// Service account tokens issued by the CSI driver, keyed by audience.
pub const SERVICE_ACCOUNT_TOKENS_KEY: &str = "csi.storage.k8s.io/serviceAccount.tokens";
pub const POD_NAME_KEY: &str = "csi.storage.k8s.io/pod.name";
pub const POD_NAMESPACE_KEY: &str = "csi.storage.k8s.io/pod.namespace";
pub const CONFIGURATION_VERSION_KEY: &str = "conjur.org/configurationVersion";
/// Pod annotation carrying the secrets spec from configuration version 0.2.0.
pub const SECRETS_ANNOTATION_KEY: &str = "conjur.org/secrets";
/// Inline secrets spec used by configuration version 0.1.0.
pub const SECRETS_ATTRIBUTE_KEY: &str = "secrets";

/// Connection attributes every mount request must carry, in reporting order.
pub const REQUIRED_CONNECTION_KEYS: [&str; 5] =
    ["account", "applianceUrl", "authnId", "identity", "sslCertificate"];

/// Version of every object returned by a mount. Conjur variable versions are
/// not tracked.
pub const OBJECT_VERSION: &str = "1";
