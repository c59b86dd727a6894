//! Error types for the mount pipeline.

use thiserror::Error;

use crate::conjur::ConjurError;
use crate::k8s::K8sError;

/// Errors raised while turning a mount request into a [`MountConfig`](super::MountConfig).
///
/// Every variant is terminal for the request that produced it.
#[derive(Error, Debug)]
pub enum MountConfigError {
    #[error("Failed to unmarshal attributes: {0}")]
    AttributeDecode(#[source] serde_json::Error),

    #[error("Unsupported configuration version: {version:?}")]
    UnsupportedConfigVersion { version: String },

    #[error("Failed to unmarshal attribute {key:?}: {source}")]
    TokenDecode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing serviceaccount token for audience {audience:?}")]
    MissingToken { audience: &'static str },

    #[error("Missing required Conjur config attributes: [{}]", quoted(.keys))]
    MissingAttributes { keys: Vec<&'static str> },

    #[error("Failed to retrieve pod annotations: {0}")]
    AnnotationLookup(#[source] K8sError),

    #[error("Annotation {key:?} missing or empty")]
    MissingAnnotation { key: &'static str },

    #[error("Attribute {name:?} missing or empty")]
    MissingAttribute { name: &'static str },

    #[error("Failed to unmarshal secrets spec: {0}")]
    SecretsSpecDecode(#[source] serde_yaml::Error),

    #[error("Failed to unmarshal file permissions: {reason}")]
    PermissionDecode { value: String, reason: String },
}

fn quoted(keys: &[&'static str]) -> String {
    keys.iter().map(|k| format!("{:?}", k)).collect::<Vec<_>>().join(" ")
}

/// A failed mount. No files are returned alongside it.
#[derive(Error, Debug)]
pub enum MountError {
    #[error("Failed to create configuration from mount request parameters: {0}")]
    Config(#[from] MountConfigError),

    #[error("Failed to get Conjur secrets: {0}")]
    SecretStore(#[from] ConjurError),
}

impl From<MountError> for tonic::Status {
    fn from(err: MountError) -> Self {
        let message = err.to_string();
        match err {
            MountError::Config(_) => tonic::Status::invalid_argument(message),
            MountError::SecretStore(ConjurError::ConfigValidation { .. }) => {
                tonic::Status::invalid_argument(message)
            }
            MountError::SecretStore(_) => tonic::Status::unavailable(message),
        }
    }
}
