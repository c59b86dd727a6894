//! Error types for Conjur secret retrieval.

use thiserror::Error;

/// Result type for Conjur operations.
pub type Result<T> = std::result::Result<T, ConjurError>;

/// Errors raised while authenticating to Conjur and retrieving secrets.
///
/// Each variant names the stage that failed so callers can attribute a
/// failed mount precisely. None of them are retried by this crate.
#[derive(Error, Debug)]
pub enum ConjurError {
    /// The client configuration assembled from the mount request is unusable.
    #[error("Invalid Conjur client configuration: {}", .problems.join(", "))]
    ConfigValidation { problems: Vec<String> },

    /// The authenticated client could not be built.
    #[error("Failed to create Conjur client: {message}")]
    ClientConstruction { message: String },

    /// The batch retrieval call failed.
    #[error("Failed to retrieve batch secrets: {message}")]
    Retrieval { message: String },
}

impl ConjurError {
    /// Create a client construction error.
    pub fn client_construction(message: impl Into<String>) -> Self {
        Self::ClientConstruction { message: message.into() }
    }

    /// Create a retrieval error.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval { message: message.into() }
    }
}
