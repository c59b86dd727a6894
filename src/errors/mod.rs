//! # Error Handling
//!
//! Process-level errors for the provider. Errors that belong to a single mount
//! request live next to the code that raises them (`provider`, `conjur`, `k8s`).

/// Custom result type for provider process operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the provider process
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A server could not bind its listening socket
    #[error("Failed to start {server} listener on {address}: {source}")]
    ListenerBind {
        server: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// A server's accept/dispatch loop failed after binding
    #[error("{server} server failed: {message}")]
    Serve { server: &'static str, message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new listener bind error
    pub fn listener_bind<A: Into<String>>(
        server: &'static str,
        address: A,
        source: std::io::Error,
    ) -> Self {
        Self::ListenerBind { server, address: address.into(), source }
    }

    /// Create a new serve error
    pub fn serve<S: Into<String>>(server: &'static str, message: S) -> Self {
        Self::Serve { server, message: message.into() }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}
