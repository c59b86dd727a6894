//! Conjur secret store.
//!
//! Authenticates to Conjur with a pod's service account JWT and retrieves the
//! secrets named by a mount request.
//!
//! # Architecture
//!
//! - [`SecretStore`]: what the mount handler depends on
//! - [`ConjurClient`]: builds a per-request [`ConjurConfig`], validates it,
//!   connects through a [`ConjurApiFactory`] and strips the account
//!   namespacing from returned ids
//! - [`HttpConjurApiFactory`]: JWT authentication and batch retrieval over the
//!   Conjur REST API
//!
//! ```rust,ignore
//! use conjur_csi_provider::conjur::{ConjurClient, SecretStore};
//!
//! let client = ConjurClient::default();
//! let secrets = client.get_secrets(&connection, &jwt, &["db/password".into()]).await?;
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;

pub use api::{ConjurApi, ConjurApiFactory, HttpConjurApiFactory};
pub use client::{ConjurClient, IdPrefix, SecretStore};
pub use config::{AuthnType, ConjurConfig, ConnectionParams};
pub use error::{ConjurError, Result};
