//! Secret store client used by the mount handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::api::{ConjurApiFactory, HttpConjurApiFactory};
use super::config::{ConjurConfig, ConnectionParams};
use super::error::Result;

/// Authenticates with a workload JWT and retrieves secrets by id.
///
/// Implementations MUST NOT log secret values or the JWT.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the requested secrets keyed by the ids that were asked for.
    /// Ids the store did not return are absent from the map.
    async fn get_secrets(
        &self,
        connection: &ConnectionParams,
        jwt: &str,
        secret_ids: &[String],
    ) -> Result<HashMap<String, Vec<u8>>>;
}

/// How returned variable ids are namespaced by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdPrefix {
    /// `{account}:variable:`
    #[default]
    AccountVariable,
    /// A fixed prefix.
    Literal(String),
}

impl IdPrefix {
    fn for_account(&self, account: &str) -> String {
        match self {
            IdPrefix::AccountVariable => format!("{}:variable:", account),
            IdPrefix::Literal(prefix) => prefix.clone(),
        }
    }
}

/// [`SecretStore`] for Conjur.
///
/// Every call builds a fresh configuration and authenticated API handle;
/// nothing is cached between calls.
#[derive(Clone)]
pub struct ConjurClient {
    factory: Arc<dyn ConjurApiFactory>,
    id_prefix: IdPrefix,
}

impl Default for ConjurClient {
    fn default() -> Self {
        Self::new(Arc::new(HttpConjurApiFactory::new()))
    }
}

impl ConjurClient {
    pub fn new(factory: Arc<dyn ConjurApiFactory>) -> Self {
        Self { factory, id_prefix: IdPrefix::default() }
    }

    /// Override the namespacing stripped from returned ids.
    pub fn with_id_prefix(mut self, id_prefix: IdPrefix) -> Self {
        self.id_prefix = id_prefix;
        self
    }
}

#[async_trait]
impl SecretStore for ConjurClient {
    async fn get_secrets(
        &self,
        connection: &ConnectionParams,
        jwt: &str,
        secret_ids: &[String],
    ) -> Result<HashMap<String, Vec<u8>>> {
        let config = ConjurConfig::for_jwt(connection, jwt);
        config.validate().inspect_err(|e| error!(error = %e, "Failed to create Conjur client"))?;

        let api = self
            .factory
            .connect(&config)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to create Conjur client"))?;

        debug!(count = secret_ids.len(), "Retrieving batch secrets");
        let by_full_id = api
            .retrieve_batch_secrets_safe(secret_ids)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to retrieve batch secrets"))?;

        let prefix = self.id_prefix.for_account(&config.account);
        let secrets: HashMap<String, Vec<u8>> = by_full_id
            .into_iter()
            .map(|(id, value)| match id.strip_prefix(prefix.as_str()) {
                Some(bare) => (bare.to_string(), value),
                None => (id, value),
            })
            .collect();

        info!(requested = secret_ids.len(), retrieved = secrets.len(), "Retrieved Conjur secrets");
        Ok(secrets)
    }
}
