//! Mount and Version handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tonic::Status;
use tracing::{error, info, instrument, warn};

use super::config::MountConfig;
use super::error::MountError;
use super::OBJECT_VERSION;
use crate::conjur::SecretStore;
use crate::k8s::PodAnnotations;
use crate::proto::v1alpha1::{
    File, MountRequest, MountResponse, ObjectVersion, VersionRequest, VersionResponse,
};
use crate::{PROVIDER_NAME, PROVIDER_VERSION};

/// The provider operations served over gRPC and probed by the health server.
#[async_trait]
pub trait CsiProvider: Send + Sync {
    async fn mount(&self, request: MountRequest) -> Result<MountResponse, Status>;

    async fn version(&self, request: VersionRequest) -> Result<VersionResponse, Status>;
}

/// [`CsiProvider`] that mounts Conjur secrets.
#[derive(Clone)]
pub struct ConjurProvider {
    secret_store: Arc<dyn SecretStore>,
    annotations: Arc<dyn PodAnnotations>,
}

impl ConjurProvider {
    pub fn new(secret_store: Arc<dyn SecretStore>, annotations: Arc<dyn PodAnnotations>) -> Self {
        Self { secret_store, annotations }
    }

    /// Resolve a mount request into files.
    ///
    /// Either every returned secret is mapped to a file or the whole mount
    /// fails. Requested secrets that Conjur did not return are left out.
    #[instrument(skip_all, fields(target_path = %request.target_path))]
    pub async fn mount_secrets(&self, request: &MountRequest) -> Result<MountResponse, MountError> {
        let config = MountConfig::from_request(request, self.annotations.as_ref())
            .await
            .inspect_err(|e| {
                error!(error = %e, "Failed to create configuration from mount request")
            })?;

        let mut secret_ids: Vec<String> = config.secrets().keys().cloned().collect();
        secret_ids.sort();

        let fetched = self
            .secret_store
            .get_secrets(&config.connection_params(), config.token(), &secret_ids)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to get Conjur secrets"))?;

        let mode = config.permissions() as i32;
        let mut response = MountResponse::default();

        for (id, contents) in fetched.into_iter().collect::<BTreeMap<_, _>>() {
            let Some(path) = config.secrets().get(&id) else {
                warn!(secret_id = %id, "Ignoring secret that was not requested");
                continue;
            };
            response.object_version.push(ObjectVersion { id, version: OBJECT_VERSION.to_string() });
            response.files.push(File { path: path.clone(), mode, contents });
        }

        if response.files.len() < secret_ids.len() {
            warn!(
                requested = secret_ids.len(),
                returned = response.files.len(),
                "Some requested secrets were not returned by Conjur"
            );
        }
        info!(files = response.files.len(), "Mounted Conjur secrets");

        Ok(response)
    }

    pub fn version_info(request: &VersionRequest) -> VersionResponse {
        VersionResponse {
            version: request.version.clone(),
            runtime_name: PROVIDER_NAME.to_string(),
            runtime_version: PROVIDER_VERSION.to_string(),
        }
    }
}

#[async_trait]
impl CsiProvider for ConjurProvider {
    async fn mount(&self, request: MountRequest) -> Result<MountResponse, Status> {
        self.mount_secrets(&request).await.map_err(Status::from)
    }

    async fn version(&self, request: VersionRequest) -> Result<VersionResponse, Status> {
        Ok(Self::version_info(&request))
    }
}
