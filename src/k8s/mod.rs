//! Workload metadata lookup.
//!
//! Starting with configuration version 0.2.0 the secrets spec is read from the
//! `conjur.org/secrets` annotation of the pod that requested the mount. This
//! module hides the Kubernetes API behind [`PodAnnotations`] so the mount
//! pipeline can be exercised without a cluster.

use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, Config};
use thiserror::Error;
use tracing::{debug, error, info};

/// Result type alias for Kubernetes lookups.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur while reading pod metadata.
#[derive(Error, Debug)]
pub enum K8sError {
    #[error("Failed to load in-cluster Kubernetes config")]
    ClientConfig,

    #[error("Failed to configure Kubernetes client")]
    ClientBuild,

    #[error("Failed to get pod \"{pod}\" in namespace \"{namespace}\": {message}")]
    PodLookup { pod: String, namespace: String, message: String },
}

/// Retrieves the annotations of a pod.
#[async_trait]
pub trait PodAnnotations: Send + Sync {
    async fn get_pod_annotations(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> K8sResult<HashMap<String, String>>;
}

/// [`PodAnnotations`] backed by the in-cluster Kubernetes API.
///
/// A client is built per lookup from the pod's service account mount, so no
/// connection state outlives a single mount request.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubePodAnnotations;

impl KubePodAnnotations {
    pub fn new() -> Self {
        Self
    }

    fn client() -> K8sResult<Client> {
        info!("Creating Kubernetes client");
        let config = Config::incluster().map_err(|e| {
            debug!(error = %e, "In-cluster config unavailable");
            error!("Failed to load in-cluster Kubernetes config");
            K8sError::ClientConfig
        })?;

        Client::try_from(config).map_err(|e| {
            debug!(error = %e, "Kubernetes client construction failed");
            error!("Failed to configure Kubernetes client");
            K8sError::ClientBuild
        })
    }
}

#[async_trait]
impl PodAnnotations for KubePodAnnotations {
    async fn get_pod_annotations(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> K8sResult<HashMap<String, String>> {
        let pods: Api<Pod> = Api::namespaced(Self::client()?, namespace);

        let pod = pods.get(pod_name).await.map_err(|e| K8sError::PodLookup {
            pod: pod_name.to_string(),
            namespace: namespace.to_string(),
            message: e.to_string(),
        })?;

        Ok(pod.metadata.annotations.unwrap_or_default().into_iter().collect())
    }
}
