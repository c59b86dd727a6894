//! Common test utilities for all integration tests.
//!
//! Provides mount request builders, a static pod annotation source and the
//! CA certificate used to build Conjur HTTP clients.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use conjur_csi_provider::k8s::{K8sError, K8sResult, PodAnnotations};
use conjur_csi_provider::proto::v1alpha1::MountRequest;

/// Self-signed CA accepted as a Conjur `sslCertificate`.
pub const CONJUR_CA_PEM: &str = include_str!("../fixtures/conjur-ca.pem");

pub const SERVICE_ACCOUNT_TOKENS: &str =
    r#"{"conjur":{"token":"workload-jwt","expirationTimestamp":"2123-01-01T01:01:01Z"}}"#;

pub const SECRETS_SPEC: &str =
    "- \"file/path/A\": \"conjur/path/A\"\n- \"file/path/B\": \"conjur/path/B\"\n";

/// Attributes of a well-formed request against `appliance_url`.
pub fn attributes(appliance_url: &str) -> HashMap<String, String> {
    [
        ("account", "default"),
        ("applianceUrl", appliance_url),
        ("authnId", "authn-jwt/kube"),
        ("identity", "host/app"),
        ("sslCertificate", CONJUR_CA_PEM),
        ("csi.storage.k8s.io/serviceAccount.tokens", SERVICE_ACCOUNT_TOKENS),
        ("csi.storage.k8s.io/pod.name", "app-7d9f"),
        ("csi.storage.k8s.io/pod.namespace", "apps"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn mount_request(attributes: &HashMap<String, String>, permission: &str) -> MountRequest {
    MountRequest {
        attributes: serde_json::to_string(attributes).expect("attributes serialize"),
        permission: permission.to_string(),
        target_path: "/var/lib/kubelet/pods/app-7d9f/volumes/secrets".to_string(),
        ..Default::default()
    }
}

/// Pod annotations served from memory, counting lookups.
#[derive(Default)]
pub struct StaticAnnotations {
    annotations: HashMap<String, String>,
    lookups: AtomicUsize,
    seen: std::sync::Mutex<Vec<(String, String)>>,
}

impl StaticAnnotations {
    pub fn with_secrets(spec: &str) -> Self {
        Self {
            annotations: HashMap::from([("conjur.org/secrets".to_string(), spec.to_string())]),
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PodAnnotations for StaticAnnotations {
    async fn get_pod_annotations(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> K8sResult<HashMap<String, String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((namespace.to_string(), pod_name.to_string()));
        if self.annotations.is_empty() {
            return Err(K8sError::PodLookup {
                pod: pod_name.to_string(),
                namespace: namespace.to_string(),
                message: "not found".to_string(),
            });
        }
        Ok(self.annotations.clone())
    }
}
