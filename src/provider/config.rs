//! Mount request configuration.
//!
//! [`MountConfig::from_request`] is the single place where the attribute bag
//! of a mount request is decoded and validated. Everything downstream works
//! with the typed result.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::error::MountConfigError;
use super::secrets_spec::parse_secrets_spec;
use super::{
    CONFIGURATION_VERSION_KEY, POD_NAMESPACE_KEY, POD_NAME_KEY, REQUIRED_CONNECTION_KEYS,
    SECRETS_ANNOTATION_KEY, SECRETS_ATTRIBUTE_KEY, SERVICE_ACCOUNT_TOKENS_KEY,
};
use crate::conjur::ConnectionParams;
use crate::k8s::PodAnnotations;
use crate::proto::v1alpha1::MountRequest;
use crate::PROVIDER_NAME;

type Result<T> = std::result::Result<T, MountConfigError>;

/// Largest file mode a mount may request.
const MAX_PERMISSIONS: u32 = 0o7777;

/// Supported values of `conjur.org/configurationVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ConfigVersion {
    V0_1_0,
    #[default]
    V0_2_0,
}

/// Where a configuration version reads the secrets spec from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsSource {
    /// The `secrets` attribute of the SecretProviderClass.
    Attribute,
    /// The `conjur.org/secrets` annotation of the workload pod.
    PodAnnotation,
}

impl ConfigVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigVersion::V0_1_0 => "0.1.0",
            ConfigVersion::V0_2_0 => "0.2.0",
        }
    }

    pub fn secrets_source(&self) -> SecretsSource {
        match self {
            ConfigVersion::V0_1_0 => SecretsSource::Attribute,
            ConfigVersion::V0_2_0 => SecretsSource::PodAnnotation,
        }
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigVersion {
    type Err = MountConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0.1.0" => Ok(ConfigVersion::V0_1_0),
            "0.2.0" => Ok(ConfigVersion::V0_2_0),
            other => Err(MountConfigError::UnsupportedConfigVersion { version: other.to_string() }),
        }
    }
}

/// One entry of the service account tokens attribute, keyed by audience.
#[derive(Debug, Deserialize)]
struct ServiceAccountToken {
    #[serde(default)]
    token: String,
    #[serde(default, rename = "expirationTimestamp")]
    expiration_timestamp: Option<String>,
}

/// Validated configuration for a single mount.
#[derive(Clone)]
pub struct MountConfig {
    attributes: HashMap<String, String>,
    version: ConfigVersion,
    token: String,
    permissions: u32,
    secrets: HashMap<String, String>,
}

impl fmt::Debug for MountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountConfig")
            .field("version", &self.version)
            .field("token", &"[REDACTED]")
            .field("permissions", &format!("{:#o}", self.permissions))
            .field("secrets", &self.secrets)
            .finish_non_exhaustive()
    }
}

impl MountConfig {
    /// Decode and validate a mount request.
    ///
    /// Checks run in a fixed order and stop at the first failure. The pod
    /// annotation lookup is called at most once, and only when the
    /// configuration version reads secrets from the pod.
    pub async fn from_request(
        request: &MountRequest,
        annotations: &dyn PodAnnotations,
    ) -> Result<Self> {
        let attributes: HashMap<String, String> = serde_json::from_str(&request.attributes)
            .map_err(|e| {
                error!(error = %e, "Failed to parse request attributes");
                MountConfigError::AttributeDecode(e)
            })?;

        let version = resolve_version(&attributes)?;
        let token = service_account_token(&attributes)?;
        check_required_attributes(&attributes)?;

        let secrets_spec = match version.secrets_source() {
            SecretsSource::PodAnnotation => {
                if attributes.get(SECRETS_ATTRIBUTE_KEY).is_some_and(|s| !s.is_empty()) {
                    warn!(
                        "Defining secrets in the SecretProviderClass is deprecated in v0.2.0 \
                         and greater. Please use the '{}' annotation in the pod spec.",
                        SECRETS_ANNOTATION_KEY
                    );
                }
                pod_annotation_secrets(&attributes, annotations).await?
            }
            SecretsSource::Attribute => {
                attributes.get(SECRETS_ATTRIBUTE_KEY).cloned().unwrap_or_default()
            }
        };

        if secrets_spec.is_empty() {
            error!(attribute = SECRETS_ATTRIBUTE_KEY, "Attribute missing or empty");
            return Err(MountConfigError::MissingAttribute { name: SECRETS_ATTRIBUTE_KEY });
        }

        let secrets = parse_secrets_spec(&secrets_spec).map_err(|e| {
            error!(error = %e, "Failed to unmarshal secrets spec");
            MountConfigError::SecretsSpecDecode(e)
        })?;
        if secrets.is_empty() {
            error!("Secrets spec contains no secrets");
            return Err(MountConfigError::MissingAttribute { name: SECRETS_ATTRIBUTE_KEY });
        }

        let permissions = parse_permissions(&request.permission)?;

        debug!(
            version = %version,
            secret_count = secrets.len(),
            permissions = %format!("{:#o}", permissions),
            "Built mount configuration"
        );

        Ok(Self { attributes, version, token, permissions, secrets })
    }

    pub fn version(&self) -> ConfigVersion {
        self.version
    }

    /// The service account JWT issued for the `conjur` audience.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// File mode applied to every mounted secret.
    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    /// Conjur variable id to destination path.
    pub fn secrets(&self) -> &HashMap<String, String> {
        &self.secrets
    }

    pub fn connection_params(&self) -> ConnectionParams {
        let get = |key: &str| self.attributes.get(key).cloned().unwrap_or_default();
        ConnectionParams {
            appliance_url: get("applianceUrl"),
            authn_id: get("authnId"),
            account: get("account"),
            identity: get("identity"),
            ssl_certificate: get("sslCertificate"),
        }
    }
}

fn resolve_version(attributes: &HashMap<String, String>) -> Result<ConfigVersion> {
    match attributes.get(CONFIGURATION_VERSION_KEY).map(String::as_str) {
        None | Some("") => {
            let version = ConfigVersion::default();
            info!(version = %version, "Configuration version not provided, using default");
            Ok(version)
        }
        Some(given) => {
            let version = given.parse::<ConfigVersion>().inspect_err(|_| {
                error!(version = given, "Unsupported configuration version");
            })?;
            info!(version = %version, "Provided configuration version");
            Ok(version)
        }
    }
}

fn service_account_token(attributes: &HashMap<String, String>) -> Result<String> {
    let raw = attributes
        .get(SERVICE_ACCOUNT_TOKENS_KEY)
        .map(String::as_str)
        .unwrap_or_default();

    // A null entry for an audience counts as no token at all.
    let tokens: HashMap<String, Option<ServiceAccountToken>> = serde_json::from_str(raw)
        .map_err(|e| {
            error!(
                attribute = SERVICE_ACCOUNT_TOKENS_KEY,
                error = %e,
                "Failed to unmarshal attribute"
            );
            MountConfigError::TokenDecode { key: SERVICE_ACCOUNT_TOKENS_KEY, source: e }
        })?;

    match tokens.get(PROVIDER_NAME).and_then(Option::as_ref) {
        Some(entry) if !entry.token.is_empty() => {
            debug!(
                audience = PROVIDER_NAME,
                expires = entry.expiration_timestamp.as_deref().unwrap_or("unknown"),
                "Found serviceaccount token"
            );
            Ok(entry.token.clone())
        }
        _ => {
            error!(audience = PROVIDER_NAME, "Missing serviceaccount token for audience");
            Err(MountConfigError::MissingToken { audience: PROVIDER_NAME })
        }
    }
}

fn check_required_attributes(attributes: &HashMap<String, String>) -> Result<()> {
    let missing: Vec<&'static str> = REQUIRED_CONNECTION_KEYS
        .iter()
        .copied()
        .filter(|key| attributes.get(*key).map_or(true, |v| v.is_empty()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        error!(missing = ?missing, "Missing required Conjur config attributes");
        Err(MountConfigError::MissingAttributes { keys: missing })
    }
}

async fn pod_annotation_secrets(
    attributes: &HashMap<String, String>,
    annotations: &dyn PodAnnotations,
) -> Result<String> {
    let namespace = attributes.get(POD_NAMESPACE_KEY).map(String::as_str).unwrap_or_default();
    let pod_name = attributes.get(POD_NAME_KEY).map(String::as_str).unwrap_or_default();

    let pod_annotations =
        annotations.get_pod_annotations(namespace, pod_name).await.map_err(|e| {
            error!(error = %e, "Failed to retrieve pod annotations");
            MountConfigError::AnnotationLookup(e)
        })?;

    match pod_annotations.get(SECRETS_ANNOTATION_KEY) {
        Some(spec) if !spec.is_empty() => Ok(spec.clone()),
        _ => {
            error!(
                annotation = SECRETS_ANNOTATION_KEY,
                pod = pod_name,
                "Annotation missing or empty"
            );
            Err(MountConfigError::MissingAnnotation { key: SECRETS_ANNOTATION_KEY })
        }
    }
}

/// Parse an octal file mode such as `"777"` or `"0644"`.
fn parse_permissions(raw: &str) -> Result<u32> {
    let value = raw.trim();
    let invalid = |reason: String| {
        error!(permission = raw, reason = %reason, "Failed to unmarshal file permissions");
        MountConfigError::PermissionDecode { value: raw.to_string(), reason }
    };

    if value.is_empty() {
        return Err(invalid("permission is empty".to_string()));
    }
    if !value.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(invalid(format!("{:?} is not an octal file mode", value)));
    }

    let mode = u32::from_str_radix(value, 8).map_err(|e| invalid(e.to_string()))?;
    if mode > MAX_PERMISSIONS {
        return Err(invalid(format!("{:#o} exceeds {:#o}", mode, MAX_PERMISSIONS)));
    }
    Ok(mode)
}
