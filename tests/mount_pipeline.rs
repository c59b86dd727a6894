//! End-to-end tests for the mount pipeline
//!
//! Requests go through `ConjurProvider` with the real Conjur HTTP client
//! pointed at a wiremock Conjur, and pod annotations served from memory.

mod common;

use std::sync::Arc;

use conjur_csi_provider::conjur::ConjurClient;
use conjur_csi_provider::proto::v1alpha1::{File, ObjectVersion, VersionRequest};
use conjur_csi_provider::provider::{ConjurProvider, CsiProvider, MountConfigError, MountError};
use tonic::Code;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{attributes, mount_request, StaticAnnotations, SECRETS_SPEC};

async fn conjur_returning(secrets: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authn-jwt/kube/default/host%2Fapp/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("access-token"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secrets))
        .mount(&server)
        .await;
    server
}

fn provider(annotations: Arc<StaticAnnotations>) -> ConjurProvider {
    ConjurProvider::new(Arc::new(ConjurClient::default()), annotations)
}

#[tokio::test]
async fn test_v010_mount_from_inline_secrets() {
    let conjur = conjur_returning(serde_json::json!({
        "default:variable:conjur/path/A": "contentA",
    }))
    .await;
    let annotations = Arc::new(StaticAnnotations::with_secrets("- \"other\": \"other/id\""));

    let mut attributes = attributes(&conjur.uri());
    attributes.insert("conjur.org/configurationVersion".into(), "0.1.0".into());
    attributes.insert("secrets".into(), "- \"file/path/A\": \"conjur/path/A\"".into());

    let response = provider(annotations.clone())
        .mount_secrets(&mount_request(&attributes, "777"))
        .await
        .unwrap();

    assert_eq!(annotations.lookups(), 0);
    assert_eq!(
        response.files,
        vec![File { path: "file/path/A".into(), mode: 511, contents: b"contentA".to_vec() }]
    );
    assert_eq!(
        response.object_version,
        vec![ObjectVersion { id: "conjur/path/A".into(), version: "1".into() }]
    );
}

#[tokio::test]
async fn test_default_version_mounts_from_pod_annotation() {
    let conjur = conjur_returning(serde_json::json!({
        "default:variable:conjur/path/A": "contentA",
        "default:variable:conjur/path/B": "contentB",
    }))
    .await;
    let annotations = Arc::new(StaticAnnotations::with_secrets(SECRETS_SPEC));

    let mut attributes = attributes(&conjur.uri());
    attributes.insert("secrets".into(), "- \"file/path/C\": \"conjur/path/C\"".into());

    let response = provider(annotations.clone())
        .mount_secrets(&mount_request(&attributes, "0440"))
        .await
        .unwrap();

    assert_eq!(annotations.lookups(), 1);
    assert_eq!(annotations.seen(), vec![("apps".to_string(), "app-7d9f".to_string())]);

    let paths: Vec<_> = response.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["file/path/A", "file/path/B"]);
    assert!(response.files.iter().all(|f| f.mode == 0o440));
    assert_eq!(response.object_version.len(), 2);
}

#[tokio::test]
async fn test_batch_requests_every_secret_in_spec() {
    let conjur = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("access-token"))
        .mount(&conjur)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets"))
        .and(query_param(
            "variable_ids",
            "default:variable:conjur/path/A,default:variable:conjur/path/B",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&conjur)
        .await;

    let response = provider(Arc::new(StaticAnnotations::with_secrets(SECRETS_SPEC)))
        .mount_secrets(&mount_request(&attributes(&conjur.uri()), "644"))
        .await
        .unwrap();
    assert!(response.files.is_empty());
}

#[tokio::test]
async fn test_unsupported_version_fails_before_anything_else() {
    let conjur = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&conjur)
        .await;
    let annotations = Arc::new(StaticAnnotations::with_secrets(SECRETS_SPEC));

    let mut attributes = attributes(&conjur.uri());
    attributes.insert("conjur.org/configurationVersion".into(), "0.3.0".into());
    attributes.insert("csi.storage.k8s.io/serviceAccount.tokens".into(), "not json".into());

    let err = provider(annotations.clone())
        .mount_secrets(&mount_request(&attributes, "not a mode"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MountError::Config(MountConfigError::UnsupportedConfigVersion { ref version })
            if version == "0.3.0"
    ));
    assert_eq!(annotations.lookups(), 0);
}

#[tokio::test]
async fn test_reports_all_missing_connection_attributes() {
    let annotations = Arc::new(StaticAnnotations::with_secrets(SECRETS_SPEC));
    let mut attributes = attributes("https://conjur.example.com");
    for key in ["account", "authnId", "sslCertificate"] {
        attributes.remove(key);
    }

    let status = provider(annotations.clone())
        .mount(mount_request(&attributes, "777"))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    let expected =
        r#"Missing required Conjur config attributes: ["account" "authnId" "sslCertificate"]"#;
    assert!(status.message().contains(expected));
    assert_eq!(annotations.lookups(), 0);
}

#[tokio::test]
async fn test_empty_spec_never_yields_empty_mount() {
    let annotations = Arc::new(StaticAnnotations::with_secrets("[]"));
    let err = provider(annotations)
        .mount_secrets(&mount_request(&attributes("https://conjur.example.com"), "777"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MountError::Config(MountConfigError::MissingAttribute { name: "secrets" })
    ));
}

#[tokio::test]
async fn test_store_failure_is_single_unavailable_error() {
    let conjur = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("access-token"))
        .mount(&conjur)
        .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&conjur).await;

    let status = provider(Arc::new(StaticAnnotations::with_secrets(SECRETS_SPEC)))
        .mount(mount_request(&attributes(&conjur.uri()), "777"))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unavailable);
    assert!(status.message().contains("Failed to get Conjur secrets"));
}

#[tokio::test]
async fn test_version_reports_provider_identity() {
    let response = provider(Arc::new(StaticAnnotations::default()))
        .version(VersionRequest { version: "v1alpha1".into() })
        .await
        .unwrap();

    assert_eq!(response.version, "v1alpha1");
    assert_eq!(response.runtime_name, "conjur");
    assert_eq!(response.runtime_version, conjur_csi_provider::PROVIDER_VERSION);
}
