//! Integration tests for the provider process servers
//!
//! Runs the gRPC socket and liveness servers under the shutdown coordinator
//! and talks to them the way the CSI driver and kubelet do.

mod common;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conjur_csi_provider::conjur::{self, ConjurError, ConnectionParams, SecretStore};
use conjur_csi_provider::proto::v1alpha1::csi_driver_provider_client::CsiDriverProviderClient;
use conjur_csi_provider::proto::v1alpha1::VersionRequest;
use conjur_csi_provider::provider::{ConjurProvider, CsiProvider};
use conjur_csi_provider::server::{run_until_shutdown, HealthServer, ProviderServer};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use common::{attributes, mount_request, StaticAnnotations, SECRETS_SPEC};

struct FixedStore {
    secrets: Option<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecretStore for FixedStore {
    async fn get_secrets(
        &self,
        _connection: &ConnectionParams,
        jwt: &str,
        _secret_ids: &[String],
    ) -> conjur::Result<HashMap<String, Vec<u8>>> {
        assert_eq!(jwt, "workload-jwt");
        self.secrets.clone().ok_or_else(|| ConjurError::retrieval("Conjur unavailable"))
    }
}

fn conjur_provider(secrets: Option<&[(&str, &str)]>) -> Arc<dyn CsiProvider> {
    let secrets = secrets.map(|pairs| {
        pairs.iter().map(|(k, v)| (k.to_string(), v.as_bytes().to_vec())).collect()
    });
    Arc::new(ConjurProvider::new(
        Arc::new(FixedStore { secrets }),
        Arc::new(StaticAnnotations::with_secrets(SECRETS_SPEC)),
    ))
}

async fn connect(socket_path: &Path) -> CsiDriverProviderClient<Channel> {
    for _ in 0..100 {
        let path = socket_path.to_path_buf();
        let channel = Endpoint::try_from("http://[::]:50051")
            .unwrap()
            .connect_with_connector(service_fn(move |_: Uri| {
                let path = path.clone();
                async move {
                    let stream = UnixStream::connect(path).await?;
                    Ok::<_, std::io::Error>(TokioIo::new(stream))
                }
            }))
            .await;
        if let Ok(channel) = channel {
            return CsiDriverProviderClient::new(channel);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("provider socket {} never became ready", socket_path.display());
}

async fn health_port(health: &HealthServer) -> u16 {
    for _ in 0..100 {
        if let Some(addr) = health.local_addr() {
            return addr.port();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("health server never bound");
}

struct Running {
    socket_path: PathBuf,
    health: Arc<HealthServer>,
    stop: oneshot::Sender<()>,
    run: tokio::task::JoinHandle<conjur_csi_provider::server::ShutdownReport>,
    _dir: tempfile::TempDir,
}

fn start(provider: Arc<dyn CsiProvider>) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("conjur.sock");
    let grpc = Arc::new(ProviderServer::new(&socket_path, provider.clone()));
    let health = Arc::new(HealthServer::new(provider, 0));
    let (stop, signal) = oneshot::channel::<()>();

    let run = tokio::spawn(run_until_shutdown(grpc, health.clone(), async move {
        let _ = signal.await;
    }));

    Running { socket_path, health, stop, run, _dir: dir }
}

#[tokio::test]
async fn test_mount_over_provider_socket() {
    let running = start(conjur_provider(Some(&[
        ("conjur/path/A", "contentA"),
        ("conjur/path/B", "contentB"),
    ])));

    let mut client = connect(&running.socket_path).await;
    let response = client
        .mount(mount_request(&attributes("https://conjur.example.com"), "600"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.files.len(), 2);
    assert_eq!(response.files[0].path, "file/path/A");
    assert_eq!(response.files[0].mode, 0o600);
    assert_eq!(response.files[0].contents, b"contentA".to_vec());
    assert_eq!(response.object_version[1].id, "conjur/path/B");

    let version =
        client.version(VersionRequest { version: "v1alpha1".into() }).await.unwrap().into_inner();
    assert_eq!(version.runtime_name, "conjur");

    drop(client);
    running.stop.send(()).unwrap();
    let report = running.run.await.unwrap();
    assert!(report.is_clean(), "unexpected failures: {:?}", report.errors);
    assert!(!running.socket_path.exists());
}

#[tokio::test]
async fn test_mount_failure_status_over_socket() {
    let running = start(conjur_provider(None));

    let mut client = connect(&running.socket_path).await;
    let status = client
        .mount(mount_request(&attributes("https://conjur.example.com"), "600"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unavailable);

    let status = client
        .mount(mount_request(&HashMap::new(), "600"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);

    drop(client);
    running.stop.send(()).unwrap();
    assert!(running.run.await.unwrap().is_clean());
}

#[tokio::test]
async fn test_liveness_probe() {
    let running = start(conjur_provider(Some(&[])));
    let port = health_port(&running.health).await;

    let response = reqwest::get(format!("http://127.0.0.1:{}/healthz", port)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    running.stop.send(()).unwrap();
    assert!(running.run.await.unwrap().is_clean());

    assert!(reqwest::get(format!("http://127.0.0.1:{}/healthz", port)).await.is_err());
}
