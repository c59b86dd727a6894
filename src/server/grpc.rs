//! gRPC server on the provider's Unix socket.
//!
//! The Secrets Store CSI driver discovers providers by socket file in its
//! providers directory and calls `Version` and `Mount` over it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::errors::{Error, Result};
use crate::observability::GrpcTracingLayer;
use crate::proto::v1alpha1::csi_driver_provider_server::{
    CsiDriverProvider, CsiDriverProviderServer,
};
use crate::proto::v1alpha1::{MountRequest, MountResponse, VersionRequest, VersionResponse};
use crate::provider::CsiProvider;

/// Provider directories the CSI driver watches out of the box.
pub const STANDARD_PROVIDER_DIRS: [&str; 2] =
    ["/etc/kubernetes/secrets-store-csi-providers", "/var/run/secrets-store-csi-providers"];

const SERVER_NAME: &str = "gRPC";

/// Adapts a [`CsiProvider`] to the generated `CSIDriverProvider` service.
#[derive(Clone)]
pub struct ProviderService {
    provider: Arc<dyn CsiProvider>,
}

impl ProviderService {
    pub fn new(provider: Arc<dyn CsiProvider>) -> Self {
        Self { provider }
    }
}

#[tonic::async_trait]
impl CsiDriverProvider for ProviderService {
    async fn version(
        &self,
        request: Request<VersionRequest>,
    ) -> std::result::Result<Response<VersionResponse>, Status> {
        self.provider.version(request.into_inner()).await.map(Response::new)
    }

    async fn mount(
        &self,
        request: Request<MountRequest>,
    ) -> std::result::Result<Response<MountResponse>, Status> {
        self.provider.mount(request.into_inner()).await.map(Response::new)
    }
}

/// Serves a [`CsiProvider`] on a Unix domain socket.
pub struct ProviderServer {
    socket_path: PathBuf,
    provider: Arc<dyn CsiProvider>,
    shutdown: CancellationToken,
}

impl ProviderServer {
    pub fn new(socket_path: impl Into<PathBuf>, provider: Arc<dyn CsiProvider>) -> Self {
        let socket_path = socket_path.into();
        info!("Creating and registering gRPC server");

        if !is_standard_provider_dir(&socket_path) {
            let dir = socket_path.parent().unwrap_or_else(|| Path::new(""));
            warn!(
                "Using non-standard providers directory {}: Ensure this directory has been \
                 configured on your CSI Driver before proceeding",
                dir.display()
            );
        }

        Self { socket_path, provider, shutdown: CancellationToken::new() }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and serve until [`stop`](Self::stop) is called.
    ///
    /// A stale socket file left by a previous run is replaced. The socket
    /// file is removed again once serving ends.
    pub async fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            debug!("gRPC server stopped before start");
            return Ok(());
        }

        let address = self.socket_path.display().to_string();
        remove_socket_file(&self.socket_path)
            .await
            .map_err(|e| Error::listener_bind(SERVER_NAME, address.clone(), e))?;

        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| Error::listener_bind(SERVER_NAME, address.clone(), e))?;

        info!(socket = %address, "Serving gRPC server on socket");

        let result = Server::builder()
            .layer(GrpcTracingLayer::new())
            .add_service(CsiDriverProviderServer::new(ProviderService::new(self.provider.clone())))
            .serve_with_incoming_shutdown(
                UnixListenerStream::new(listener),
                self.shutdown.clone().cancelled_owned(),
            )
            .await;

        if let Err(e) = remove_socket_file(&self.socket_path).await {
            warn!(socket = %address, error = %e, "Failed to remove provider socket");
        }

        result.map_err(|e| Error::serve(SERVER_NAME, e.to_string()))?;
        info!("gRPC server stopped");
        Ok(())
    }

    /// Request a graceful stop. In-flight calls are drained before
    /// [`start`](Self::start) returns. Safe to call more than once.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Stopping gRPC server");
            self.shutdown.cancel();
        }
    }
}

fn is_standard_provider_dir(socket_path: &Path) -> bool {
    socket_path
        .parent()
        .is_some_and(|dir| STANDARD_PROVIDER_DIRS.iter().any(|standard| dir == Path::new(standard)))
}

async fn remove_socket_file(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(socket = %path.display(), "Removed provider socket file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
