//! Liveness endpoint.
//!
//! `GET /healthz` runs an in-process `Version` call against the provider and
//! reports whether it succeeded.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, OnceLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::{Error, Result};
use crate::proto::v1alpha1::VersionRequest;
use crate::provider::CsiProvider;

/// Version string sent by liveness probes.
pub const HEALTH_PROBE_VERSION: &str = "health";

const SERVER_NAME: &str = "health";

/// Build the liveness router.
pub fn health_router(provider: Arc<dyn CsiProvider>) -> Router {
    Router::new().route("/healthz", get(healthz)).with_state(provider)
}

async fn healthz(State(provider): State<Arc<dyn CsiProvider>>) -> StatusCode {
    let request = VersionRequest { version: HEALTH_PROBE_VERSION.to_string() };
    match provider.version(request).await {
        Ok(_) => StatusCode::OK,
        Err(status) => {
            error!(error = %status, "Health check failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// HTTP server for the liveness endpoint.
pub struct HealthServer {
    provider: Arc<dyn CsiProvider>,
    port: u16,
    shutdown: CancellationToken,
    local_addr: OnceLock<SocketAddr>,
}

impl HealthServer {
    pub fn new(provider: Arc<dyn CsiProvider>, port: u16) -> Self {
        Self { provider, port, shutdown: CancellationToken::new(), local_addr: OnceLock::new() }
    }

    /// Address the server is listening on, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind `0.0.0.0:{port}` and serve until [`stop`](Self::stop) is called.
    pub async fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            debug!("Health server stopped before start");
            return Ok(());
        }

        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| Error::listener_bind(SERVER_NAME, address.to_string(), e))?;
        let bound = listener.local_addr()?;
        let _ = self.local_addr.set(bound);

        info!(port = bound.port(), "Serving health server on port");

        axum::serve(listener, health_router(self.provider.clone()))
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned())
            .await
            .map_err(|e| Error::serve(SERVER_NAME, e.to_string()))?;

        info!("Health server stopped");
        Ok(())
    }

    /// Request a graceful stop. Safe to call more than once.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Stopping health server");
            self.shutdown.cancel();
        }
    }
}
