//! Coordinated startup and shutdown of the provider and health servers.

use std::future::Future;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use super::{HealthServer, ProviderServer};
use crate::errors::{Error, Result};

/// Failures observed while running and stopping the servers.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub errors: Vec<Error>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(
        &mut self,
        server: &'static str,
        result: std::result::Result<Result<()>, JoinError>,
        stopping: bool,
    ) {
        match result {
            Ok(Ok(())) if stopping => {}
            Ok(Ok(())) => {
                warn!(server, "Server exited unexpectedly");
                self.errors.push(Error::internal(format!("{} server exited unexpectedly", server)));
            }
            Ok(Err(e)) => {
                error!(server, error = %e, "Server failed");
                self.errors.push(e);
            }
            Err(e) => {
                error!(server, error = %e, "Server task panicked");
                self.errors.push(Error::internal(format!("{} server task failed: {}", server, e)));
            }
        }
    }
}

/// Run both servers until one of them exits or `signal` resolves.
///
/// Whatever the trigger, the health server is stopped first and the provider
/// server second, each exactly once. Failures from either server, including
/// task panics, are collected in the returned report rather than raised.
pub async fn run_until_shutdown<F>(
    provider: Arc<ProviderServer>,
    health: Arc<HealthServer>,
    signal: F,
) -> ShutdownReport
where
    F: Future<Output = ()>,
{
    let mut report = ShutdownReport::default();

    let mut provider_task: JoinHandle<Result<()>> = tokio::spawn({
        let provider = provider.clone();
        async move { provider.start().await }
    });
    let mut health_task: JoinHandle<Result<()>> = tokio::spawn({
        let health = health.clone();
        async move { health.start().await }
    });

    let mut provider_finished = false;
    let mut health_finished = false;

    tokio::select! {
        result = &mut provider_task => {
            provider_finished = true;
            report.record("CSI provider", result, false);
        }
        result = &mut health_task => {
            health_finished = true;
            report.record("CSI provider health", result, false);
        }
        _ = signal => {
            info!("Shutdown signal received");
        }
    }

    health.stop();
    if !health_finished {
        report.record("CSI provider health", health_task.await, true);
    }

    provider.stop();
    if !provider_finished {
        report.record("CSI provider", provider_task.await, true);
    }

    if report.is_clean() {
        info!("Shutdown complete");
    } else {
        error!(failures = report.errors.len(), "Shutdown complete with failures");
    }
    report
}
