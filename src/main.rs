use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use conjur_csi_provider::{
    conjur::ConjurClient,
    k8s::KubePodAnnotations,
    observability::{init_logging, log_startup_info},
    provider::{ConjurProvider, CsiProvider},
    server::{run_until_shutdown, HealthServer, ProviderServer},
    ObservabilityConfig, ProviderArgs,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Only fails when another provider won the race, which is fine
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    install_rustls_provider();

    let args = ProviderArgs::parse();
    let observability_config = ObservabilityConfig::from_env();
    init_logging(&observability_config).context("failed to initialize logging")?;
    log_startup_info(&args, &observability_config);
    args.validate().context("invalid provider flags")?;

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    let provider: Arc<dyn CsiProvider> = Arc::new(ConjurProvider::new(
        Arc::new(ConjurClient::default()),
        Arc::new(KubePodAnnotations::new()),
    ));
    let grpc_server = Arc::new(ProviderServer::new(&args.socket_path, provider.clone()));
    let health_server = Arc::new(HealthServer::new(provider, args.health_port));

    let report = run_until_shutdown(grpc_server, health_server, async move {
        tokio::select! {
            _ = terminate.recv() => info!(signal = "SIGTERM", "Received termination signal"),
            _ = interrupt.recv() => info!(signal = "SIGINT", "Received termination signal"),
        }
    })
    .await;

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &report.errors {
            error!(error = %failure, "Provider terminated with error");
        }
        Ok(ExitCode::FAILURE)
    }
}
