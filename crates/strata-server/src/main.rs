//! Strata server - standalone object server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_core::security::AllowAll;
use strata_core::Persistence;
use strata_model::ModelRegistry;
use strata_server::{create_transport, schema, Args, RequestHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        protocol_version = strata_proto::PROTOCOL_VERSION,
        "starting strata server"
    );

    let args = Args::parse();
    let config = args.into_config();

    tracing::info!(
        data_path = %config.data_path.display(),
        tcp_address = ?config.tcp_address,
        ipc_address = ?config.ipc_address,
        session_timeout_secs = config.session_timeout.as_secs(),
        "configuration loaded"
    );

    if config.has_default_secret() {
        tracing::warn!("capability secret left at development default, set --secret");
    }

    let registry = Arc::new(ModelRegistry::new());
    match &config.models_path {
        Some(path) => {
            tracing::info!(models_path = %path.display(), "loading model schema");
            let file = schema::load_schema(path)?;
            schema::register_models(&file, &registry)?;
        }
        None => {
            tracing::warn!("no model schema configured, starting with empty registry");
        }
    }

    tracing::info!("opening table store");
    let persistence = Persistence::open(
        &config.data_path,
        registry.clone(),
        Arc::new(AllowAll),
        config.capability_secret.as_bytes(),
        config.session_timeout,
    )?;
    tracing::info!(models = registry.names().len(), "table store opened");

    let handler = Arc::new(RequestHandler::new(Arc::new(persistence)));

    let transport = create_transport(&config, handler.clone())?;

    // Periodic cleanup of idle sessions and their cursors
    let sessions = handler.persistence().sessions().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "expired sessions removed");
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx_clone.send(());
    });

    tracing::info!("server ready, accepting connections");
    match transport.run_until_shutdown(shutdown_rx).await {
        Ok(()) => {
            tracing::info!("server shutdown complete");
        }
        Err(e) => {
            tracing::error!(error = %e, "server error");
            return Err(e.into());
        }
    }

    Ok(())
}
