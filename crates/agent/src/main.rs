//! Task endpoint agent
//!
//! Runs the task metadata and credentials server next to the containers it
//! serves, plus a local introspection server for health and metrics.

use anyhow::Result;
use std::sync::Arc;
use task_endpoint::{
    AuditLogger, Collaborators, FileAuditLogger, MemoryCredentialsManager, MemoryEngineState,
    MemoryStatsEngine, MemoryTagStore, StructuredLogger, TaskServer, TracingAuditLogger,
};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting task-endpoint-agent");

    let config = config::AgentConfig::load()?;
    info!(cluster = %config.cluster, "Agent configured");

    let audit: Arc<dyn AuditLogger> = match &config.audit_log_path {
        Some(path) => {
            info!(path = %path.display(), "Writing credentials audit log to file");
            Arc::new(FileAuditLogger::open(path)?)
        }
        None => Arc::new(TracingAuditLogger),
    };

    let engine_state = Arc::new(MemoryEngineState::new());
    let collaborators = Collaborators {
        engine_state: engine_state.clone(),
        credentials: Arc::new(MemoryCredentialsManager::new()),
        stats: Arc::new(MemoryStatsEngine::new()),
        control_plane: Arc::new(MemoryTagStore::new()),
        audit,
    };

    let server_config = config.server_config();
    let logger = StructuredLogger::new(&config.cluster, &config.container_instance_arn);
    logger.log_startup(
        AGENT_VERSION,
        &server_config.socket_addr().to_string(),
        server_config.steady_state_rate,
        server_config.burst,
    );

    let server = TaskServer::new(collaborators, server_config);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(server.serve(async move {
        let _ = shutdown_rx.await;
    }));

    let app_state = Arc::new(api::AppState::new(engine_state, config.cluster.clone()));
    let api_handle = tokio::spawn(api::serve(config.introspection_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Task endpoint server failed"),
        Err(e) => error!(error = %e, "Task endpoint server task panicked"),
    }
    api_handle.abort();

    info!("Shutting down");
    Ok(())
}
