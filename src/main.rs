use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod client;
mod config;
mod hub;
mod lobby;
mod messages;
mod orchestration;
mod registry;
mod server;
mod shutdown;
#[cfg(test)]
mod test_utils;

use crate::config::{Config, ConnectionLimits, ReaperSettings};
use crate::orchestration::{
    GameSession, OrchestrationCallbacks, SessionOrchestrator, StandaloneOrchestrator,
};
use crate::registry::SessionRegistry;
use crate::server::AppState;
use crate::shutdown::ShutdownSignal;

/// Entry point: starts the lobby registry, the connection hub and the HTTP server
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();
    info!(
        "Starting 7hand server (environment={}, fleet={})",
        config.environment, config.fleet_id
    );

    // Installed first so a SIGTERM during startup still shuts down cleanly.
    let mut shutdown = ShutdownSignal::install().context("failed to install signal handlers")?;

    let registry = SessionRegistry::start(ReaperSettings::default());
    let hub = hub::spawn(registry.clone());

    let callbacks = if config.enable_orchestration {
        let mut standalone = StandaloneOrchestrator::new(config.fleet_id.clone())
            .with_health_interval(Duration::from_secs(config.health_check_interval));
        if let Some(game_session_id) = &config.game_session_id {
            standalone = standalone.with_session(GameSession::new(game_session_id.clone()));
        }
        let orchestrator: Arc<dyn SessionOrchestrator> = Arc::new(standalone);
        let callbacks = Arc::new(OrchestrationCallbacks::new(
            registry.clone(),
            orchestrator.clone(),
        ));
        // Containers log to stdout; everything else keeps a file for upload.
        let log_paths = if config.environment == "container" {
            Vec::new()
        } else {
            vec!["/local/game/logs/server.log".to_string()]
        };
        orchestrator
            .process_ready(config.port, &log_paths, callbacks.clone())
            .context("failed to report process ready")?;
        info!("Orchestration initialized");
        Some(callbacks)
    } else {
        info!("Orchestration disabled, running standalone");
        None
    };

    let (server, address) = server::build(
        &config,
        AppState {
            registry,
            hub,
            limits: ConnectionLimits::default(),
        },
    )
    .context("failed to bind HTTP listener")?;
    info!("Accepting WebSocket connections on ws://{}/ws", address);
    let handle = server.handle();
    let running = actix_web::rt::spawn(server);

    tokio::select! {
        signal = shutdown.recv() => {
            info!("Received {}, shutting down server...", signal);
        }
        result = running => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
            }
        }
    }

    handle.stop(true).await;

    if let Some(callbacks) = callbacks {
        callbacks.on_process_terminate().await;
    }

    info!("Server shutdown complete");
    Ok(())
}
