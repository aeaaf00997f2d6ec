//! Lane Race Server - authoritative tick server for the lane racing game
//!
//! This is the main entry point for the game server. It handles:
//! - The game task: track scrolling, scoring against the lookahead oracle
//! - WebSocket connections for players
//! - HTTP endpoints for game control and reporting
//! - Server-hosted autonomous drivers

mod agent;
mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::GameServer;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Lane Race Server");
    info!("Server address: {}", config.server_addr);
    info!(
        rate = config.game.rate,
        duration = config.game.duration,
        max_players = config.game.max_players,
        seed = config.game.seed,
        "Game configuration"
    );

    // Spawn the game task
    let (game_server, game) = GameServer::with_random_track(config.game.clone());
    tokio::spawn(game_server.run());

    // Spawn autonomous drivers
    for name in &config.bot_players {
        let handle = game.clone();
        let name = name.clone();
        tokio::spawn(async move {
            if let Err(e) = agent::run_agent(handle, name.clone()).await {
                error!(player = %name, error = %e, "Agent stopped");
            }
        });
    }

    // Create application state
    let state = AppState::new(config.clone(), game);

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
