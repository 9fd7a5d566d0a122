mod models;
mod handlers;
mod routes;
mod docs;
mod websocket;
mod config;
mod services;
mod ws;

use config::Config;
use routes::create_app;
use std::panic;
use std::sync::Arc;
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ws::AppState;

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration before logging so LOG_LEVEL can shape the filter
    let loaded = Config::load();
    let log_level = loaded
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to the configured level, but allow debug for our app
            format!("codesync_relay=debug,tower_http=debug,{log_level}").into()
        }))
        .init();

    info!("Starting server...");

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            warn!("Using default configuration");
            Config::default()
        }
    };

    if config.is_development() {
        info!("Running in {} mode", config.environment);
    }
    match config.chat_history_limit {
        Some(limit) => info!("Chat history capped at {} messages per room", limit),
        None => warn!("Chat history is unbounded"),
    }

    let address = config.server_address();
    let state = Arc::new(AppState::new(config.clone()));
    let app = create_app(state, &config);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", address));

    info!("🚀 {} running on http://{}", config.service_name, address);
    info!("📡 WebSocket available at ws://{}/ws", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }
    info!("Server closed");
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, closing server..."),
        _ = terminate => info!("SIGTERM received, closing server..."),
    }
}
