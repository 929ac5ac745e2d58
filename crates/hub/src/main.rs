//! Hub service entry point.
//!
//! WebSocket push hub with HTTP notify endpoints.

use anyhow::Result;
use hub::{create_router, AppState, Hub, IDLE_DEADLINE_MS};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How often the idle sweeper runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Hub service");

    // Read configuration from environment
    let http_port: u16 = env::var("HTTP_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("HTTP_PORT must be a number");
    let metrics_port: u16 = env::var("METRICS_PORT")
        .unwrap_or_else(|_| "9091".to_string())
        .parse()
        .expect("METRICS_PORT must be a number");

    info!("Configuration:");
    info!("  HTTP_PORT: {}", http_port);
    info!("  METRICS_PORT: {}", metrics_port);

    // Start Prometheus metrics server
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()
        .expect("Failed to start Prometheus exporter");
    info!("Prometheus metrics server started on port {}", metrics_port);

    // Create session registry
    let hub = Arc::new(Hub::new());

    // Sweep sessions that stopped answering pings
    let sweeper_hub = hub.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            let swept = sweeper_hub.sweep_idle(IDLE_DEADLINE_MS);
            if swept > 0 {
                info!("Swept {} idle sessions", swept);
            }
        }
    });

    // Create application state
    let state = Arc::new(AppState { hub });

    // Create HTTP router
    let app = create_router(state);

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Hub listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
