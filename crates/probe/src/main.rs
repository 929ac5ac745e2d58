//! WebSocket smoke test: connect once, send one payload, log whatever
//! comes back until the connection ends.

use anyhow::Result;
use probe::{connect, ProbeConfig, ProbeEvent};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

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

    // Read configuration from environment
    let url = env::var("WS_URL").unwrap_or_else(|_| "wss://localhost:8080/ws".to_string());
    let username = env::var("WS_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let insecure: bool = env::var("WS_INSECURE")
        .unwrap_or_else(|_| "true".to_string())
        .parse()
        .unwrap_or(true);

    info!("Starting WebSocket smoke test");
    info!("  WS_URL: {}", url);
    info!("  WS_USERNAME: {}", username);
    info!("  WS_INSECURE: {}", insecure);
    if insecure {
        warn!("TLS certificate verification is disabled (WS_INSECURE=true)");
    }

    let config = ProbeConfig {
        url,
        username: Some(username),
        danger_accept_invalid_certs: insecure,
        ..ProbeConfig::default()
    };

    // A smoke test reports what it saw; it never retries and never fails
    // the process.
    let mut probe = match connect(config).await {
        Ok(probe) => probe,
        Err(e) => {
            error!("WebSocket error: {}", e);
            return Ok(());
        }
    };

    while let Some(event) = probe.next_event().await {
        match event {
            ProbeEvent::Connected => info!("WebSocket connected"),
            ProbeEvent::Inbound(text) => info!("Received message: {}", text),
            ProbeEvent::Error(e) => error!("WebSocket error: {}", e),
            ProbeEvent::Closed => info!("WebSocket connection closed"),
        }
    }

    Ok(())
}
