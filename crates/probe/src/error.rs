//! Error types for the probe.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("no host in URL: {0}")]
    MissingHost(String),

    #[error("DNS resolution failed for {addr}: {source}")]
    Dns {
        addr: String,
        source: std::io::Error,
    },

    #[error("all connection attempts failed: {0:?}")]
    Dial(Vec<SocketAddr>),

    #[error("TLS config error: {0}")]
    Tls(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
