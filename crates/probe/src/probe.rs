//! Single-shot WebSocket probe: connect, send one payload, surface events.

use crate::error::{ProbeError, Result};
use crate::event::ProbeEvent;
use crate::tls::build_connector;
use futures::{SinkExt, StreamExt};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    client_async_tls_with_config, tungstenite::Message, Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;
use url::Url;

/// Buffer size for the event channel. Sends are awaited, so this only bounds
/// how far the pump can run ahead of the consumer; no event is ever dropped.
const EVENT_CHANNEL_BUFFER_SIZE: usize = 32;

/// Configuration for one probe run, fixed at connect time.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Target URL; `ws` or `wss` scheme.
    pub url: String,
    /// Appended to the URL as a `username` query pair when set.
    pub username: Option<String>,
    /// The one text payload sent after the handshake.
    pub payload: String,
    /// Accept self-signed or otherwise invalid peer certificates.
    /// Off by default; enabling it is logged loudly.
    pub danger_accept_invalid_certs: bool,
    /// Per-address TCP dial timeout.
    pub connect_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: "wss://localhost:8080/ws".to_string(),
            username: None,
            payload: "Hello from Node.js!".to_string(),
            danger_accept_invalid_certs: false,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// A connected probe. Dropping it closes the event channel; the pump task
/// notices on its next send and stops.
pub struct Probe {
    events: mpsc::Receiver<ProbeEvent>,
}

impl Probe {
    /// Await the next event. Returns `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<ProbeEvent> {
        self.events.recv().await
    }
}

/// Open the connection and start the pump.
///
/// A handshake failure returns `Err` before any data frame is sent and
/// before any event is emitted. On success the pump emits `Connected`,
/// sends the configured payload exactly once, then reads frames until a
/// terminal condition.
pub async fn connect(config: ProbeConfig) -> Result<Probe> {
    let url = build_target_url(&config)?;
    debug!("Initiating WebSocket handshake with {}", url);

    let host = url
        .host_str()
        .ok_or_else(|| ProbeError::MissingHost(config.url.clone()))?;
    let use_tls = url.scheme() == "wss";
    let port = url.port().unwrap_or(if use_tls { 443 } else { 80 });
    let addr_str = format!("{}:{}", host, port);

    // Resolve DNS and prefer IPv4 to avoid IPv6 timeout issues
    let addrs: Vec<SocketAddr> = addr_str
        .to_socket_addrs()
        .map_err(|e| ProbeError::Dns {
            addr: addr_str.clone(),
            source: e,
        })?
        .collect();
    let sorted_addrs = sort_ipv4_first(addrs);
    debug!("Resolved addresses (IPv4 first): {:?}", sorted_addrs);

    let mut tcp_stream = None;
    for addr in &sorted_addrs {
        debug!("Trying to connect to {}", addr);
        match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                debug!("TCP connected to {}", addr);
                tcp_stream = Some(stream);
                break;
            }
            Ok(Err(e)) => {
                debug!("TCP connect to {} failed: {}", addr, e);
            }
            Err(_) => {
                debug!("TCP connect to {} timed out", addr);
            }
        }
    }
    let tcp_stream = tcp_stream.ok_or(ProbeError::Dial(sorted_addrs))?;

    let connector = if use_tls {
        build_connector(config.danger_accept_invalid_certs)?
    } else {
        Connector::Plain
    };

    let (ws_stream, response) =
        client_async_tls_with_config(url.as_str(), tcp_stream, None, Some(connector)).await?;
    debug!(
        "WebSocket handshake complete, status: {:?}",
        response.status()
    );

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);
    tokio::spawn(run_pump(ws_stream, config.payload, tx));

    Ok(Probe { events: rx })
}

/// Parse the configured URL and append the `username` query pair.
fn build_target_url(config: &ProbeConfig) -> Result<Url> {
    let mut url = Url::parse(&config.url)?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(ProbeError::UnsupportedScheme(other.to_string())),
    }
    if let Some(username) = &config.username {
        url.query_pairs_mut().append_pair("username", username);
    }
    Ok(url)
}

fn sort_ipv4_first(addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let mut sorted: Vec<SocketAddr> = addrs.iter().filter(|a| a.is_ipv4()).copied().collect();
    sorted.extend(addrs.iter().filter(|a| a.is_ipv6()).copied());
    sorted
}

/// Owns both socket halves for the lifetime of the connection. Emits
/// `Connected`, sends the payload once, then translates frames into events
/// until a terminal condition. A failed event send means the `Probe` was
/// dropped; the pump stops quietly.
async fn run_pump(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    payload: String,
    events: mpsc::Sender<ProbeEvent>,
) {
    let (mut write, mut read) = ws_stream.split();

    if events.send(ProbeEvent::Connected).await.is_err() {
        return;
    }

    debug!("Sending payload: {}", payload);
    if let Err(e) = write.send(Message::Text(payload)).await {
        let _ = events.send(ProbeEvent::Error(e.into())).await;
        return;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if events.send(ProbeEvent::Inbound(text)).await.is_err() {
                    return;
                }
            }
            Ok(Message::Binary(data)) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                if events.send(ProbeEvent::Inbound(text)).await.is_err() {
                    return;
                }
            }
            Ok(Message::Ping(data)) => {
                debug!("Received ping, sending pong");
                if let Err(e) = write.send(Message::Pong(data)).await {
                    let _ = events.send(ProbeEvent::Error(e.into())).await;
                    return;
                }
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong");
            }
            Ok(Message::Close(frame)) => {
                debug!("Received close frame: {:?}", frame);
                let _ = events.send(ProbeEvent::Closed).await;
                return;
            }
            Ok(Message::Frame(_)) => {
                // Raw frame, ignore
            }
            Err(e) => {
                let _ = events.send(ProbeEvent::Error(e.into())).await;
                return;
            }
        }
    }
    let _ = events.send(ProbeEvent::Closed).await;
}
