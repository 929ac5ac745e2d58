//! WebSocket server and HTTP notify endpoints using Axum.

use crate::client::{ClientSession, Hub, SESSION_CHANNEL_BUFFER_SIZE};
use crate::protocol;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Interval between server pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Sessions that go longer than this without a pong are swept.
/// Must be comfortably larger than PING_INTERVAL.
pub const IDLE_DEADLINE_MS: i64 = 100_000;

/// Maximum accepted frame size.
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Shared application state.
pub struct AppState {
    pub hub: Arc<Hub>,
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    username: String,
}

/// Query parameters for the /send endpoint.
#[derive(Debug, Deserialize)]
pub struct SendQuery {
    #[serde(default)]
    client: String,
}

/// JSON body returned by the notify endpoints.
#[derive(Serialize)]
struct NotifyResponse {
    message: &'static str,
}

/// Create the hub router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ping", get(ping_handler))
        .route("/send", get(send_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clients = state.hub.session_count();
    format!(r#"{{"status":"ok","clients":{}}}"#, clients)
}

/// Broadcast a timestamped test message to every connected session.
async fn ping_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reached = state.hub.broadcast(&protocol::broadcast_notification());
    debug!("Broadcast test message reached {} sessions", reached);
    Json(NotifyResponse { message: "ok" })
}

/// Notify every session registered under the named username.
/// A missing `client` parameter behaves like an unknown username.
async fn send_handler(
    Query(query): Query<SendQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let reached = state
        .hub
        .send_to_user(&query.client, protocol::DIRECT_NOTIFICATION);
    if reached == 0 {
        return Json(NotifyResponse {
            message: "no client",
        });
    }
    debug!("Notified {} sessions of user {}", reached, query.client);
    Json(NotifyResponse { message: "ok" })
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, query.username))
}

/// Handle one WebSocket session for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, username: String) {
    // Split the socket into sender and receiver
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Bounded channel feeding the writer task
    let (tx, mut rx) = mpsc::channel::<Message>(SESSION_CHANNEL_BUFFER_SIZE);

    let session = Arc::new(ClientSession::new(username, tx));
    let session_id = state.hub.register(session.clone());

    counter!("hub_connections_total").increment(1);
    gauge!("hub_active_sessions").set(state.hub.session_count() as f64);

    info!(
        "Session {} connected (username: {:?})",
        session_id, session.username
    );

    // Spawn task to forward frames from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // First frame every session sees
    if session.send_text(protocol::GREETING).is_err() {
        warn!("Failed to greet session {}", session_id);
    }

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.reset(); // Don't fire immediately

    loop {
        tokio::select! {
            biased;

            // Handle incoming WebSocket messages
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        counter!("hub_messages_received_total").increment(1);
                        if session.send_text(&protocol::ack(&text)).is_err() {
                            warn!("Dropping ack for slow session {}", session_id);
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        counter!("hub_messages_received_total").increment(1);
                        let text = String::from_utf8_lossy(&data).into_owned();
                        if session.send_text(&protocol::ack(&text)).is_err() {
                            warn!("Dropping ack for slow session {}", session_id);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        session.update_pong();
                        if session.tx.try_send(Message::Pong(data)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        session.update_pong();
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Session {} sent close frame: {:?}", session_id, frame);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for session {}: {:?}", session_id, e);
                        break;
                    }
                    None => {
                        // Connection closed
                        break;
                    }
                }
            }

            // Send ping periodically
            _ = ping_interval.tick() => {
                if session.tx.try_send(Message::Ping(Vec::new().into())).is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup
    state.hub.unregister(&session_id);
    send_task.abort();

    counter!("hub_disconnections_total").increment(1);
    gauge!("hub_active_sessions").set(state.hub.session_count() as f64);

    info!("Session {} disconnected", session_id);
}
