//! Per-socket session state and the session registry.
//!
//! Uses lock-free DashMap so no global lock is held across sessions.

use crate::error::{HubError, Result};
use axum::extract::ws::Message;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Buffer size for per-session outbound channels.
/// Bounded so a stalled socket cannot buffer without limit.
pub const SESSION_CHANNEL_BUFFER_SIZE: usize = 256;

/// State for a single connected session.
pub struct ClientSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Username carried on the upgrade query string; empty when absent.
    pub username: String,
    /// Channel feeding the session's writer task.
    pub tx: mpsc::Sender<Message>,
    /// Timestamp when the session connected (ms).
    pub connected_at: i64,
    /// Timestamp of the last pong received (ms).
    pub last_pong: AtomicI64,
}

impl ClientSession {
    pub fn new(username: String, tx: mpsc::Sender<Message>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4(),
            username,
            tx,
            connected_at: now,
            last_pong: AtomicI64::new(now),
        }
    }

    /// Send a text frame to this session.
    /// Uses try_send for non-blocking behavior - drops the frame if the buffer is full.
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.tx
            .try_send(Message::Text(text.to_string().into()))
            .map_err(|_| HubError::ChannelSend)
    }

    /// Ask the session's socket to close. The writer task forwards the
    /// close frame; once it is on the wire the writer refuses further
    /// frames and the read loop tears the session down on the peer's
    /// close reply or stream end.
    pub fn close(&self) {
        let _ = self.tx.try_send(Message::Close(None));
    }

    /// Update the last pong timestamp.
    pub fn update_pong(&self) {
        self.last_pong
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Get the last pong timestamp.
    pub fn last_pong_time(&self) -> i64 {
        self.last_pong.load(Ordering::Relaxed)
    }
}

/// Lock-free registry of connected sessions.
pub struct Hub {
    sessions: DashMap<SessionId, Arc<ClientSession>>,
}

impl Hub {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a new session.
    pub fn register(&self, session: Arc<ClientSession>) -> SessionId {
        let id = session.id;
        self.sessions.insert(id, session);
        info!("Session {} registered", id);
        id
    }

    /// Unregister a session.
    pub fn unregister(&self, id: &SessionId) {
        if self.sessions.remove(id).is_some() {
            info!("Session {} unregistered", id);
        }
    }

    /// Get the total number of connected sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Send a text frame to every connected session.
    /// Returns how many sessions the frame was handed to.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut reached = 0;
        for entry in self.sessions.iter() {
            match entry.value().send_text(text) {
                Ok(()) => reached += 1,
                Err(_) => debug!("Failed to send to session {}", entry.key()),
            }
        }
        reached
    }

    /// Send a text frame to every session registered under a username.
    /// The same user may be connected from several places, so this targets
    /// a list, not a single session. Returns how many were reached.
    pub fn send_to_user(&self, username: &str, text: &str) -> usize {
        let mut reached = 0;
        for entry in self.sessions.iter() {
            let session = entry.value();
            if session.username == username {
                match session.send_text(text) {
                    Ok(()) => reached += 1,
                    Err(_) => debug!("Failed to send to session {}", session.id),
                }
            }
        }
        reached
    }

    /// Disconnect sessions whose last pong is older than the idle deadline.
    /// Each stale session is sent a close frame and removed from the
    /// registry. Returns how many were swept.
    pub fn sweep_idle(&self, max_idle_ms: i64) -> usize {
        let now = Utc::now().timestamp_millis();
        let stale_ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| now - entry.value().last_pong_time() > max_idle_ms)
            .map(|entry| *entry.key())
            .collect();

        for id in &stale_ids {
            warn!("Disconnecting idle session {}", id);
            if let Some((_, session)) = self.sessions.remove(id) {
                session.close();
                info!("Session {} unregistered", id);
            }
        }
        stale_ids.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
