//! WebSocket push hub.
//!
//! Accepts WebSocket sessions on `/ws`, greets each one, acknowledges every
//! data frame, and pushes notifications into connected sessions through
//! plain HTTP endpoints:
//!
//! - `GET /ping` broadcasts a timestamped test message to every session
//! - `GET /send?client=<username>` notifies every session of that user
//! - `GET /health` reports the session count
//!
//! Sessions are pinged periodically; a session that stays silent past the
//! idle deadline is swept by a background task.

pub mod client;
pub mod error;
pub mod protocol;
pub mod ws_server;

pub use client::{ClientSession, Hub, SessionId};
pub use error::{HubError, Result};
pub use ws_server::{create_router, AppState, IDLE_DEADLINE_MS, MAX_MESSAGE_SIZE, PING_INTERVAL};
