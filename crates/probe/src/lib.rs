//! Single-shot WebSocket smoke-test client.
//!
//! Opens one outbound connection, sends one fixed text payload after the
//! handshake, and surfaces everything that follows as a closed set of
//! [`ProbeEvent`]s read from the returned [`Probe`].

pub mod error;
pub mod event;
pub mod probe;
pub mod tls;

pub use error::{ProbeError, Result};
pub use event::ProbeEvent;
pub use probe::{connect, Probe, ProbeConfig};
