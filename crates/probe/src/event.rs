//! The closed set of events a probe connection can produce.

use crate::error::ProbeError;

/// Events observed on a probe connection, delivered in occurrence order.
///
/// `Connected` always precedes any `Inbound`. `Error` and `Closed` are
/// terminal and emitted at most once per connection; nothing follows them.
#[derive(Debug)]
pub enum ProbeEvent {
    /// Handshake completed; the configured payload has been handed to the socket.
    Connected,
    /// One received data frame, converted to displayable text.
    Inbound(String),
    /// Transport failure after the handshake. Terminal.
    Error(ProbeError),
    /// The peer closed the connection. Terminal.
    Closed,
}
