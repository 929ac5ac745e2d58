//! Hub error types.

use thiserror::Error;

/// Hub error type.
#[derive(Debug, Error)]
pub enum HubError {
    /// Channel send error (session buffer full or writer gone).
    #[error("Channel send error")]
    ChannelSend,
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
