//! Fixed wire strings exchanged with sessions and notify callers.

use chrono::Local;

/// First frame sent to every session after the upgrade.
pub const GREETING: &str = "websocket connection established";

/// Prefix of the reply acknowledging a received data frame.
pub const ACK_PREFIX: &str = "server received: ";

/// Frame sent to the sessions named by `/send`.
pub const DIRECT_NOTIFICATION: &str = "hello, client";

/// Reply acknowledging one received data frame.
pub fn ack(payload: &str) -> String {
    format!("{}{}", ACK_PREFIX, payload)
}

/// Timestamped test message broadcast by `/ping`.
pub fn broadcast_notification() -> String {
    format!("hello, time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_carries_the_payload() {
        assert_eq!(ack("hi"), "server received: hi");
        assert_eq!(ack(""), "server received: ");
    }

    #[test]
    fn test_broadcast_notification_shape() {
        let msg = broadcast_notification();
        assert!(msg.starts_with("hello, time: "));
        // "YYYY-MM-DD HH:MM:SS" is 19 characters.
        assert_eq!(msg.len(), "hello, time: ".len() + 19);
    }
}
