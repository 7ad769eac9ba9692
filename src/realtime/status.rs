//! Observable status surface.
//!
//! [`StatusBoard`] wraps a [`tokio::sync::watch`] channel holding the latest
//! [`ConnectionStatus`]. Renderers clone a receiver and await changes; the
//! manager publishes after every transition and only wakes receivers when
//! the snapshot actually changed.

use serde::Serialize;
use tokio::sync::watch;

use super::machine::ConnectionState;

/// Snapshot of the connection as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// `true` only while the transport is open.
    pub is_connected: bool,
    /// Last error text, cleared by a successful open.
    pub error: Option<String>,
    /// Consecutive abnormal closures so far.
    pub retry_attempt: u32,
}

impl ConnectionStatus {
    /// Label for the connection indicator.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        if self.is_connected { "Live" } else { "Offline" }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            is_connected: false,
            error: None,
            retry_attempt: 0,
        }
    }
}

/// Publisher side of the status surface.
#[derive(Debug)]
pub struct StatusBoard {
    sender: watch::Sender<ConnectionStatus>,
}

impl StatusBoard {
    /// Creates a board holding the default (idle, offline) status.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ConnectionStatus::default());
        Self { sender }
    }

    /// Publishes `status`; receivers are notified only on change.
    /// Returns `true` if the status changed.
    pub fn publish(&self, status: ConnectionStatus) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        })
    }

    /// Creates a receiver that observes future changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.sender.subscribe()
    }

    /// Returns the latest published status.
    #[must_use]
    pub fn current(&self) -> ConnectionStatus {
        self.sender.borrow().clone()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::realtime::machine::CloseReason;

    #[test]
    fn default_is_offline() {
        let status = ConnectionStatus::default();
        assert_eq!(status.label(), "Offline");
        assert!(status.error.is_none());
    }

    #[test]
    fn serializes_for_rendering() {
        let status = ConnectionStatus {
            state: ConnectionState::Closed(CloseReason::Abnormal),
            is_connected: false,
            error: Some("max attempts exceeded".to_string()),
            retry_attempt: 5,
        };
        let json = serde_json::to_value(&status).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({
                "state": {"closed": "abnormal"},
                "isConnected": false,
                "error": "max attempts exceeded",
                "retryAttempt": 5
            })
        );
    }

    #[tokio::test]
    async fn publish_notifies_only_on_change() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe();

        assert!(!board.publish(ConnectionStatus::default()));
        assert!(!rx.has_changed().unwrap_or(true));

        let open = ConnectionStatus {
            state: ConnectionState::Open,
            is_connected: true,
            ..ConnectionStatus::default()
        };
        assert!(board.publish(open.clone()));
        let Ok(()) = rx.changed().await else {
            panic!("status sender dropped");
        };
        assert_eq!(*rx.borrow_and_update(), open);
        assert_eq!(board.current().label(), "Live");
    }
}
