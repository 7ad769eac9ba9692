//! Broadcast channel for per-user push events.
//!
//! [`PushBus`] wraps a [`tokio::sync::broadcast`] channel. Every pushed
//! event is tagged with its recipient, and each hub connection subscribes
//! and forwards only the envelopes addressed to its own subject.

use tokio::sync::broadcast;

use super::SubjectId;

/// One event addressed to one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEnvelope {
    /// Recipient of the event.
    pub subject: SubjectId,
    /// Event kind (wire `type`).
    pub kind: String,
    /// Event payload (wire `data`).
    pub data: serde_json::Value,
}

/// Broadcast bus for [`PushEnvelope`]s.
///
/// When the ring buffer is full, the oldest envelopes are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct PushBus {
    sender: broadcast::Sender<PushEnvelope>,
}

impl PushBus {
    /// Creates a new `PushBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an envelope to all hub connections.
    ///
    /// Returns the number of receivers that saw it; zero when nobody is
    /// connected.
    pub fn publish(&self, envelope: PushEnvelope) -> usize {
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Sends an event to one subject.
    pub fn send_to_user(&self, subject: &SubjectId, kind: &str, data: serde_json::Value) -> usize {
        let delivered = self.publish(PushEnvelope {
            subject: subject.clone(),
            kind: kind.to_string(),
            data,
        });
        tracing::debug!(%subject, kind, delivered, "push event published");
        delivered
    }

    /// Sends the same event to several subjects, one envelope each.
    pub fn send_to_users(
        &self,
        subjects: &[SubjectId],
        kind: &str,
        data: &serde_json::Value,
    ) -> usize {
        subjects
            .iter()
            .map(|s| self.send_to_user(s, kind, data.clone()))
            .sum()
    }

    /// Creates a new receiver for all future envelopes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PushEnvelope> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
