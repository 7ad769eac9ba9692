//! Events carried over the push channel.
//!
//! The wire format is `{"type": <kind>, "data": <payload>}`. Kinds are kept
//! as an open set: the five feedback kinds are named, anything else is
//! carried as [`EventKind::Other`] and forwarded verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::feedback::{FeedbackId, FeedbackRecord};

/// Control-plane kinds that manage the channel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Periodic keep-alive from the server.
    Heartbeat,
    /// Acknowledgement sent once after the server accepts the connection.
    Connected,
}

impl ControlKind {
    /// Recognizes a control kind by its wire name.
    #[must_use]
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "heartbeat" => Some(Self::Heartbeat),
            "connected" => Some(Self::Connected),
            _ => None,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Connected => "connected",
        }
    }
}

/// Kind of a domain event delivered to the registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// An employee received new feedback.
    NewFeedback,
    /// A manager's feedback was stored.
    FeedbackCreated,
    /// A feedback record changed.
    FeedbackUpdated,
    /// A feedback record was removed.
    FeedbackDeleted,
    /// An employee acknowledged a feedback record.
    FeedbackAcknowledged,
    /// Any other kind, forwarded unmodified.
    Other(String),
}

impl EventKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewFeedback => "new_feedback",
            Self::FeedbackCreated => "feedback_created",
            Self::FeedbackUpdated => "feedback_updated",
            Self::FeedbackDeleted => "feedback_deleted",
            Self::FeedbackAcknowledged => "feedback_acknowledged",
            Self::Other(kind) => kind,
        }
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "new_feedback" => Self::NewFeedback,
            "feedback_created" => Self::FeedbackCreated,
            "feedback_updated" => Self::FeedbackUpdated,
            "feedback_deleted" => Self::FeedbackDeleted,
            "feedback_acknowledged" => Self::FeedbackAcknowledged,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(kind: String) -> Self {
        Self::from(kind.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded domain event as handed to the registered handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Payload, untouched.
    pub payload: serde_json::Value,
}

impl InboundEvent {
    /// Creates a new inbound event.
    #[must_use]
    pub fn new(kind: impl Into<EventKind>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Typed view of a feedback lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    /// New feedback addressed to the current user.
    NewFeedback(FeedbackRecord),
    /// Feedback authored by the current user was stored.
    Created(FeedbackRecord),
    /// A record changed.
    Updated(FeedbackRecord),
    /// A record was acknowledged by its employee.
    Acknowledged(FeedbackRecord),
    /// A record was deleted.
    Deleted(FeedbackId),
}

#[derive(Deserialize)]
struct DeletedRef {
    id: FeedbackId,
}

impl FeedbackEvent {
    /// Interprets an inbound event as a feedback lifecycle event.
    ///
    /// Returns `None` for unknown kinds or payloads that do not match the
    /// expected record shape.
    #[must_use]
    pub fn from_inbound(event: &InboundEvent) -> Option<Self> {
        let record = || serde_json::from_value::<FeedbackRecord>(event.payload.clone()).ok();
        match &event.kind {
            EventKind::NewFeedback => record().map(Self::NewFeedback),
            EventKind::FeedbackCreated => record().map(Self::Created),
            EventKind::FeedbackUpdated => record().map(Self::Updated),
            EventKind::FeedbackAcknowledged => record().map(Self::Acknowledged),
            EventKind::FeedbackDeleted => serde_json::from_value::<DeletedRef>(event.payload.clone())
                .ok()
                .map(|r| Self::Deleted(r.id)),
            EventKind::Other(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_name() {
        for name in [
            "new_feedback",
            "feedback_created",
            "feedback_updated",
            "feedback_deleted",
            "feedback_acknowledged",
            "team_changed",
        ] {
            assert_eq!(EventKind::from(name).as_str(), name);
        }
        assert_eq!(
            EventKind::from("team_changed"),
            EventKind::Other("team_changed".to_string())
        );
    }

    #[test]
    fn control_kinds_are_recognized() {
        assert_eq!(ControlKind::from_wire("heartbeat"), Some(ControlKind::Heartbeat));
        assert_eq!(ControlKind::from_wire("connected"), Some(ControlKind::Connected));
        assert_eq!(ControlKind::from_wire("new_feedback"), None);
    }

    #[test]
    fn inbound_event_serializes_kind_as_string() {
        let event = InboundEvent::new("feedback_deleted", serde_json::json!({"id": 7}));
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({"kind": "feedback_deleted", "payload": {"id": 7}})
        );
    }

    #[test]
    fn deleted_event_carries_id() {
        let event = InboundEvent::new("feedback_deleted", serde_json::json!({"id": 7}));
        assert_eq!(
            FeedbackEvent::from_inbound(&event),
            Some(FeedbackEvent::Deleted(7))
        );
    }

    #[test]
    fn unknown_kind_has_no_typed_view() {
        let event = InboundEvent::new("pong", serde_json::json!({"timestamp": 1.0}));
        assert!(FeedbackEvent::from_inbound(&event).is_none());
    }

    #[test]
    fn updated_event_parses_record() {
        let event = InboundEvent::new(
            "feedback_updated",
            serde_json::json!({"id": 3, "strengths": "focus", "sentiment": "negative"}),
        );
        let Some(FeedbackEvent::Updated(record)) = FeedbackEvent::from_inbound(&event) else {
            panic!("expected updated event");
        };
        assert_eq!(record.id, 3);
        assert_eq!(record.strengths, "focus");
    }
}
