//! Push hub wire frames.
//!
//! Every server frame is a JSON object with a `type` discriminator. Control
//! frames (`connected`, `heartbeat`, `pong`) carry their own fields; event
//! frames carry the event kind as `type` and its payload as `data`.

use serde::{Deserialize, Serialize};

use crate::domain::SubjectId;

/// Control frames sent by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// First frame after the upgrade.
    Connected {
        /// Human-readable greeting.
        message: String,
        /// Subject the connection belongs to.
        user_id: SubjectId,
    },
    /// Keep-alive.
    Heartbeat {
        /// Server time in seconds since the Unix epoch.
        timestamp: f64,
    },
    /// Reply to a client `ping`.
    Pong {
        /// Server time in seconds since the Unix epoch.
        timestamp: f64,
    },
}

impl ControlFrame {
    /// Greeting for `subject`.
    #[must_use]
    pub fn connected(subject: &SubjectId) -> Self {
        Self::Connected {
            message: "WebSocket connection established".to_string(),
            user_id: subject.clone(),
        }
    }

    /// Heartbeat stamped with the current time.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: unix_seconds(),
        }
    }

    /// Pong stamped with the current time.
    #[must_use]
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: unix_seconds(),
        }
    }
}

/// A domain event addressed to the connection's subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload.
    pub data: serde_json::Value,
}

/// Frame sent by a client. Only the `type` is inspected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFrame {
    /// Frame kind, e.g. `ping`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

fn unix_seconds() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1_000.0
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn connected_frame_shape() {
        let frame = ControlFrame::connected(&SubjectId::from("4"));
        assert_eq!(
            serde_json::to_value(&frame).unwrap_or_default(),
            json!({
                "type": "connected",
                "message": "WebSocket connection established",
                "user_id": "4"
            })
        );
    }

    #[test]
    fn event_frame_uses_type_and_data() {
        let frame = EventFrame {
            kind: "feedback_deleted".to_string(),
            data: json!({"id": 7}),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap_or_default(),
            json!({"type": "feedback_deleted", "data": {"id": 7}})
        );
    }

    #[test]
    fn heartbeat_is_tagged_and_stamped() {
        let value = serde_json::to_value(ControlFrame::heartbeat()).unwrap_or_default();
        assert_eq!(value.get("type"), Some(&json!("heartbeat")));
        assert!(value.get("timestamp").and_then(serde_json::Value::as_f64).is_some_and(|t| t > 0.0));
    }

    #[test]
    fn client_frame_tolerates_missing_type() {
        let frame: ClientFrame = serde_json::from_str("{}").unwrap_or_default();
        assert!(frame.kind.is_none());
    }
}
