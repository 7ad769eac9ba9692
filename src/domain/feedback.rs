//! Feedback records as pushed by the server.
//!
//! Deserialization is lenient: every field except `id` has a default so
//! that a partially populated payload still reconciles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SubjectId;

/// Numeric identifier of a feedback record.
pub type FeedbackId = u64;

/// Overall tone of a feedback entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// Positive feedback.
    Positive,
    /// Neutral feedback (server default).
    #[default]
    Neutral,
    /// Negative feedback.
    Negative,
}

/// Public view of a user embedded in a feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User id; the same id addresses the user's push channel.
    pub id: SubjectId,
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Whether the user manages a team.
    #[serde(default)]
    pub is_manager: bool,
}

/// A feedback entry from a manager to an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Record id.
    pub id: FeedbackId,
    /// Recipient of the feedback.
    #[serde(default)]
    pub employee: Option<UserSummary>,
    /// Author of the feedback.
    #[serde(default)]
    pub manager: Option<UserSummary>,
    /// What went well.
    #[serde(default)]
    pub strengths: String,
    /// What to work on.
    #[serde(default)]
    pub areas_to_improve: String,
    /// Overall tone.
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Whether the employee acknowledged the feedback.
    #[serde(default)]
    pub acknowledged: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Acknowledgement time, if acknowledged.
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl FeedbackRecord {
    /// Subject id of the employee, if embedded.
    #[must_use]
    pub fn employee_id(&self) -> Option<&SubjectId> {
        self.employee.as_ref().map(|u| &u.id)
    }

    /// Subject id of the manager, if embedded.
    #[must_use]
    pub fn manager_id(&self) -> Option<&SubjectId> {
        self.manager.as_ref().map(|u| &u.id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_payload() {
        let json = serde_json::json!({
            "id": 12,
            "employee": {"id": 4, "username": "ana", "email": "ana@example.com",
                         "first_name": "Ana", "last_name": "Ruiz", "is_manager": false},
            "manager": {"id": 2, "username": "bo", "is_manager": true},
            "strengths": "clear writing",
            "areas_to_improve": "estimates",
            "sentiment": "positive",
            "acknowledged": false,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
            "acknowledged_at": null
        });
        let Ok(record) = serde_json::from_value::<FeedbackRecord>(json) else {
            panic!("payload rejected");
        };
        assert_eq!(record.id, 12);
        assert_eq!(record.sentiment, Sentiment::Positive);
        assert_eq!(record.employee_id(), Some(&SubjectId::from(4_u64)));
        assert_eq!(record.manager_id(), Some(&SubjectId::from(2_u64)));
        assert!(record.acknowledged_at.is_none());
    }

    #[test]
    fn id_only_payload_uses_defaults() {
        let Ok(record) = serde_json::from_str::<FeedbackRecord>(r#"{"id": 7}"#) else {
            panic!("id-only payload rejected");
        };
        assert_eq!(record.sentiment, Sentiment::Neutral);
        assert!(record.employee.is_none());
        assert!(!record.acknowledged);
    }
}
