//! Push and notification DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::{FeedbackRecord, SubjectId};
use crate::service::FeedbackAction;

/// Request body for `POST /push`.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    /// Recipients.
    pub user_ids: Vec<SubjectId>,
    /// Event kind forwarded as the frame `type`.
    pub event_type: String,
    /// Event payload forwarded as the frame `data`.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Request body for `POST /feedback/events`.
#[derive(Debug, Deserialize)]
pub struct FeedbackEventRequest {
    /// What happened to the record.
    pub action: FeedbackAction,
    /// The record after the change (before it, for deletions).
    pub feedback: FeedbackRecord,
}

/// Response body for both push endpoints.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushResponse {
    /// Hub connections that received an envelope.
    pub delivered: usize,
}

/// Response body for `GET /connections`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionsResponse {
    /// Subjects with at least one open connection, sorted.
    pub connected_users: Vec<SubjectId>,
    /// Number of connected subjects.
    pub count: usize,
}
