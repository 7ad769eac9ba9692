//! Notification service: turns feedback lifecycle changes into push events.

use serde::{Deserialize, Serialize};

use crate::domain::{FeedbackRecord, PushBus, SubjectId};
use crate::error::HubError;

/// Lifecycle change of a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    /// A manager wrote new feedback.
    Created,
    /// The feedback was edited.
    Updated,
    /// The employee acknowledged the feedback.
    Acknowledged,
    /// The feedback was deleted.
    Deleted,
}

/// Fans feedback changes out to the employee and the manager involved.
///
/// | Action       | Employee receives       | Manager receives        |
/// |--------------|-------------------------|-------------------------|
/// | created      | `new_feedback`          | `feedback_created`      |
/// | updated      | `feedback_updated`      | `feedback_updated`      |
/// | acknowledged | `feedback_acknowledged` | `feedback_acknowledged` |
/// | deleted      | `feedback_deleted {id}` | `feedback_deleted {id}` |
#[derive(Debug, Clone)]
pub struct NotificationService {
    push_bus: PushBus,
}

impl NotificationService {
    /// Creates a service publishing on `push_bus`.
    #[must_use]
    pub const fn new(push_bus: PushBus) -> Self {
        Self { push_bus }
    }

    /// Returns a reference to the inner [`PushBus`].
    #[must_use]
    pub const fn push_bus(&self) -> &PushBus {
        &self.push_bus
    }

    /// Pushes `action` on `record` to both parties. Returns the number of
    /// hub connections that received an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidRequest`] if the record names neither an
    /// employee nor a manager, and [`HubError::Internal`] if the record
    /// cannot be serialized.
    pub fn notify(&self, action: FeedbackAction, record: &FeedbackRecord) -> Result<usize, HubError> {
        let employee = record.employee_id();
        let manager = record.manager_id();
        if employee.is_none() && manager.is_none() {
            return Err(HubError::InvalidRequest(format!(
                "feedback {} has no employee or manager",
                record.id
            )));
        }

        let data = match action {
            FeedbackAction::Deleted => serde_json::json!({ "id": record.id }),
            _ => serde_json::to_value(record).map_err(|e| HubError::Internal(e.to_string()))?,
        };
        let (employee_kind, manager_kind) = match action {
            FeedbackAction::Created => ("new_feedback", "feedback_created"),
            FeedbackAction::Updated => ("feedback_updated", "feedback_updated"),
            FeedbackAction::Acknowledged => ("feedback_acknowledged", "feedback_acknowledged"),
            FeedbackAction::Deleted => ("feedback_deleted", "feedback_deleted"),
        };

        let delivered: usize = [(employee, employee_kind), (manager, manager_kind)]
            .into_iter()
            .filter_map(|(subject, kind)| subject.map(|s| (s, kind)))
            .map(|(subject, kind)| self.push_bus.send_to_user(subject, kind, data.clone()))
            .sum();
        tracing::info!(feedback_id = record.id, ?action, delivered, "feedback notification sent");
        Ok(delivered)
    }

    /// Pushes an arbitrary event to several subjects.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidRequest`] if `subjects` is empty or
    /// `event_type` is blank.
    pub fn push(
        &self,
        subjects: &[SubjectId],
        event_type: &str,
        data: &serde_json::Value,
    ) -> Result<usize, HubError> {
        if subjects.is_empty() {
            return Err(HubError::InvalidRequest("user_ids must not be empty".into()));
        }
        if event_type.trim().is_empty() {
            return Err(HubError::InvalidRequest("event_type must not be blank".into()));
        }
        Ok(self.push_bus.send_to_users(subjects, event_type, data))
    }
}
