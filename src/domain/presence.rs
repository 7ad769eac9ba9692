//! Registry of subjects with an open push connection.
//!
//! A subject may hold several connections at once (two browser tabs), so
//! the registry counts connections per subject and only forgets a subject
//! when its last connection goes away.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::SubjectId;

/// Tracks open hub connections per subject.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: RwLock<HashMap<SubjectId, usize>>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection for `subject`. Returns the subject's
    /// connection count afterwards.
    pub async fn connect(&self, subject: &SubjectId) -> usize {
        let mut map = self.connections.write().await;
        let count = map.entry(subject.clone()).or_insert(0);
        *count = count.saturating_add(1);
        tracing::info!(%subject, connections = *count, "subject connected");
        *count
    }

    /// Records that one of `subject`'s connections closed. Returns the
    /// remaining connection count.
    pub async fn disconnect(&self, subject: &SubjectId) -> usize {
        let mut map = self.connections.write().await;
        let remaining = match map.get_mut(subject) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            map.remove(subject);
        }
        tracing::info!(%subject, connections = remaining, "subject disconnected");
        remaining
    }

    /// Returns the connected subjects, sorted.
    pub async fn connected_users(&self) -> Vec<SubjectId> {
        let map = self.connections.read().await;
        let mut users: Vec<SubjectId> = map.keys().cloned().collect();
        users.sort();
        users
    }

    /// Returns `true` if `subject` has at least one open connection.
    pub async fn is_connected(&self, subject: &SubjectId) -> bool {
        self.connections.read().await.contains_key(subject)
    }
}
