//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::HubConfig;
use crate::domain::{PresenceRegistry, PushBus, TokenRegistry};
use crate::service::NotificationService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Notification service for feedback lifecycle events.
    pub notifications: Arc<NotificationService>,
    /// Push bus the hub connections subscribe to.
    pub push_bus: PushBus,
    /// Subjects with an open hub connection.
    pub presence: Arc<PresenceRegistry>,
    /// Accepted credentials.
    pub tokens: Arc<TokenRegistry>,
    /// Interval between heartbeat frames.
    pub heartbeat_interval: Duration,
}

impl AppState {
    /// Builds the state described by `config`.
    #[must_use]
    pub fn from_config(config: &HubConfig) -> Self {
        let push_bus = PushBus::new(config.push_bus_capacity);
        Self {
            notifications: Arc::new(NotificationService::new(push_bus.clone())),
            push_bus,
            presence: Arc::new(PresenceRegistry::new()),
            tokens: Arc::new(TokenRegistry::from_pairs(config.tokens.iter().cloned())),
            heartbeat_interval: config.heartbeat_interval,
        }
    }
}
