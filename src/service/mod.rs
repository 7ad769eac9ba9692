//! Service layer: business logic orchestration.
//!
//! [`NotificationService`] maps feedback lifecycle changes onto push events
//! and publishes them through the [`super::domain::PushBus`].

pub mod notification_service;

pub use notification_service::{FeedbackAction, NotificationService};
