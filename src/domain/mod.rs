//! Domain layer: identities, feedback records, push events, and the
//! server-side registries.
//!
//! The client core only needs [`Identity`], [`InboundEvent`] and the
//! feedback types; the bus and registries back the push hub.

pub mod feedback;
pub mod feedback_board;
pub mod feedback_event;
pub mod identity;
pub mod presence;
pub mod push_bus;
pub mod token_registry;

pub use feedback::{FeedbackId, FeedbackRecord, Sentiment, UserSummary};
pub use feedback_board::{BoardChange, FeedbackBoard};
pub use feedback_event::{ControlKind, EventKind, FeedbackEvent, InboundEvent};
pub use identity::{Identity, SubjectId};
pub use presence::PresenceRegistry;
pub use push_bus::{PushBus, PushEnvelope};
pub use token_registry::TokenRegistry;
