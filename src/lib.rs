//! # feedback-live
//!
//! Real-time feedback notifications: a resilient WebSocket client core and
//! the per-user push hub it talks to.
//!
//! The client side ([`realtime`]) keeps at most one connection per
//! authenticated identity, reconnects with capped exponential backoff,
//! disconnects idle users and reconnects them on their next interaction,
//! and hands decoded feedback events to the application. The server side
//! ([`api`], [`ws`], [`service`]) authenticates subscribers, fans feedback
//! lifecycle changes out to the employee and the manager involved, and
//! keeps every connection alive with heartbeats.
//!
//! ## Architecture
//!
//! ```text
//! Backend (REST)                         Dashboards
//!     │                                      │
//!     ├── REST Handlers (api/)               ├── ConnectionManager (realtime/)
//!     │                                      │     ├── ConnectionMachine
//!     ├── NotificationService (service/)     │     ├── ConnectPolicy
//!     │                                      │     ├── Dispatcher ──► FeedbackBoard
//!     ├── PushBus (domain/) ──────┐          │     └── WsConnector
//!     │                           │          │
//!     └── PresenceRegistry        └──► WS Handler (ws/) ◄──── /ws/sse/{id}/?token=
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod realtime;
pub mod service;
pub mod ws;
