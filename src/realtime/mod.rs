//! Client side of the live feedback channel.
//!
//! A [`ConnectionManager`] keeps at most one WebSocket open per identity,
//! reconnects with capped exponential backoff, gates the channel on user
//! activity through a [`ConnectPolicy`], and forwards decoded domain
//! events to an [`EventHandler`].

pub mod activity;
pub mod backoff;
pub mod dispatcher;
pub mod machine;
pub mod manager;
pub mod session;
pub mod status;
pub mod transport;

pub use activity::{ActivityKind, ActivityMonitor, AlwaysOn, ConnectPolicy, PolicyAction};
pub use backoff::Backoff;
pub use dispatcher::{DispatchOutcome, Dispatcher, EventHandler, decode};
pub use machine::{
    CloseReason, ConnectionId, ConnectionMachine, ConnectionState, Effect, Input,
    NORMAL_CLOSE_CODE,
};
pub use manager::ConnectionManager;
pub use session::{IdentityProvider, SessionBinding, SessionChange};
pub use status::{ConnectionStatus, StatusBoard};
pub use transport::{Connector, TransportEvent, TransportSink, WsConnector, endpoint_for};
