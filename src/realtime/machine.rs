//! Connection lifecycle state machine.
//!
//! [`ConnectionMachine`] owns the whole lifecycle record of one logical
//! connection: state, live connection id, retry counter, pending retry and
//! last error. [`ConnectionMachine::apply`] is the single transition
//! function. It never performs I/O; it returns [`Effect`]s for the runtime
//! to execute, so every transition is testable without a transport.
//!
//! Every transport attempt gets a fresh [`ConnectionId`]. Callbacks tagged
//! with an id other than the live one are stale (the connection was
//! deliberately closed or superseded) and are ignored.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::backoff::Backoff;
use super::status::ConnectionStatus;
use crate::config::RealtimeConfig;
use crate::domain::Identity;
use crate::error::RealtimeError;

/// WebSocket close code for a deliberate, non-retryable close.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Identifier of one transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Returns the raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why the connection reached [`ConnectionState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Deliberate close (local `close()`, logout, idle, or peer code 1000).
    Normal,
    /// Network or server failure.
    Abnormal,
}

/// Lifecycle state of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing attempted yet.
    Idle,
    /// Transport handshake in progress.
    Connecting,
    /// Transport established.
    Open,
    /// Deliberate teardown in progress.
    Closing,
    /// No transport.
    Closed(CloseReason),
}

impl ConnectionState {
    /// `true` while a transport is being established or is established.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum Input {
    /// Caller request to connect with the given identity (absent before
    /// login). Resets an exhausted retry budget.
    Open(Option<Identity>),
    /// Connect requested by the connect policy. Ignored once the retry
    /// budget is exhausted; only [`Input::Open`] lifts that.
    Resume(Option<Identity>),
    /// Deliberate close.
    Close,
    /// The transport handshake completed.
    TransportOpened(ConnectionId),
    /// The transport could not be established or failed mid-stream.
    TransportFailed {
        /// Attempt the failure belongs to.
        connection: ConnectionId,
        /// Human-readable cause.
        reason: String,
    },
    /// The transport closed.
    TransportClosed {
        /// Attempt the closure belongs to.
        connection: ConnectionId,
        /// Close code from the peer, if one was sent.
        code: Option<u16>,
    },
    /// The retry timer fired. `allowed` is the connect policy's verdict on
    /// whether reconnecting is still wanted.
    RetryElapsed {
        /// Whether the connect policy still wants a connection.
        allowed: bool,
        /// Identity current at the time the timer fired. A refreshed
        /// credential for the same subject replaces the stored one.
        identity: Option<Identity>,
    },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start a transport attempt.
    Connect {
        /// Id to tag the attempt's callbacks with.
        connection: ConnectionId,
        /// Identity forming the endpoint.
        identity: Identity,
    },
    /// Tear down a transport with [`NORMAL_CLOSE_CODE`].
    Disconnect {
        /// Attempt to tear down.
        connection: ConnectionId,
    },
    /// Arm the retry timer.
    ScheduleRetry {
        /// Delay until the retry.
        delay: Duration,
        /// Retry counter after scheduling (1 for the first retry).
        attempt: u32,
    },
    /// Disarm the retry timer.
    CancelRetry,
}

/// The owned state record of one connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    live: Option<ConnectionId>,
    next_id: u64,
    retry_counter: u32,
    retry_pending: bool,
    target: Option<Identity>,
    last_error: Option<String>,
    backoff: Backoff,
    max_attempts: u32,
}

impl ConnectionMachine {
    /// Creates a machine in [`ConnectionState::Idle`].
    #[must_use]
    pub fn new(backoff: Backoff, max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Idle,
            live: None,
            next_id: 1,
            retry_counter: 0,
            retry_pending: false,
            target: None,
            last_error: None,
            backoff,
            max_attempts,
        }
    }

    /// Creates a machine from the retry settings of `config`.
    #[must_use]
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(
            Backoff::new(config.base_delay, config.max_delay),
            config.max_attempts,
        )
    }

    /// Applies one input and returns the effects to execute, in order.
    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Open(identity) => self.open(identity, true),
            Input::Resume(identity) => self.open(identity, false),
            Input::Close => self.close(),
            Input::TransportOpened(connection) => self.on_opened(connection),
            Input::TransportFailed { connection, reason } => {
                self.on_lost(connection, RealtimeError::TransportOpenFailure(reason))
            }
            Input::TransportClosed { connection, code } => self.on_closed(connection, code),
            Input::RetryElapsed { allowed, identity } => self.on_retry(allowed, identity),
        }
    }

    fn open(&mut self, identity: Option<Identity>, explicit: bool) -> Vec<Effect> {
        if let Some(live) = self.live {
            tracing::debug!(connection = %live, "open ignored: connection already exists");
            return Vec::new();
        }
        let Some(identity) = identity else {
            tracing::debug!(reason = %RealtimeError::AuthMissing, "open ignored");
            return Vec::new();
        };
        let exhausted = self.retry_counter >= self.max_attempts;
        if exhausted && !explicit {
            tracing::debug!(
                attempts = self.retry_counter,
                "automatic open ignored: retry budget exhausted"
            );
            return Vec::new();
        }

        let mut effects = Vec::with_capacity(2);
        if self.retry_pending {
            self.retry_pending = false;
            effects.push(Effect::CancelRetry);
        }
        if exhausted {
            tracing::info!("retry budget reset by explicit open");
            self.retry_counter = 0;
        }
        effects.push(self.begin_connect(identity));
        effects
    }

    fn close(&mut self) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(2);
        if self.retry_pending {
            self.retry_pending = false;
            effects.push(Effect::CancelRetry);
        }
        self.set_state(ConnectionState::Closing);
        if let Some(connection) = self.live.take() {
            effects.push(Effect::Disconnect { connection });
        }
        self.retry_counter = 0;
        self.target = None;
        self.set_state(ConnectionState::Closed(CloseReason::Normal));
        effects
    }

    fn on_opened(&mut self, connection: ConnectionId) -> Vec<Effect> {
        if !self.is_current(connection) || self.state != ConnectionState::Connecting {
            tracing::debug!(%connection, "stale open callback ignored");
            return Vec::new();
        }
        self.retry_counter = 0;
        self.last_error = None;
        self.set_state(ConnectionState::Open);
        Vec::new()
    }

    fn on_closed(&mut self, connection: ConnectionId, code: Option<u16>) -> Vec<Effect> {
        if code == Some(NORMAL_CLOSE_CODE) && self.is_current(connection) {
            tracing::info!(%connection, "peer closed the connection normally");
            self.live = None;
            self.retry_counter = 0;
            self.target = None;
            self.set_state(ConnectionState::Closed(CloseReason::Normal));
            return Vec::new();
        }
        self.on_lost(connection, RealtimeError::AbnormalClose { code })
    }

    fn on_lost(&mut self, connection: ConnectionId, error: RealtimeError) -> Vec<Effect> {
        if !self.is_current(connection) {
            tracing::debug!(%connection, %error, "stale transport callback ignored");
            return Vec::new();
        }
        self.live = None;
        tracing::warn!(%connection, %error, "connection lost");
        self.last_error = Some(error.to_string());
        self.set_state(ConnectionState::Closed(CloseReason::Abnormal));

        if !error.is_retryable() {
            return Vec::new();
        }
        if self.retry_counter >= self.max_attempts {
            let terminal = RealtimeError::MaxRetriesExceeded;
            tracing::warn!(attempts = self.retry_counter, "{terminal}; automatic reconnection stopped");
            self.last_error = Some(terminal.to_string());
            return Vec::new();
        }

        let delay = self.backoff.delay(self.retry_counter);
        self.retry_counter = self.retry_counter.saturating_add(1);
        self.retry_pending = true;
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = self.retry_counter,
            "reconnect scheduled"
        );
        vec![Effect::ScheduleRetry {
            delay,
            attempt: self.retry_counter,
        }]
    }

    fn on_retry(&mut self, allowed: bool, current: Option<Identity>) -> Vec<Effect> {
        if !self.retry_pending {
            tracing::debug!("stale retry timer ignored");
            return Vec::new();
        }
        self.retry_pending = false;
        if self.live.is_some() {
            return Vec::new();
        }
        let Some(target) = self.target.take() else {
            return Vec::new();
        };
        if !allowed {
            tracing::info!("retry dropped: waiting for fresh activity");
            self.retry_counter = 0;
            self.target = Some(target);
            return Vec::new();
        }
        let identity = match current {
            Some(fresh) if fresh.same_subject(&target) => fresh,
            _ => target,
        };
        vec![self.begin_connect(identity)]
    }

    fn begin_connect(&mut self, identity: Identity) -> Effect {
        let connection = ConnectionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.live = Some(connection);
        self.target = Some(identity.clone());
        self.set_state(ConnectionState::Connecting);
        tracing::info!(%connection, subject = %identity.subject, "connecting");
        Effect::Connect {
            connection,
            identity,
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "connection state changed");
            self.state = next;
        }
    }

    /// `true` if `connection` is the live attempt.
    #[must_use]
    pub fn is_current(&self, connection: ConnectionId) -> bool {
        self.live == Some(connection)
    }

    /// `true` if inbound messages from `connection` should be dispatched.
    #[must_use]
    pub fn accepts_messages(&self, connection: ConnectionId) -> bool {
        self.is_current(connection) && self.state == ConnectionState::Open
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive abnormal closures since the last successful open.
    #[must_use]
    pub const fn retry_counter(&self) -> u32 {
        self.retry_counter
    }

    /// `true` while a retry timer is armed.
    #[must_use]
    pub const fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// The live attempt, if any.
    #[must_use]
    pub const fn live(&self) -> Option<ConnectionId> {
        self.live
    }

    /// Last error text shown on the status surface.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Snapshot for the status surface.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            is_connected: self.state == ConnectionState::Open,
            error: self.last_error.clone(),
            retry_attempt: self.retry_counter,
        }
    }
}
