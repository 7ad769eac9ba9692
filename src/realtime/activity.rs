//! Connect policies layered on top of the state machine.
//!
//! A [`ConnectPolicy`] decides when the manager should open or close the
//! connection on its own. [`ActivityMonitor`] ties the channel to recent
//! user interaction: idle users are disconnected and resumed interaction
//! reconnects. [`AlwaysOn`] connects as soon as an identity is present and
//! never disconnects for idleness.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use super::machine::ConnectionState;
use crate::config::RealtimeConfig;

/// User interaction signals observed by the activity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// Pointer moved.
    PointerMove,
    /// Key pressed.
    KeyDown,
    /// Click.
    Click,
    /// Scroll.
    Scroll,
    /// Touch started.
    TouchStart,
}

impl ActivityKind {
    /// Every observed signal type.
    pub const ALL: [Self; 5] = [
        Self::PointerMove,
        Self::KeyDown,
        Self::Click,
        Self::Scroll,
        Self::TouchStart,
    ];

    /// DOM event name of the signal.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PointerMove => "mousemove",
            Self::KeyDown => "keydown",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
        }
    }

    /// Recognizes a DOM event name.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// What a policy asks the manager to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Nothing.
    None,
    /// Call `open()` with the current identity.
    Open,
    /// Call `close()`.
    Close,
}

/// Pluggable connect/disconnect policy.
///
/// All methods run on the manager's event loop between transitions, so an
/// implementation never observes a half-applied state.
pub trait ConnectPolicy: Send + fmt::Debug + 'static {
    /// An interaction signal arrived.
    fn on_activity(
        &mut self,
        kind: ActivityKind,
        now: Instant,
        state: ConnectionState,
        has_identity: bool,
    ) -> PolicyAction;

    /// The deadline returned by [`ConnectPolicy::deadline`] passed.
    fn on_deadline(&mut self, now: Instant, state: ConnectionState) -> PolicyAction;

    /// The identity became present or absent.
    fn on_identity(&mut self, present: bool) -> PolicyAction;

    /// Next instant the manager should call [`ConnectPolicy::on_deadline`].
    fn deadline(&self) -> Option<Instant>;

    /// Whether a pending reconnect should still go ahead at `now`.
    fn allows_retry(&self, now: Instant) -> bool;

    /// Drops all timers; called on teardown.
    fn reset(&mut self);
}

/// Idle-gated policy: activity opens, inactivity closes.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl ActivityMonitor {
    /// Creates a monitor with the given inactivity timeout. No deadline is
    /// armed until the first signal.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Creates a monitor using the configured inactivity timeout.
    #[must_use]
    pub const fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.inactivity_timeout)
    }

    /// The configured inactivity timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ConnectPolicy for ActivityMonitor {
    fn on_activity(
        &mut self,
        kind: ActivityKind,
        now: Instant,
        state: ConnectionState,
        has_identity: bool,
    ) -> PolicyAction {
        self.deadline = Some(now + self.timeout);
        if has_identity && !state.is_live() {
            tracing::debug!(signal = kind.as_str(), "activity while offline: reconnecting");
            PolicyAction::Open
        } else {
            PolicyAction::None
        }
    }

    fn on_deadline(&mut self, now: Instant, state: ConnectionState) -> PolicyAction {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                if state.is_live() {
                    tracing::info!(
                        idle_secs = self.timeout.as_secs(),
                        "inactivity timeout: disconnecting"
                    );
                    PolicyAction::Close
                } else {
                    PolicyAction::None
                }
            }
            _ => PolicyAction::None,
        }
    }

    fn on_identity(&mut self, present: bool) -> PolicyAction {
        if !present {
            self.deadline = None;
        }
        PolicyAction::None
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn allows_retry(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now < deadline)
    }

    fn reset(&mut self) {
        self.deadline = None;
    }
}

/// Always-connected policy: opens whenever an identity appears.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOn;

impl ConnectPolicy for AlwaysOn {
    fn on_activity(
        &mut self,
        _kind: ActivityKind,
        _now: Instant,
        _state: ConnectionState,
        _has_identity: bool,
    ) -> PolicyAction {
        PolicyAction::None
    }

    fn on_deadline(&mut self, _now: Instant, _state: ConnectionState) -> PolicyAction {
        PolicyAction::None
    }

    fn on_identity(&mut self, present: bool) -> PolicyAction {
        if present {
            PolicyAction::Open
        } else {
            PolicyAction::None
        }
    }

    fn deadline(&self) -> Option<Instant> {
        None
    }

    fn allows_retry(&self, _now: Instant) -> bool {
        true
    }

    fn reset(&mut self) {}
}
