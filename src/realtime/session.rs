//! Session binding.
//!
//! The authenticated identity lives in an [`IdentityProvider`] (a watch
//! channel). The manager keeps a [`SessionBinding`] that remembers the last
//! identity it saw and classifies every change, so login, logout and user
//! switches map onto open/close without the manager polling anything.

use tokio::sync::watch;

use crate::domain::Identity;

/// Source of truth for the current identity.
#[derive(Debug)]
pub struct IdentityProvider {
    sender: watch::Sender<Option<Identity>>,
}

impl IdentityProvider {
    /// Creates a provider with no identity.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Creates a provider already holding `identity`.
    #[must_use]
    pub fn logged_in(identity: Identity) -> Self {
        let (sender, _) = watch::channel(Some(identity));
        Self { sender }
    }

    /// Sets the identity.
    pub fn login(&self, identity: Identity) {
        self.sender.send_replace(Some(identity));
    }

    /// Clears the identity.
    pub fn logout(&self) {
        self.sender.send_if_modified(|current| current.take().is_some());
    }

    /// The identity right now.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.sender.borrow().clone()
    }

    /// Receiver that observes identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.sender.subscribe()
    }
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// How the identity moved between two observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// Same subject and credential.
    Unchanged,
    /// Same subject, new credential.
    Refreshed,
    /// An identity appeared.
    LoggedIn,
    /// The identity disappeared.
    LoggedOut,
    /// A different subject replaced the previous one.
    Switched,
}

/// Manager-side view of the identity source.
#[derive(Debug)]
pub struct SessionBinding {
    receiver: watch::Receiver<Option<Identity>>,
    current: Option<Identity>,
    closed: bool,
}

impl SessionBinding {
    /// Binds to `receiver`, taking its present value as the starting point.
    #[must_use]
    pub fn new(mut receiver: watch::Receiver<Option<Identity>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self {
            receiver,
            current,
            closed: false,
        }
    }

    /// The last observed identity.
    #[must_use]
    pub const fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Records `next` and classifies the move from the previous identity.
    pub fn update(&mut self, next: Option<Identity>) -> SessionChange {
        let change = match (&self.current, &next) {
            (None, None) => SessionChange::Unchanged,
            (None, Some(_)) => SessionChange::LoggedIn,
            (Some(_), None) => SessionChange::LoggedOut,
            (Some(prev), Some(new)) if !prev.same_subject(new) => SessionChange::Switched,
            (Some(prev), Some(new)) if prev == new => SessionChange::Unchanged,
            (Some(_), Some(_)) => SessionChange::Refreshed,
        };
        self.current = next;
        change
    }

    /// Waits for the next identity change and classifies it. Returns `None`
    /// once the provider has been dropped.
    pub async fn changed(&mut self) -> Option<SessionChange> {
        if self.closed {
            return None;
        }
        if self.receiver.changed().await.is_err() {
            self.closed = true;
            return None;
        }
        let next = self.receiver.borrow_and_update().clone();
        Some(self.update(next))
    }

    /// `true` once the provider is gone.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}
