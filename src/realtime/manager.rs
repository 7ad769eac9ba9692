//! Connection manager runtime.
//!
//! [`ConnectionManager::spawn`] starts one task that owns the
//! [`ConnectionMachine`] and serializes every input into it: handle
//! commands, identity changes, transport callbacks, the retry timer and the
//! policy deadline. Effects returned by the machine are executed right
//! after each transition, and the status surface is republished.
//!
//! ```text
//! handle ──commands──┐
//! identity ──watch───┤
//! transport ─events──┼──► Driver ──apply──► ConnectionMachine
//! retry timer ───────┤        │
//! policy deadline ───┘        ├──► Connector::drive (spawned per attempt)
//!                             ├──► Dispatcher ──► EventHandler
//!                             └──► StatusBoard ──watch──► renderers
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use super::activity::{ActivityKind, ConnectPolicy, PolicyAction};
use super::dispatcher::{Dispatcher, EventHandler};
use super::machine::{ConnectionId, ConnectionMachine, Effect, Input};
use super::session::{SessionBinding, SessionChange};
use super::status::{ConnectionStatus, StatusBoard};
use super::transport::{Connector, TransportEvent, TransportSink, endpoint_for};
use crate::config::RealtimeConfig;
use crate::domain::Identity;

/// How long teardown waits for a transport to finish its close handshake.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Command {
    Open,
    Close,
    Activity(ActivityKind),
    Shutdown,
}

/// Handle to a running connection manager.
///
/// Dropping the handle shuts the manager down: the transport is closed and
/// every timer is cancelled.
#[derive(Debug)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawns the manager task on the current tokio runtime.
    ///
    /// `identity` is the receiver of an
    /// [`IdentityProvider`](super::session::IdentityProvider); `policy`
    /// decides when connections open and close on their own.
    #[must_use]
    pub fn spawn(
        config: &RealtimeConfig,
        identity: watch::Receiver<Option<Identity>>,
        connector: Arc<dyn Connector>,
        policy: Box<dyn ConnectPolicy>,
        handler: impl EventHandler,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let board = StatusBoard::new();
        let status = board.subscribe();

        let driver = Driver {
            machine: ConnectionMachine::from_config(config),
            session: SessionBinding::new(identity),
            connector,
            policy,
            dispatcher: Dispatcher::new(handler),
            board,
            endpoint: config.endpoint.clone(),
            commands: commands_rx,
            events_tx,
            events_rx,
            live: None,
            retry_at: None,
        };
        let task = tokio::spawn(driver.run());

        Self {
            commands: commands_tx,
            status,
            task,
        }
    }

    /// Requests a connection with the current identity. No-op while a
    /// connection exists or no identity is present.
    pub fn open(&self) {
        self.send(Command::Open);
    }

    /// Closes the connection deliberately and cancels any pending retry.
    pub fn close(&self) {
        self.send(Command::Close);
    }

    /// Feeds one user-interaction signal to the connect policy.
    pub fn record_activity(&self, kind: ActivityKind) {
        self.send(Command::Activity(kind));
    }

    /// Latest status snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Closes everything and waits for the manager task to finish.
    pub async fn shutdown(self) {
        self.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "connection manager task ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("connection manager already stopped");
        }
    }
}

#[derive(Debug)]
struct LiveConnection {
    id: ConnectionId,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Debug)]
struct Driver {
    machine: ConnectionMachine,
    session: SessionBinding,
    connector: Arc<dyn Connector>,
    policy: Box<dyn ConnectPolicy>,
    dispatcher: Dispatcher,
    board: StatusBoard,
    endpoint: Url,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    events_rx: mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
    live: Option<LiveConnection>,
    retry_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self) {
        tracing::info!(endpoint = %self.endpoint, "connection manager started");
        self.publish();
        if self.session.current().is_some() {
            let action = self.policy.on_identity(true);
            self.perform(action);
        }

        loop {
            let retry_at = self.retry_at;
            let policy_at = self.policy.deadline();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some((connection, event)) = self.events_rx.recv() => {
                    self.on_transport(connection, event);
                }
                change = self.session.changed(), if !self.session.is_closed() => {
                    self.on_session(change);
                }
                () = sleep_until_opt(retry_at) => {
                    self.retry_at = None;
                    let allowed = self.policy.allows_retry(Instant::now());
                    let identity = self.session.current().cloned();
                    self.step(Input::RetryElapsed { allowed, identity });
                }
                () = sleep_until_opt(policy_at) => {
                    let action = self.policy.on_deadline(Instant::now(), self.machine.state());
                    self.perform(action);
                }
            }
        }

        self.teardown().await;
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Open => self.step(Input::Open(self.session.current().cloned())),
            Command::Close => self.step(Input::Close),
            Command::Activity(kind) => {
                let action = self.policy.on_activity(
                    kind,
                    Instant::now(),
                    self.machine.state(),
                    self.session.current().is_some(),
                );
                self.perform(action);
            }
            Command::Shutdown => {}
        }
    }

    fn on_session(&mut self, change: Option<SessionChange>) {
        match change {
            None => {
                tracing::debug!("identity source dropped: closing");
                self.policy.on_identity(false);
                self.step(Input::Close);
            }
            Some(SessionChange::LoggedIn) => {
                tracing::info!("identity available");
                let action = self.policy.on_identity(true);
                self.perform(action);
            }
            Some(SessionChange::LoggedOut) => {
                tracing::info!("identity cleared: closing");
                self.policy.on_identity(false);
                self.step(Input::Close);
            }
            Some(SessionChange::Switched) => {
                tracing::info!("identity switched: closing previous connection");
                self.step(Input::Close);
                let action = self.policy.on_identity(true);
                self.perform(action);
            }
            Some(SessionChange::Refreshed | SessionChange::Unchanged) => {}
        }
    }

    fn on_transport(&mut self, connection: ConnectionId, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.step(Input::TransportOpened(connection)),
            TransportEvent::Message(text) => {
                if self.machine.accepts_messages(connection) {
                    self.dispatcher.dispatch(&text);
                } else {
                    tracing::trace!(%connection, "message from inactive connection ignored");
                }
            }
            TransportEvent::Closed { code } => {
                self.release(connection);
                self.step(Input::TransportClosed { connection, code });
            }
            TransportEvent::Failed(reason) => {
                self.release(connection);
                self.step(Input::TransportFailed { connection, reason });
            }
        }
    }

    fn perform(&mut self, action: PolicyAction) {
        match action {
            PolicyAction::None => {}
            PolicyAction::Open => self.step(Input::Resume(self.session.current().cloned())),
            PolicyAction::Close => self.step(Input::Close),
        }
    }

    fn step(&mut self, input: Input) {
        for effect in self.machine.apply(input) {
            self.execute(effect);
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Connect {
                connection,
                identity,
            } => self.connect(connection, &identity),
            Effect::Disconnect { connection } => {
                if let Some(live) = self.live.take_if(|live| live.id == connection)
                    && live.stop.send(()).is_err()
                {
                    tracing::debug!(%connection, "transport already finished");
                }
            }
            Effect::ScheduleRetry { delay, .. } => {
                self.retry_at = Some(Instant::now() + delay);
            }
            Effect::CancelRetry => self.retry_at = None,
        }
    }

    fn connect(&mut self, connection: ConnectionId, identity: &Identity) {
        let sink = TransportSink::new(connection, self.events_tx.clone());
        let endpoint = match endpoint_for(&self.endpoint, identity) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                sink.send(TransportEvent::Failed(e.to_string()));
                return;
            }
        };
        let (stop, shutdown) = oneshot::channel();
        let task = tokio::spawn(self.connector.drive(endpoint, sink, shutdown));
        if let Some(previous) = self.live.replace(LiveConnection {
            id: connection,
            stop,
            task,
        }) {
            tracing::debug!(connection = %previous.id, "dropping superseded transport handle");
        }
    }

    fn release(&mut self, connection: ConnectionId) {
        if self.live.as_ref().is_some_and(|live| live.id == connection) {
            self.live = None;
        }
    }

    fn publish(&self) {
        self.board.publish(self.machine.status());
    }

    async fn teardown(&mut self) {
        let live = self.live.take();
        self.step(Input::Close);
        self.policy.reset();
        self.retry_at = None;
        if let Some(live) = live {
            if live.stop.send(()).is_err() {
                tracing::debug!(connection = %live.id, "transport already finished");
            }
            if tokio::time::timeout(TEARDOWN_GRACE, live.task).await.is_err() {
                tracing::warn!(connection = %live.id, "transport did not close in time");
            }
        }
        tracing::info!("connection manager stopped");
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
