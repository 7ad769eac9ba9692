//! Transport seam.
//!
//! A [`Connector`] drives one transport attempt to completion and reports
//! what happens through a [`TransportSink`]. Every report is tagged with
//! the attempt's [`ConnectionId`], which lets the manager ignore callbacks
//! from connections it has already torn down.
//!
//! [`WsConnector`] is the production implementation on top of
//! `tokio-tungstenite`.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use url::Url;

use super::machine::ConnectionId;
use crate::domain::Identity;
use crate::error::RealtimeError;

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The transport closed, with the peer's close code if one was sent.
    Closed {
        /// Close code.
        code: Option<u16>,
    },
    /// The handshake failed or the stream errored.
    Failed(String),
}

/// Reporting handle given to one transport attempt.
#[derive(Debug, Clone)]
pub struct TransportSink {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
}

impl TransportSink {
    /// Creates a sink that tags every event with `id`.
    #[must_use]
    pub const fn new(
        id: ConnectionId,
        tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    ) -> Self {
        Self { id, tx }
    }

    /// The attempt this sink reports for.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Reports `event`. Returns `false` once the manager is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send((self.id, event)).is_ok()
    }
}

/// Opens transports.
pub trait Connector: Send + Sync + fmt::Debug + 'static {
    /// Returns a future that establishes a transport to `endpoint`, reports
    /// its lifecycle through `sink`, and finishes when the transport ends.
    /// Resolving `shutdown` (or dropping its sender) asks for a normal close.
    fn drive(
        &self,
        endpoint: Url,
        sink: TransportSink,
        shutdown: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, ()>;
}

/// Builds the per-identity endpoint `{base}/ws/sse/{subject}/?token={credential}`.
///
/// `http`/`https` bases are mapped to `ws`/`wss`.
///
/// # Errors
///
/// Returns [`RealtimeError::TransportOpenFailure`] if `base` cannot carry a
/// path.
pub fn endpoint_for(base: &Url, identity: &Identity) -> Result<Url, RealtimeError> {
    let mut url = base.clone();
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme).map_err(|()| {
            RealtimeError::TransportOpenFailure(format!("cannot use {scheme} for {base}"))
        })?;
    }
    url.path_segments_mut()
        .map_err(|()| {
            RealtimeError::TransportOpenFailure(format!("endpoint {base} cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(["ws", "sse", identity.subject.as_str(), ""]);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("token", &identity.credential);
    Ok(url)
}

/// Endpoint without its query string, for logs.
fn redacted(endpoint: &Url) -> String {
    let mut shown = endpoint.clone();
    shown.set_query(None);
    shown.to_string()
}

/// WebSocket connector built on `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Creates a connector that gives up on a handshake after
    /// `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for WsConnector {
    fn drive(
        &self,
        endpoint: Url,
        sink: TransportSink,
        shutdown: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, ()> {
        Box::pin(run_socket(endpoint, sink, shutdown, self.connect_timeout))
    }
}

async fn run_socket(
    endpoint: Url,
    sink: TransportSink,
    mut shutdown: oneshot::Receiver<()>,
    connect_timeout: Duration,
) {
    let connection = sink.id();
    tracing::debug!(%connection, endpoint = %redacted(&endpoint), "opening websocket");

    let handshake = tokio::time::timeout(
        connect_timeout,
        tokio_tungstenite::connect_async(endpoint.as_str()),
    );
    let stream = tokio::select! {
        _ = &mut shutdown => {
            tracing::debug!(%connection, "closed during handshake");
            return;
        }
        result = handshake => match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                sink.send(TransportEvent::Failed(e.to_string()));
                return;
            }
            Err(_) => {
                sink.send(TransportEvent::Failed(format!(
                    "handshake timed out after {}s",
                    connect_timeout.as_secs()
                )));
                return;
            }
        },
    };

    if !sink.send(TransportEvent::Opened) {
        return;
    }
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Utf8Bytes::from_static("Normal closure"),
                };
                if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
                    tracing::debug!(%connection, error = %e, "close frame not sent");
                }
                break;
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !sink.send(TransportEvent::Message(text.to_string())) {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    sink.send(TransportEvent::Closed { code });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.send(TransportEvent::Failed(e.to_string()));
                    break;
                }
                None => {
                    sink.send(TransportEvent::Closed { code: None });
                    break;
                }
            },
        }
    }
    tracing::debug!(%connection, "websocket task finished");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn base(raw: &str) -> Url {
        let Ok(url) = Url::parse(raw) else {
            panic!("bad test url {raw}");
        };
        url
    }

    #[test]
    fn endpoint_embeds_subject_and_token() {
        let identity = Identity::new("4", "abc 123");
        let Ok(url) = endpoint_for(&base("ws://localhost:8001"), &identity) else {
            panic!("endpoint rejected");
        };
        assert_eq!(url.as_str(), "ws://localhost:8001/ws/sse/4/?token=abc+123");
    }

    #[test]
    fn endpoint_keeps_base_path_and_maps_http() {
        let identity = Identity::new("12", "t");
        let Ok(url) = endpoint_for(&base("https://feedback.example.com/realtime/"), &identity)
        else {
            panic!("endpoint rejected");
        };
        assert_eq!(
            url.as_str(),
            "wss://feedback.example.com/realtime/ws/sse/12/?token=t"
        );
    }

    #[test]
    fn redacted_endpoint_hides_credential() {
        let identity = Identity::new("4", "secret");
        let Ok(url) = endpoint_for(&base("ws://localhost:8001"), &identity) else {
            panic!("endpoint rejected");
        };
        assert!(!redacted(&url).contains("secret"));
    }

    #[test]
    fn cannot_be_a_base_is_rejected() {
        let identity = Identity::new("4", "t");
        let result = endpoint_for(&base("mailto:ops@example.com"), &identity);
        assert!(matches!(
            result,
            Err(RealtimeError::TransportOpenFailure(_))
        ));
    }

    #[tokio::test]
    async fn sink_tags_events_with_connection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut machine = crate::realtime::ConnectionMachine::new(
            crate::realtime::Backoff::new(Duration::from_secs(1), Duration::from_secs(30)),
            5,
        );
        let effects = machine.apply(crate::realtime::Input::Open(Some(Identity::new("4", "t"))));
        let Some(crate::realtime::Effect::Connect { connection, .. }) = effects.first() else {
            panic!("expected connect");
        };
        let sink = TransportSink::new(*connection, tx);
        assert!(sink.send(TransportEvent::Opened));
        assert_eq!(rx.recv().await, Some((*connection, TransportEvent::Opened)));
        drop(rx);
        assert!(!sink.send(TransportEvent::Closed { code: None }));
    }
}
