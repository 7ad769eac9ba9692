//! Per-connection push loop.
//!
//! Greets the client, forwards the envelopes addressed to its subject,
//! emits heartbeats and answers pings until either side goes away.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use super::messages::{ClientFrame, ControlFrame, EventFrame};
use crate::app_state::AppState;
use crate::domain::{PushEnvelope, SubjectId};

type WsSender = SplitSink<WebSocket, Message>;

/// Runs the read/write loop for one authenticated connection.
///
/// The subject is counted in the presence registry for as long as the
/// loop runs.
pub async fn run_connection(socket: WebSocket, subject: SubjectId, state: AppState) {
    let conn_id = uuid::Uuid::new_v4();
    let mut events = state.push_bus.subscribe();
    state.presence.connect(&subject).await;
    tracing::info!(%subject, %conn_id, "ws connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let period = state.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if send_json(&mut ws_tx, &ControlFrame::connected(&subject)).await {
        loop {
            tokio::select! {
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_frame(&text, &subject)
                            && !send_json(&mut ws_tx, &reply).await
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%subject, %conn_id, error = %e, "ws read failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                _ = heartbeat.tick() => {
                    if !send_json(&mut ws_tx, &ControlFrame::heartbeat()).await {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(envelope) => {
                        if let Some(frame) = frame_for(&subject, envelope)
                            && !send_json(&mut ws_tx, &frame).await
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%subject, %conn_id, lagged = n, "ws client lagged behind push bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    state.presence.disconnect(&subject).await;
    tracing::info!(%subject, %conn_id, "ws connection closed");
}

/// Converts an envelope into a frame if it is addressed to `subject`.
fn frame_for(subject: &SubjectId, envelope: PushEnvelope) -> Option<EventFrame> {
    (envelope.subject == *subject).then(|| EventFrame {
        kind: envelope.kind,
        data: envelope.data,
    })
}

/// Handles one client text frame, returning the reply if any.
fn handle_client_frame(text: &str, subject: &SubjectId) -> Option<ControlFrame> {
    let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
        tracing::debug!(%subject, "ignoring malformed client frame");
        return None;
    };
    let kind = frame.kind.as_deref().unwrap_or("unknown");
    tracing::trace!(%subject, kind, "client frame");
    (kind == "ping").then(ControlFrame::pong)
}

async fn send_json(ws_tx: &mut WsSender, frame: &impl Serialize) -> bool {
    let Ok(json) = serde_json::to_string(frame) else {
        return true;
    };
    ws_tx.send(Message::text(json)).await.is_ok()
}
