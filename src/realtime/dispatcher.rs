//! Inbound message decoding and delivery.
//!
//! Raw text frames are parsed as JSON and classified. Control-plane kinds
//! are swallowed, domain events go to the single registered
//! [`EventHandler`], synchronously and in arrival order. A malformed frame
//! is logged and dropped; it never stops later frames.

use std::fmt;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::domain::{ControlKind, InboundEvent};
use crate::error::RealtimeError;

/// Receiver of decoded domain events.
pub trait EventHandler: Send + 'static {
    /// Called exactly once per domain event, in arrival order.
    fn handle(&mut self, event: InboundEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(InboundEvent) + Send + 'static,
{
    fn handle(&mut self, event: InboundEvent) {
        self(event);
    }
}

/// Forwards events into an unbounded channel, e.g. to a UI task.
impl EventHandler for mpsc::UnboundedSender<InboundEvent> {
    fn handle(&mut self, event: InboundEvent) {
        if self.send(event).is_err() {
            tracing::debug!("event receiver dropped; event discarded");
        }
    }
}

/// Classification of one decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Channel management message; not forwarded.
    Control(ControlKind),
    /// Domain event to forward.
    Event(InboundEvent),
}

/// Decodes one raw frame.
///
/// The kind comes from `kind`, else `type`, else `event`. The payload is
/// the `data` field, else `payload`, else the whole message.
///
/// # Errors
///
/// Returns [`RealtimeError::MalformedMessage`] if the frame is not a JSON
/// object or carries no string kind.
pub fn decode(raw: &str) -> Result<Decoded, RealtimeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| RealtimeError::MalformedMessage(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(RealtimeError::MalformedMessage(
            "expected a JSON object".to_string(),
        ));
    };

    let kind = ["kind", "type", "event"]
        .into_iter()
        .find_map(|key| fields.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| RealtimeError::MalformedMessage("missing event kind".to_string()))?;

    if let Some(control) = ControlKind::from_wire(&kind) {
        return Ok(Decoded::Control(control));
    }

    let payload = take_present(&mut fields, "data")
        .or_else(|| take_present(&mut fields, "payload"))
        .unwrap_or(Value::Object(fields));

    Ok(Decoded::Event(InboundEvent::new(kind, payload)))
}

fn take_present(fields: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match fields.get(key) {
        Some(Value::Null) | None => None,
        Some(_) => fields.remove(key),
    }
}

/// Result of dispatching one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Forwarded to the handler.
    Delivered,
    /// Control message, swallowed.
    Suppressed,
    /// Malformed, dropped.
    Dropped,
}

/// Decodes frames and feeds domain events to the handler.
pub struct Dispatcher {
    handler: Box<dyn EventHandler>,
    delivered: u64,
    dropped: u64,
}

impl Dispatcher {
    /// Creates a dispatcher for `handler`.
    #[must_use]
    pub fn new(handler: impl EventHandler) -> Self {
        Self {
            handler: Box::new(handler),
            delivered: 0,
            dropped: 0,
        }
    }

    /// Decodes and dispatches one raw frame.
    pub fn dispatch(&mut self, raw: &str) -> DispatchOutcome {
        match decode(raw) {
            Ok(Decoded::Event(event)) => {
                tracing::debug!(kind = %event.kind, "dispatching event");
                self.delivered = self.delivered.saturating_add(1);
                self.handler.handle(event);
                DispatchOutcome::Delivered
            }
            Ok(Decoded::Control(control)) => {
                tracing::trace!(kind = control.as_str(), "control message");
                DispatchOutcome::Suppressed
            }
            Err(error) => {
                tracing::warn!(%error, "dropping inbound message");
                self.dropped = self.dropped.saturating_add(1);
                DispatchOutcome::Dropped
            }
        }
    }

    /// Number of events handed to the handler.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Number of malformed frames dropped.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("delivered", &self.delivered)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::domain::EventKind;

    fn recording() -> (Dispatcher, Arc<Mutex<Vec<InboundEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::new(move |event: InboundEvent| {
            if let Ok(mut guard) = sink.lock() {
                guard.push(event);
            }
        });
        (dispatcher, seen)
    }

    fn seen(events: &Arc<Mutex<Vec<InboundEvent>>>) -> Vec<InboundEvent> {
        events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    #[test]
    fn type_and_data_become_kind_and_payload() {
        let (mut dispatcher, events) = recording();
        let outcome = dispatcher.dispatch(r#"{"type":"feedback_deleted","data":{"id":7}}"#);
        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(
            seen(&events),
            vec![InboundEvent::new("feedback_deleted", json!({"id": 7}))]
        );
    }

    #[test]
    fn control_kinds_never_reach_handler() {
        let (mut dispatcher, events) = recording();
        assert_eq!(
            dispatcher.dispatch(r#"{"type":"heartbeat","timestamp":12.5}"#),
            DispatchOutcome::Suppressed
        );
        assert_eq!(
            dispatcher.dispatch(r#"{"type":"connected","message":"hi","user_id":"4"}"#),
            DispatchOutcome::Suppressed
        );
        assert!(seen(&events).is_empty());
    }

    #[test]
    fn event_data_shape_is_synthesized() {
        let Ok(Decoded::Event(event)) = decode(r#"{"event":"new_feedback","data":{"id":1}}"#)
        else {
            panic!("expected event");
        };
        assert_eq!(event.kind, EventKind::NewFeedback);
        assert_eq!(event.payload, json!({"id": 1}));
    }

    #[test]
    fn missing_data_falls_back_to_whole_message() {
        let Ok(Decoded::Event(event)) = decode(r#"{"type":"pong","timestamp":3}"#) else {
            panic!("expected event");
        };
        assert_eq!(event.kind, EventKind::Other("pong".to_string()));
        assert_eq!(event.payload, json!({"type": "pong", "timestamp": 3}));

        let Ok(Decoded::Event(event)) = decode(r#"{"event":"x","data":null}"#) else {
            panic!("expected event");
        };
        assert_eq!(event.payload, json!({"event": "x", "data": null}));
    }

    #[test]
    fn explicit_kind_field_wins() {
        let Ok(Decoded::Event(event)) =
            decode(r#"{"kind":"feedback_updated","type":"ignored","payload":{"id":2}}"#)
        else {
            panic!("expected event");
        };
        assert_eq!(event.kind, EventKind::FeedbackUpdated);
        assert_eq!(event.payload, json!({"id": 2}));
    }

    #[test]
    fn malformed_frames_are_dropped_and_dispatch_continues() {
        let (mut dispatcher, events) = recording();
        assert_eq!(dispatcher.dispatch("{not json"), DispatchOutcome::Dropped);
        assert_eq!(dispatcher.dispatch("[1,2,3]"), DispatchOutcome::Dropped);
        assert_eq!(dispatcher.dispatch(r#"{"data":{}}"#), DispatchOutcome::Dropped);
        assert_eq!(
            dispatcher.dispatch(r#"{"type":"feedback_created","data":{"id":3}}"#),
            DispatchOutcome::Delivered
        );
        assert_eq!(dispatcher.dropped(), 3);
        assert_eq!(dispatcher.delivered(), 1);
        assert_eq!(seen(&events).len(), 1);
    }

    #[test]
    fn events_arrive_in_order_exactly_once() {
        let (mut dispatcher, events) = recording();
        let frames = [
            r#"{"type":"new_feedback","data":{"id":1}}"#,
            r#"{"type":"heartbeat"}"#,
            r#"{"type":"feedback_updated","data":{"id":1}}"#,
            r#"{"type":"feedback_acknowledged","data":{"id":1}}"#,
            r#"{"type":"feedback_deleted","data":{"id":1}}"#,
        ];
        for frame in frames {
            dispatcher.dispatch(frame);
        }
        let kinds: Vec<String> = seen(&events)
            .into_iter()
            .map(|e| e.kind.as_str().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "new_feedback",
                "feedback_updated",
                "feedback_acknowledged",
                "feedback_deleted"
            ]
        );
    }

    #[tokio::test]
    async fn channel_handler_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(tx);
        dispatcher.dispatch(r#"{"type":"feedback_created","data":{"id":9}}"#);
        let Some(event) = rx.recv().await else {
            panic!("event not forwarded");
        };
        assert_eq!(event.kind, EventKind::FeedbackCreated);
    }
}
