//! Command-line listener for the feedback push channel.
//!
//! Connects as `FEEDBACK_USER_ID` with `FEEDBACK_TOKEN` and logs every
//! reconciled change of the local feedback board until Ctrl-C. The
//! connection stays up unless `FEEDBACK_IDLE_GATE=1`, in which case each
//! line typed on stdin counts as activity and the channel closes after
//! `REALTIME_INACTIVITY_TIMEOUT_SECS` without input.

use std::sync::Arc;

use anyhow::Context;
use feedback_live::config::RealtimeConfig;
use feedback_live::domain::{BoardChange, FeedbackBoard, Identity, InboundEvent};
use feedback_live::realtime::{
    ActivityKind, ActivityMonitor, AlwaysOn, ConnectPolicy, ConnectionManager, IdentityProvider,
    WsConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RealtimeConfig::from_env()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("loading realtime configuration")?;
    let subject = std::env::var("FEEDBACK_USER_ID").context("FEEDBACK_USER_ID is not set")?;
    let token = std::env::var("FEEDBACK_TOKEN").context("FEEDBACK_TOKEN is not set")?;

    let idle_gate = std::env::var("FEEDBACK_IDLE_GATE").is_ok_and(|v| v == "1");
    let policy: Box<dyn ConnectPolicy> = if idle_gate {
        tracing::info!(
            timeout_secs = config.inactivity_timeout.as_secs(),
            "idle gate on: press Enter to stay connected"
        );
        Box::new(ActivityMonitor::from_config(&config))
    } else {
        Box::new(AlwaysOn)
    };

    let provider = IdentityProvider::logged_in(Identity::new(subject, token));
    let mut board = FeedbackBoard::new();
    let manager = ConnectionManager::spawn(
        &config,
        provider.subscribe(),
        Arc::new(WsConnector::new(config.connect_timeout)),
        policy,
        move |event: InboundEvent| match board.apply(&event) {
            BoardChange::Unchanged => {
                tracing::info!(kind = %event.kind, payload = %event.payload, "event");
            }
            change => tracing::info!(
                kind = %event.kind,
                ?change,
                records = board.len(),
                pending = board.pending_acknowledgements(),
                "feedback board updated"
            ),
        },
    );

    let mut status = manager.subscribe_status();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = idle_gate;
    loop {
        tokio::select! {
            line = input.next_line(), if stdin_open => match line {
                Ok(Some(_)) => manager.record_activity(ActivityKind::KeyDown),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin unreadable; activity input disabled");
                    stdin_open = false;
                }
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                tracing::info!(
                    label = current.label(),
                    state = ?current.state,
                    retry = current.retry_attempt,
                    error = current.error.as_deref().unwrap_or(""),
                    "connection status"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                break;
            }
        }
    }

    provider.logout();
    manager.shutdown().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
