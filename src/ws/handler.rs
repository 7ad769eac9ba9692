//! Axum WebSocket upgrade handler.
//!
//! The credential is checked before the upgrade, so a rejected client
//! receives a plain HTTP 403 and never gets a socket.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::{SubjectId, TokenRegistry};
use crate::error::HubError;

/// Query string of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Bearer credential.
    pub token: Option<String>,
}

/// `GET /ws/sse/{user_id}/?token=…` — Upgrade to the subject's push channel.
pub async fn ws_handler(
    Path(user_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let subject = match authorize(&state.tokens, SubjectId::from(user_id), query.token.as_deref())
    {
        Ok(subject) => subject,
        Err(e) => {
            tracing::warn!(error = %e, "ws upgrade rejected");
            return e.into_response();
        }
    };
    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| run_connection(socket, subject, state))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// Accepts `token` only if it authenticates exactly `subject`.
fn authorize(
    tokens: &TokenRegistry,
    subject: SubjectId,
    token: Option<&str>,
) -> Result<SubjectId, HubError> {
    match token.and_then(|t| tokens.authenticate(t)) {
        Some(owner) if *owner == subject => Ok(subject),
        _ => Err(HubError::Forbidden(subject.to_string())),
    }
}
