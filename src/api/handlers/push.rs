//! Push handlers: raw pushes, feedback notifications, presence.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ConnectionsResponse, FeedbackEventRequest, PushRequest, PushResponse};
use crate::app_state::AppState;
use crate::error::HubError;

/// `POST /push` — Push one event to a list of users.
///
/// # Errors
///
/// Returns [`HubError::InvalidRequest`] on an empty recipient list or a
/// blank event type.
pub async fn push_event(
    State(state): State<AppState>,
    Json(req): Json<PushRequest>,
) -> Result<impl IntoResponse, HubError> {
    let delivered = state
        .notifications
        .push(&req.user_ids, &req.event_type, &req.data)?;
    Ok(Json(PushResponse { delivered }))
}

/// `POST /feedback/events` — Notify both parties of a feedback change.
///
/// # Errors
///
/// Returns [`HubError`] if the record has no parties or cannot be
/// serialized.
pub async fn feedback_event(
    State(state): State<AppState>,
    Json(req): Json<FeedbackEventRequest>,
) -> Result<impl IntoResponse, HubError> {
    let delivered = state.notifications.notify(req.action, &req.feedback)?;
    Ok(Json(PushResponse { delivered }))
}

/// `GET /connections` — Subjects currently connected to the hub.
pub async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    let connected_users = state.presence.connected_users().await;
    Json(ConnectionsResponse {
        count: connected_users.len(),
        connected_users,
    })
}

/// Push routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/push", post(push_event))
        .route("/feedback/events", post(feedback_event))
        .route("/connections", get(list_connections))
}
