//! End-to-end: a real push hub on an ephemeral port, the client connection
//! manager over `tokio-tungstenite`, and events published through REST.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use feedback_live::api::build_app;
use feedback_live::app_state::AppState;
use feedback_live::config::{HubConfig, RealtimeConfig};
use feedback_live::domain::{
    EventKind, FeedbackBoard, FeedbackEvent, Identity, InboundEvent, SubjectId,
};
use feedback_live::realtime::{
    AlwaysOn, CloseReason, ConnectionManager, ConnectionState, ConnectionStatus,
    IdentityProvider, WsConnector,
};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use url::Url;

const WAIT: Duration = Duration::from_secs(10);

async fn start_hub() -> SocketAddr {
    let Ok(listen_addr) = "127.0.0.1:0".parse() else {
        panic!("bad addr");
    };
    let config = HubConfig {
        listen_addr,
        heartbeat_interval: Duration::from_secs(30),
        push_bus_capacity: 256,
        tokens: vec![
            (SubjectId::from("4"), "tok-4".to_string()),
            (SubjectId::from("2"), "tok-2".to_string()),
        ],
    };
    let Ok(listener) = tokio::net::TcpListener::bind(config.listen_addr).await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = build_app(AppState::from_config(&config));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            panic!("hub stopped: {e}");
        }
    });
    addr
}

fn client_config(addr: SocketAddr) -> RealtimeConfig {
    let Ok(endpoint) = Url::parse(&format!("ws://{addr}")) else {
        panic!("bad endpoint");
    };
    RealtimeConfig {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        max_attempts: 2,
        ..RealtimeConfig::new(endpoint)
    }
}

fn spawn_client(
    addr: SocketAddr,
    identity: Identity,
) -> (
    ConnectionManager,
    IdentityProvider,
    mpsc::UnboundedReceiver<InboundEvent>,
) {
    let config = client_config(addr);
    let provider = IdentityProvider::logged_in(identity);
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::spawn(
        &config,
        provider.subscribe(),
        Arc::new(WsConnector::new(config.connect_timeout)),
        Box::new(AlwaysOn),
        tx,
    );
    (manager, provider, rx)
}

async fn wait_status(
    status: &mut watch::Receiver<ConnectionStatus>,
    what: &str,
    pred: impl FnMut(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    let Ok(Ok(current)) = tokio::time::timeout(WAIT, status.wait_for(pred)).await else {
        panic!("timed out waiting for {what}");
    };
    current.clone()
}

async fn wait_until_present(http: &reqwest::Client, addr: SocketAddr, subject: &str) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = http
            .get(format!("http://{addr}/api/v1/connections"))
            .send()
            .await
            && let Ok(body) = response.json::<Value>().await
            && body
                .get("connected_users")
                .and_then(Value::as_array)
                .is_some_and(|users| users.contains(&json!(subject)))
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("subject {subject} never appeared in presence");
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<InboundEvent>) -> InboundEvent {
    let Ok(Some(event)) = tokio::time::timeout(WAIT, rx.recv()).await else {
        panic!("no event delivered");
    };
    event
}

async fn post(http: &reqwest::Client, addr: SocketAddr, path: &str, body: &Value) -> Value {
    let Ok(response) = http
        .post(format!("http://{addr}{path}"))
        .json(body)
        .send()
        .await
    else {
        panic!("POST {path} failed");
    };
    assert!(response.status().is_success(), "POST {path}: {}", response.status());
    let Ok(value) = response.json::<Value>().await else {
        panic!("POST {path} returned no JSON");
    };
    value
}

fn feedback(id: u64, acknowledged: bool) -> Value {
    json!({
        "id": id,
        "employee": {"id": 4, "username": "ana", "is_manager": false},
        "manager": {"id": 2, "username": "bo", "is_manager": true},
        "strengths": "clear writing",
        "areas_to_improve": "estimates",
        "sentiment": "positive",
        "acknowledged": acknowledged
    })
}

#[tokio::test]
async fn feedback_lifecycle_reaches_the_employee_board() {
    let addr = start_hub().await;
    let http = reqwest::Client::new();
    let (manager, _provider, mut events) = spawn_client(addr, Identity::new("4", "tok-4"));

    let mut status = manager.subscribe_status();
    let live = wait_status(&mut status, "connection", |s| s.is_connected).await;
    assert_eq!(live.label(), "Live");
    wait_until_present(&http, addr, "4").await;

    let mut board = FeedbackBoard::new();

    let delivered = post(
        &http,
        addr,
        "/api/v1/feedback/events",
        &json!({"action": "created", "feedback": feedback(7, false)}),
    )
    .await;
    assert!(delivered.get("delivered").and_then(Value::as_u64).is_some_and(|n| n > 0));
    let created = next_event(&mut events).await;
    assert_eq!(created.kind, EventKind::NewFeedback);
    board.apply(&created);
    assert_eq!(board.pending_acknowledgements(), 1);

    post(
        &http,
        addr,
        "/api/v1/feedback/events",
        &json!({"action": "acknowledged", "feedback": feedback(7, true)}),
    )
    .await;
    let acknowledged = next_event(&mut events).await;
    assert_eq!(acknowledged.kind, EventKind::FeedbackAcknowledged);
    board.apply(&acknowledged);
    assert_eq!(board.pending_acknowledgements(), 0);

    post(
        &http,
        addr,
        "/api/v1/feedback/events",
        &json!({"action": "deleted", "feedback": feedback(7, true)}),
    )
    .await;
    let deleted = next_event(&mut events).await;
    assert_eq!(
        FeedbackEvent::from_inbound(&deleted),
        Some(FeedbackEvent::Deleted(7))
    );
    board.apply(&deleted);
    assert!(board.is_empty());

    manager.shutdown().await;
}

#[tokio::test]
async fn raw_push_is_routed_only_to_its_recipient() {
    let addr = start_hub().await;
    let http = reqwest::Client::new();
    let (employee, _p1, mut employee_events) = spawn_client(addr, Identity::new("4", "tok-4"));
    let (manager_client, _p2, mut manager_events) =
        spawn_client(addr, Identity::new("2", "tok-2"));
    wait_until_present(&http, addr, "4").await;
    wait_until_present(&http, addr, "2").await;

    post(
        &http,
        addr,
        "/api/v1/push",
        &json!({"user_ids": ["2"], "event_type": "team_digest", "data": {"count": 3}}),
    )
    .await;
    let digest = next_event(&mut manager_events).await;
    assert_eq!(digest.kind, EventKind::Other("team_digest".to_string()));
    assert_eq!(digest.payload, json!({"count": 3}));
    assert!(employee_events.try_recv().is_err());

    employee.shutdown().await;
    manager_client.shutdown().await;
}

#[tokio::test]
async fn logout_closes_the_channel_normally() {
    let addr = start_hub().await;
    let (manager, provider, _events) = spawn_client(addr, Identity::new("4", "tok-4"));
    let mut status = manager.subscribe_status();
    wait_status(&mut status, "connection", |s| s.is_connected).await;

    provider.logout();
    let closed = wait_status(&mut status, "normal close", |s| {
        s.state == ConnectionState::Closed(CloseReason::Normal)
    })
    .await;
    assert!(!closed.is_connected);
    assert!(closed.error.is_none());
    manager.shutdown().await;
}

#[tokio::test]
async fn rejected_credential_exhausts_retries() {
    let addr = start_hub().await;
    let (manager, _provider, _events) = spawn_client(addr, Identity::new("4", "wrong"));
    let mut status = manager.subscribe_status();

    let exhausted = wait_status(&mut status, "retry exhaustion", |s| {
        s.error.as_deref() == Some("max attempts exceeded")
    })
    .await;
    assert_eq!(
        exhausted.state,
        ConnectionState::Closed(CloseReason::Abnormal)
    );
    assert_eq!(exhausted.label(), "Offline");
    manager.shutdown().await;
}
