// REST + SSE client against an in-process axum backend

mod common;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::eventually;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use sirberus::actions::{ActionKind, run_bulk};
use sirberus::api::{ApiClient, ApiError};
use sirberus::config::ApiConfig;
use sirberus::logs::{ExecSession, LogTailer};
use sirberus::models::{EntityId, LogRecord};
use sirberus::poller::{ApiSource, PollerConfig, Subscription};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Backend {
    actions: Mutex<Vec<String>>,
    log_lines: Mutex<Vec<u32>>,
    exec_commands: Mutex<Vec<String>>,
}

#[derive(Deserialize)]
struct LinesQuery {
    lines: u32,
}

#[derive(Deserialize)]
struct ExecBody {
    command: String,
}

type Shared = State<Arc<Backend>>;

async fn list_services() -> Json<serde_json::Value> {
    Json(json!({
        "services": [
            {"name": "nginx.service", "description": "Web server", "loadState": "loaded",
             "activeState": "active", "subState": "running", "cpuUsage": 1.0, "memoryUsage": 4096},
            {"name": "cron.service", "description": "Cron", "loadState": "loaded",
             "activeState": "failed", "subState": "failed"}
        ],
        "count": 2
    }))
}

async fn get_service(Path(name): Path<String>) -> impl IntoResponse {
    if name == "missing.service" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "unit not found").into_response();
    }
    Json(json!({
        "service": {"name": name, "activeState": "active", "subState": "running",
                    "cpuUsage": 2.5, "memoryUsage": 8192},
        "mainPID": 99
    }))
    .into_response()
}

async fn list_containers() -> Json<serde_json::Value> {
    Json(json!({
        "containers": [
            {"id": "abc123", "name": "web", "image": "nginx",
             "status": {"running": true, "state": "running"}}
        ],
        "count": 1
    }))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

async fn service_action(
    State(backend): Shared,
    Path((name, action)): Path<(String, String)>,
) -> StatusCode {
    backend
        .actions
        .lock()
        .unwrap()
        .push(format!("services/{}/{}", name, action));
    if name == "bad.service" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn service_logs(
    State(backend): Shared,
    Query(q): Query<LinesQuery>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    backend.log_lines.lock().unwrap().push(q.lines);
    let events = vec![
        Ok(Event::default()
            .event("log")
            .data("2024-01-01T00:00:00Z: unit started")),
        Ok(Event::default().event("log").data("2024-01-01T00:00:01Z: ready")),
    ];
    Sse::new(stream::iter(events))
}

async fn container_logs() -> &'static str {
    "plain text, not an event stream"
}

async fn start_exec(State(backend): Shared, Json(body): Json<ExecBody>) -> StatusCode {
    backend.exec_commands.lock().unwrap().push(body.command);
    StatusCode::OK
}

async fn exec_output() -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let events = vec![
        Ok(Event::default().event("output").data("hello")),
        Ok(Event::default().event("done").data("exit 0")),
    ];
    Sse::new(stream::iter(events))
}

async fn spawn_backend() -> (ApiClient, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/services", get(list_services))
        .route("/api/services/{name}", get(get_service))
        .route("/api/services/{name}/logs", get(service_logs))
        .route("/api/services/{name}/{action}", post(service_action))
        .route("/api/containers", get(list_containers))
        .route("/api/containers/{id}/logs", get(container_logs))
        .route("/api/containers/{id}/exec", post(start_exec))
        .route("/api/containers/{id}/exec/output", get(exec_output))
        .route("/api/slow/services", get(slow))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let config = ApiConfig::new(format!("http://{}/api", addr));
    (ApiClient::new(&config).unwrap(), backend)
}

#[tokio::test]
async fn test_list_and_detail_decode() {
    let (client, _) = spawn_backend().await;
    let services = client.list_services().await.unwrap();
    assert_eq!(services.count(), 2);
    assert_eq!(services.status_counts().failed, 1);

    let details = client.get_service("nginx.service").await.unwrap();
    assert_eq!(details.main_pid, 99);
    assert!(details.is_running());

    let containers = client.list_containers().await.unwrap();
    assert!(containers.get("abc123").unwrap().is_running());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (client, _) = spawn_backend().await;
    let err = client.get_service("missing.service").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            status: 500,
            body: "unit not found".to_string()
        }
    );
}

#[tokio::test]
async fn test_request_timeout() {
    let (client, _) = spawn_backend().await;
    let mut config = ApiConfig::new(format!("{}/slow", client.base_url()));
    config.request_timeout_ms = 100;
    let slow_client = ApiClient::new(&config).unwrap();
    let err = slow_client.list_services().await.unwrap_err();
    assert_eq!(err, ApiError::Timeout(Duration::from_millis(100)));
}

#[tokio::test]
async fn test_actions_post_to_entity_paths() {
    let (client, backend) = spawn_backend().await;
    let targets = vec![
        EntityId::service("nginx.service"),
        EntityId::service("bad.service"),
    ];
    let outcome = run_bulk(&client, ActionKind::Restart, &targets).await;
    assert_eq!(outcome.succeeded, vec![EntityId::service("nginx.service")]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(
        backend.actions.lock().unwrap().as_slice(),
        &[
            "services/nginx.service/restart".to_string(),
            "services/bad.service/restart".to_string()
        ]
    );
}

#[tokio::test]
async fn test_log_stream_decodes_events() {
    let (client, backend) = spawn_backend().await;
    let events: Vec<_> = client
        .stream_logs(&EntityId::service("nginx.service"), 250)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(events.len(), 2);
    let first = events[0].as_ref().unwrap();
    assert_eq!(first.event, "log");
    assert_eq!(first.data, "2024-01-01T00:00:00Z: unit started");
    assert_eq!(backend.log_lines.lock().unwrap().as_slice(), &[250]);
}

#[tokio::test]
async fn test_non_event_stream_is_rejected() {
    let (client, _) = spawn_backend().await;
    let err = match client.stream_logs(&EntityId::container("abc123"), 10).await {
        Ok(_) => panic!("plain text accepted as an event stream"),
        Err(e) => e,
    };
    assert_eq!(err, ApiError::UnsupportedStream);
}

#[tokio::test]
async fn test_tailer_over_http() {
    let (client, _) = spawn_backend().await;
    let tailer = LogTailer::spawn(Arc::new(client), EntityId::service("nginx.service"), 100);
    // The backend closes the stream after two events.
    eventually(|| !tailer.status().is_streaming).await;
    assert!(tailer.status().error.is_none());
    assert_eq!(
        tailer.records(),
        vec![
            LogRecord::new("2024-01-01T00:00:00Z", "unit started"),
            LogRecord::new("2024-01-01T00:00:01Z", "ready"),
        ]
    );
}

#[tokio::test]
async fn test_tailer_reports_unsupported_stream() {
    let (client, _) = spawn_backend().await;
    let tailer = LogTailer::spawn(Arc::new(client), EntityId::container("abc123"), 100);
    eventually(|| tailer.status().error.is_some()).await;
    assert_eq!(
        tailer.status().error.as_deref(),
        Some("Server-Sent Events are not supported by this endpoint")
    );
}

#[tokio::test]
async fn test_exec_over_http() {
    let (client, backend) = spawn_backend().await;
    let mut session = ExecSession::new(Arc::new(client), "abc123");
    session.execute("uname -a");
    eventually(|| !session.status().is_streaming).await;
    assert_eq!(session.output(), vec!["hello"]);
    assert!(session.status().error.is_none());
    assert_eq!(
        backend.exec_commands.lock().unwrap().as_slice(),
        &["uname -a".to_string()]
    );
}

#[tokio::test]
async fn test_subscription_over_http() {
    let (client, _) = spawn_backend().await;
    let sub = Subscription::spawn(ApiSource::services(client), PollerConfig::manual());
    sub.watch().wait_for(|s| !s.is_loading).await.unwrap();
    let state = sub.state();
    assert!(state.error.is_none());
    assert_eq!(state.data.unwrap().count(), 2);
}
