//! In-process mock upstreams shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{addr}")
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

// ---------------------------------------------------------------------------
// Completion service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CompletionLog {
    pub requests: Vec<Value>,
    pub authorization: Vec<Option<String>>,
}

#[derive(Clone)]
pub struct MockCompletion {
    pub status: StatusCode,
    pub reply: Value,
    pub log: Arc<Mutex<CompletionLog>>,
}

impl MockCompletion {
    pub fn replying_text(text: &str) -> Self {
        Self::replying(StatusCode::OK, json!({ "choices": [{ "text": text }] }))
    }

    pub fn replying(status: StatusCode, reply: Value) -> Self {
        Self {
            status,
            reply,
            log: Arc::new(Mutex::new(CompletionLog::default())),
        }
    }

    pub async fn serve(&self) -> String {
        let router = Router::new()
            .route("/completions", post(complete))
            .with_state(self.clone());
        spawn(router).await
    }
}

async fn complete(
    State(mock): State<MockCompletion>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    {
        let mut log = mock.log.lock().unwrap();
        log.requests.push(body);
        log.authorization.push(bearer(&headers));
    }
    (mock.status, Json(mock.reply.clone()))
}

// ---------------------------------------------------------------------------
// Workflow engine
// ---------------------------------------------------------------------------

/// One scripted run observation: `(status, completion text)`.
pub type Observation = (&'static str, Option<&'static str>);

pub fn run_body(run_id: &str, status: &str, text: Option<&str>) -> Value {
    let results = match text {
        Some(text) => json!([[{ "value": { "completion": { "text": text } } }]]),
        None => Value::Null,
    };
    json!({ "run": { "run_id": run_id, "status": { "run": status }, "results": results } })
}

#[derive(Default)]
pub struct EngineLog {
    pub submissions: Vec<(String, String, Value)>,
    pub fetches: Vec<(String, String, String)>,
    pub authorization: Vec<Option<String>>,
}

#[derive(Clone)]
pub struct MockEngine {
    pub run_id: &'static str,
    pub on_submit: Observation,
    pub polls: Arc<Mutex<VecDeque<Observation>>>,
    pub log: Arc<Mutex<EngineLog>>,
}

impl MockEngine {
    pub fn new(run_id: &'static str, on_submit: Observation, polls: Vec<Observation>) -> Self {
        Self {
            run_id,
            on_submit,
            polls: Arc::new(Mutex::new(polls.into())),
            log: Arc::new(Mutex::new(EngineLog::default())),
        }
    }

    pub async fn serve(&self) -> String {
        let router = Router::new()
            .route("/{owner}/{persona}/runs", post(submit_run))
            .route("/{owner}/{persona}/runs/{run_id}", get(fetch_run))
            .with_state(self.clone());
        spawn(router).await
    }

    pub fn fetch_count(&self) -> usize {
        self.log.lock().unwrap().fetches.len()
    }
}

async fn submit_run(
    State(engine): State<MockEngine>,
    Path((owner, persona)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    {
        let mut log = engine.log.lock().unwrap();
        log.submissions.push((owner, persona, body));
        log.authorization.push(bearer(&headers));
    }
    let (status, text) = engine.on_submit;
    Json(run_body(engine.run_id, status, text))
}

async fn fetch_run(
    State(engine): State<MockEngine>,
    Path((owner, persona, run_id)): Path<(String, String, String)>,
) -> Json<Value> {
    engine
        .log
        .lock()
        .unwrap()
        .fetches
        .push((owner, persona, run_id.clone()));
    let (status, text) = engine
        .polls
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(("running", None));
    Json(run_body(&run_id, status, text))
}

// ---------------------------------------------------------------------------
// Inquiry web API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InquiryApiLog {
    pub patches: Vec<(String, Value)>,
    pub api_keys: Vec<Option<String>>,
}

#[derive(Clone, Default)]
pub struct MockInquiryApi {
    pub log: Arc<Mutex<InquiryApiLog>>,
}

impl MockInquiryApi {
    pub async fn serve(&self) -> String {
        let router = Router::new()
            .route("/api/v1/inquiries/{id}", patch(patch_inquiry))
            .with_state(self.clone());
        spawn(router).await
    }
}

async fn patch_inquiry(
    State(api): State<MockInquiryApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    {
        let mut log = api.log.lock().unwrap();
        log.patches.push((id.clone(), body.clone()));
        log.api_keys.push(
            headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
        );
    }
    match id.as_str() {
        "missing" => (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))),
        "broken" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "database unavailable" })),
        ),
        "garbled" => (StatusCode::OK, Json(json!({ "data": { "id": id } }))),
        _ => (
            StatusCode::OK,
            Json(json!({
                "data": {
                    "id": id,
                    "connectionType": "WEB",
                    "connectionUserId": "user-1",
                    "queryType": "chat",
                    "query": "hello",
                    "status": body["status"],
                    "result": body.get("result").cloned().unwrap_or(Value::Null),
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:05Z"
                }
            })),
        ),
    }
}
