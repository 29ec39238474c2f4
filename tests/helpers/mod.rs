//! Test helper utilities: a scripted in-process backend and fake window
//! system doubles for driving the orchestrators without a browser.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use posting_expert_client::orchestrator::window::{OpenerWindow, PopupWindow, WindowOpener};

/// Scripted double of the Posting Expert backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<MockBackendState>,
}

#[derive(Default)]
struct MockBackendState {
    enqueue_bodies: Mutex<Vec<Value>>,
    enqueue_responses: Mutex<VecDeque<(u16, Value)>>,
    status_script: Mutex<VecDeque<(u16, Value)>>,
    status_polls: AtomicUsize,
    callback_bodies: Mutex<Vec<Value>>,
    callback_response: Mutex<Option<(u16, Value)>>,
    disconnect_bodies: Mutex<Vec<Value>>,
    disconnect_response: Mutex<Option<Value>>,
    social_script: Mutex<VecDeque<(u64, Value)>>,
    profile_response: Mutex<Option<Value>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind on an ephemeral port and serve until the test ends.
    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/queue/enqueue", post(enqueue))
            .route("/queue/status/{job_id}", get(job_status))
            .route("/social/{provider}/callback", post(social_callback))
            .route("/social/{provider}/disconnect", post(social_disconnect))
            .route("/social/status", get(social_status))
            .route("/user/profile", get(user_profile))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend serve");
        });
        format!("http://{addr}")
    }

    /// Script the next enqueue response; unscripted enqueues return
    /// `{job_id: "J1"}`.
    pub fn script_enqueue(&self, code: u16, body: Value) {
        self.inner
            .enqueue_responses
            .lock()
            .unwrap()
            .push_back((code, body));
    }

    /// Append poll responses, served in order; an exhausted script keeps
    /// answering `in_progress`.
    pub fn script_status(&self, responses: impl IntoIterator<Item = (u16, Value)>) {
        self.inner
            .status_script
            .lock()
            .unwrap()
            .extend(responses);
    }

    pub fn script_callback(&self, code: u16, body: Value) {
        *self.inner.callback_response.lock().unwrap() = Some((code, body));
    }

    pub fn script_disconnect(&self, body: Value) {
        *self.inner.disconnect_response.lock().unwrap() = Some(body);
    }

    /// Append social-status responses as (artificial delay ms, body).
    pub fn script_social_status(&self, responses: impl IntoIterator<Item = (u64, Value)>) {
        self.inner
            .social_script
            .lock()
            .unwrap()
            .extend(responses);
    }

    pub fn script_profile(&self, body: Value) {
        *self.inner.profile_response.lock().unwrap() = Some(body);
    }

    pub fn enqueue_bodies(&self) -> Vec<Value> {
        self.inner.enqueue_bodies.lock().unwrap().clone()
    }

    pub fn callback_bodies(&self) -> Vec<Value> {
        self.inner.callback_bodies.lock().unwrap().clone()
    }

    pub fn disconnect_bodies(&self) -> Vec<Value> {
        self.inner.disconnect_bodies.lock().unwrap().clone()
    }

    pub fn status_polls(&self) -> usize {
        self.inner.status_polls.load(Ordering::SeqCst)
    }
}

async fn enqueue(
    State(backend): State<MockBackend>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.inner.enqueue_bodies.lock().unwrap().push(body);
    let scripted = backend.inner.enqueue_responses.lock().unwrap().pop_front();
    match scripted {
        Some((code, value)) => (status(code), Json(value)),
        None => (StatusCode::OK, Json(json!({ "job_id": "J1" }))),
    }
}

async fn job_status(
    State(backend): State<MockBackend>,
    Path(_job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    backend.inner.status_polls.fetch_add(1, Ordering::SeqCst);
    let scripted = backend.inner.status_script.lock().unwrap().pop_front();
    match scripted {
        Some((code, value)) => (status(code), Json(value)),
        None => (StatusCode::OK, Json(json!({ "status": "in_progress" }))),
    }
}

async fn social_callback(
    State(backend): State<MockBackend>,
    Path(_provider): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.inner.callback_bodies.lock().unwrap().push(body);
    let scripted = backend.inner.callback_response.lock().unwrap().clone();
    match scripted {
        Some((code, value)) => (status(code), Json(value)),
        None => (StatusCode::OK, Json(json!({ "success": true }))),
    }
}

async fn social_disconnect(
    State(backend): State<MockBackend>,
    Path(_provider): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    backend.inner.disconnect_bodies.lock().unwrap().push(body);
    let scripted = backend.inner.disconnect_response.lock().unwrap().clone();
    Json(scripted.unwrap_or_else(|| json!({ "success": true })))
}

async fn social_status(
    State(backend): State<MockBackend>,
    Query(_query): Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    let scripted = backend.inner.social_script.lock().unwrap().pop_front();
    match scripted {
        Some((delay_ms, value)) => {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Json(value)
        }
        None => Json(json!({})),
    }
}

async fn user_profile(State(backend): State<MockBackend>) -> Json<Value> {
    let scripted = backend.inner.profile_response.lock().unwrap().clone();
    Json(scripted.unwrap_or_else(|| json!({})))
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).expect("valid scripted status code")
}

/// Popup double; closure can be driven from the test or from the
/// orchestrator's own teardown.
#[derive(Clone, Default)]
pub struct FakePopup {
    closed: Arc<AtomicBool>,
}

impl FakePopup {
    /// Simulate the user closing the window.
    pub fn close_externally(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl PopupWindow for FakePopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Record of one `open` call.
pub struct OpenedPopup {
    pub url: String,
    pub name: String,
    pub popup: FakePopup,
}

/// Window-opener double; can be set to behave like a popup blocker.
#[derive(Default)]
pub struct FakeOpener {
    blocked: AtomicBool,
    opened: Mutex<Vec<OpenedPopup>>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocking() -> Self {
        Self {
            blocked: AtomicBool::new(true),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn last_opened(&self) -> Option<(String, String, FakePopup)> {
        self.opened
            .lock()
            .unwrap()
            .last()
            .map(|opened| (opened.url.clone(), opened.name.clone(), opened.popup.clone()))
    }
}

impl WindowOpener for FakeOpener {
    fn open(&self, url: &str, name: &str, _features: &str) -> Option<Box<dyn PopupWindow>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        let popup = FakePopup::default();
        self.opened.lock().unwrap().push(OpenedPopup {
            url: url.to_string(),
            name: name.to_string(),
            popup: popup.clone(),
        });
        Some(Box::new(popup))
    }
}

/// Opener-window double for the popup-side callback runner.
#[derive(Default)]
pub struct FakeOpenerWindow {
    posted: Mutex<Vec<Value>>,
    closed: AtomicBool,
}

impl FakeOpenerWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl OpenerWindow for FakeOpenerWindow {
    fn post_message(&self, data: Value) {
        self.posted.lock().unwrap().push(data);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
