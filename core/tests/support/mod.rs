//! In-process fakes for the solver and the gluetun control server

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wnrake_core::config::{Config, ProxyEntry, RecoveryMode};

#[derive(Default)]
pub struct SolverState {
    /// request.get / request.post commands received
    pub requests: AtomicUsize,
    /// Proxy URL of every sessions.create
    pub created: Mutex<Vec<Option<String>>>,
    pub destroyed: AtomicUsize,
    /// Upcoming requests answered with a challenge error
    pub failures: AtomicUsize,
    /// Upcoming requests answered with a tunnel error
    pub tunnel_failures: AtomicUsize,
    /// Solution status, 0 means 200
    pub status: AtomicU16,
    pub delay_ms: AtomicU64,
}

pub struct FakeSolver {
    pub url: String,
    pub state: Arc<SolverState>,
}

fn ok(extra: Value) -> (StatusCode, Json<Value>) {
    let mut body = json!({"status": "ok", "message": "", "startTimestamp": 0, "endTimestamp": 1, "version": "fake"});
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    (StatusCode::OK, Json(body))
}

fn error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error", "message": message, "startTimestamp": 0, "endTimestamp": 1, "version": "fake"})),
    )
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn handle(State(state): State<Arc<SolverState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["cmd"].as_str().unwrap_or_default() {
        "sessions.create" => {
            let proxy = body["proxy"]["url"].as_str().map(String::from);
            let mut created = state.created.lock().unwrap();
            created.push(proxy);
            ok(json!({"session": format!("session-{}", created.len())}))
        }
        "sessions.destroy" => {
            state.destroyed.fetch_add(1, Ordering::SeqCst);
            ok(json!({}))
        }
        "request.get" | "request.post" => {
            state.requests.fetch_add(1, Ordering::SeqCst);
            let delay = state.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if take_one(&state.tunnel_failures) {
                return error("Error: Unable to process browser request. net::ERR_TUNNEL_CONNECTION_FAILED");
            }
            if take_one(&state.failures) {
                return error("Error: Error solving the challenge. Timeout after 60.0 seconds.");
            }
            let status = match state.status.load(Ordering::SeqCst) {
                0 => 200,
                s => s,
            };
            let url = body["url"].as_str().unwrap_or_default();
            let page = match body["postData"].as_str() {
                Some(data) => format!("page {} {}", url, data),
                None => format!("page {}", url),
            };
            ok(json!({"solution": {"url": url, "status": status, "response": page}}))
        }
        _ => error("Error: unsupported cmd"),
    }
}

pub async fn spawn_solver() -> FakeSolver {
    let state = Arc::new(SolverState::default());
    let app = Router::new().route("/v1", post(handle)).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    FakeSolver {
        url: format!("http://{}/v1", addr),
        state,
    }
}

#[derive(Default)]
pub struct GluetunState {
    pub puts: AtomicUsize,
}

pub struct FakeGluetun {
    pub url: String,
    pub state: Arc<GluetunState>,
}

pub async fn spawn_gluetun() -> FakeGluetun {
    async fn status() -> Json<Value> {
        Json(json!({"status": "running"}))
    }
    async fn put_status(State(state): State<Arc<GluetunState>>) -> StatusCode {
        state.puts.fetch_add(1, Ordering::SeqCst);
        StatusCode::OK
    }
    async fn public_ip() -> Json<Value> {
        Json(json!({"public_ip": "198.51.100.1"}))
    }

    let state = Arc::new(GluetunState::default());
    let app = Router::new()
        .route("/v1/openvpn/status", get(status).put(put_status))
        .route("/v1/publicip/ip", get(public_ip))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    FakeGluetun {
        url: format!("http://{}", addr),
        state,
    }
}

/// Proxy entry without a control API; ports only need to be distinct
pub fn proxy_entry(port: u16, api: Option<&str>) -> ProxyEntry {
    ProxyEntry {
        url: format!("http://127.0.0.1:{}", port),
        username: None,
        password: None,
        api: api.map(String::from),
        api_username: None,
        api_password: None,
        api_key: None,
    }
}

/// Config pointing at the fake solver, fast retries, no cache
pub fn test_config(solver: &FakeSolver, proxies: &[(&str, ProxyEntry)], recovery: RecoveryMode) -> Config {
    let mut config = Config::default();
    config.solver = solver.url.clone();
    config.timeout = 5;
    config.retry.attempts = 3;
    config.retry.backoff_ms = 0;
    config.retry.restart_timeout = 5;
    config.retry.recovery = recovery;
    for (name, entry) in proxies {
        config.proxies.insert(name.to_string(), entry.clone());
    }
    config.proxy = proxies.first().map(|(name, _)| name.to_string());
    config.validate().unwrap();
    config
}
