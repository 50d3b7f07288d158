//! Fetch gateway - Axum HTTP server in front of the fetcher

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::proxy::{ProxyInfo, ProxyStatus};
use crate::solver::{SolverRequest, WaitFor};

type ApiError = (StatusCode, String);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Fetcher>,
}

pub struct Gateway {
    host: String,
    port: u16,
    state: AppState,
}

impl Gateway {
    pub fn new(host: String, port: u16, fetcher: Arc<Fetcher>) -> Self {
        Self {
            host,
            port,
            state: AppState { fetcher },
        }
    }

    pub fn router(state: AppState) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/healthz", get(health_check_handler))
            .route("/v1/fetch", post(handle_fetch))
            .route("/v1/proxies", get(handle_list_proxies))
            .route("/v1/proxies/:name/ip", get(handle_proxy_ip))
            .route("/v1/proxies/:name/restart", post(handle_proxy_restart))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serves until Ctrl+C or SIGTERM, then closes solver sessions
    pub async fn run(self) -> anyhow::Result<()> {
        let fetcher = self.state.fetcher.clone();
        let app = Self::router(self.state);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Gateway listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        fetcher.close().await;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    #[default]
    Get,
    Post,
}

#[derive(Debug, Deserialize)]
pub struct FetchBody {
    pub url: String,
    #[serde(default)]
    pub method: FetchMethod,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    pub proxy: Option<String>,
    pub cache: Option<bool>,
    pub wait_for: Option<WaitFor>,
}

impl FetchBody {
    fn to_request(&self) -> SolverRequest {
        let mut builder = match self.method {
            FetchMethod::Get => SolverRequest::get(&self.url),
            FetchMethod::Post => {
                let form: Vec<(&String, &String)> = self.form.iter().collect();
                SolverRequest::post(&self.url).form(&form)
            }
        };
        if let Some(wait_for) = &self.wait_for {
            builder = builder.wait_for(wait_for.clone());
        }
        builder = match self.cache {
            Some(true) => builder.enable_cache(),
            Some(false) => builder.disable_cache(),
            None => builder,
        };
        builder.build()
    }
}

#[derive(Debug, Serialize)]
struct ProxyView {
    #[serde(flatten)]
    info: ProxyInfo,
    status: ProxyStatus,
}

fn error_status(error: &FetchError) -> StatusCode {
    match error {
        FetchError::PoolExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        FetchError::UnknownProxy(_) | FetchError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Only http(s) targets reach the solver's browser
fn is_web_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn api_error(error: FetchError) -> ApiError {
    (error_status(&error), error.to_string())
}

async fn health_check_handler() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

/// Handle POST /v1/fetch
async fn handle_fetch(
    State(state): State<AppState>,
    Json(body): Json<FetchBody>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_web_url(&body.url) {
        return Err((StatusCode::BAD_REQUEST, format!("invalid url `{}`", body.url)));
    }

    let request = body.to_request();
    tracing::info!("Fetch {} via {}", body.url, body.proxy.as_deref().unwrap_or("active proxy"));

    let page = match &body.proxy {
        Some(proxy) => state.fetcher.fetch_via(&request, proxy).await,
        None => state.fetcher.fetch(&request).await,
    }
    .map_err(api_error)?;

    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page))
}

/// Handle GET /v1/proxies
async fn handle_list_proxies(State(state): State<AppState>) -> Json<Vec<ProxyView>> {
    let pool = state.fetcher.pool();
    let infos = pool.list().await;
    let statuses = futures::future::join_all(infos.iter().map(|info| async move {
        match pool.get(&info.name) {
            Some(endpoint) => endpoint.status().await.unwrap_or(ProxyStatus::Unknown),
            None => ProxyStatus::Unknown,
        }
    }))
    .await;

    Json(
        infos
            .into_iter()
            .zip(statuses)
            .map(|(info, status)| ProxyView { info, status })
            .collect(),
    )
}

/// Handle GET /v1/proxies/:name/ip
async fn handle_proxy_ip(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let endpoint = state
        .fetcher
        .pool()
        .get(&name)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown proxy `{}`", name)))?;
    let ip = endpoint.public_ip().await.map_err(api_error)?;
    Ok(Json(json!({"name": name, "ip": ip})))
}

/// Handle POST /v1/proxies/:name/restart
async fn handle_proxy_restart(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.fetcher.pool();
    let endpoint = pool
        .get(&name)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown proxy `{}`", name)))?;
    let api = endpoint
        .api()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("proxy `{}` has no control API", name)))?;

    let wait = Duration::from_secs(state.fetcher.retry().restart_timeout);
    api.restart(wait).await.map_err(api_error)?;
    pool.clear_failure(&name);

    Ok(Json(json!({"name": name, "status": ProxyStatus::Running})))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
