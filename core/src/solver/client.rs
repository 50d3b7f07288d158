//! Client for a FlareSolverr-compatible challenge solver

use reqwest::Client;
use tokio::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::proxy::ProxyEndpoint;
use crate::solver::request::Command;
use crate::solver::{SolverRequest, SolverResponse};

/// Extra time granted to the HTTP call over the solver's own timeout
const TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SolverClient {
    http_client: Client,
    url: String,
    timeout: Duration,
}

impl SolverClient {
    pub fn new(url: &str, timeout: Duration) -> FetchResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout + TIMEOUT_MARGIN)
            .build()?;

        Ok(Self {
            http_client,
            url: url.to_string(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, command: &Command<'_>) -> FetchResult<SolverResponse> {
        // Errors come back as HTTP 500 with a JSON body, so the status code is not checked
        let response = self.http_client.post(&self.url).json(command).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed: SolverResponse = serde_json::from_str(&body).map_err(|e| {
            FetchError::Json(format!("solver returned {} with invalid body: {}", status, e))
        })?;

        if parsed.is_ok() {
            tracing::debug!("Solver answered in {}ms: {}", parsed.elapsed_ms(), parsed.message);
            Ok(parsed)
        } else {
            tracing::debug!("Solver error: {}", parsed.message);
            Err(FetchError::from_solver_message(&parsed.message))
        }
    }

    /// Starts a browser session routed through `proxy`
    pub async fn create_session(&self, proxy: Option<&ProxyEndpoint>) -> FetchResult<String> {
        let command = Command::create_session(proxy.map(ProxyEndpoint::solver_proxy));
        let response = self.call(&command).await?;
        let session = response.session.ok_or(FetchError::MissingSession)?;
        tracing::debug!(
            "Created solver session {} via {}",
            session,
            proxy.map(|p| p.name()).unwrap_or("direct")
        );
        Ok(session)
    }

    pub async fn destroy_session(&self, session: &str) -> FetchResult<()> {
        self.call(&Command::destroy_session(session)).await?;
        tracing::debug!("Destroyed solver session {}", session);
        Ok(())
    }

    pub async fn list_sessions(&self) -> FetchResult<Vec<String>> {
        let response = self.call(&Command::list_sessions()).await?;
        Ok(response.sessions.unwrap_or_default())
    }

    /// Runs a request and returns the page body of a 200 response
    pub async fn solve(&self, request: &SolverRequest, session: Option<&str>) -> FetchResult<String> {
        let max_timeout = self.timeout.as_millis() as u64;
        let command = Command::request(request, session, max_timeout);
        let response = self.call(&command).await?;
        let solution = response.solution.ok_or(FetchError::MissingSolution)?;

        if solution.status == 200 {
            Ok(solution.response)
        } else {
            Err(FetchError::Status(solution.status))
        }
    }
}
