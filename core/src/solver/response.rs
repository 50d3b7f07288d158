//! Solver response format

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub cookies: Value,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub start_timestamp: u64,
    #[serde(default)]
    pub end_timestamp: u64,
    #[serde(default)]
    pub version: String,
    pub session: Option<String>,
    pub sessions: Option<Vec<String>>,
    pub solution: Option<Solution>,
}

impl SolverResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Time spent by the solver, in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.end_timestamp.saturating_sub(self.start_timestamp)
    }
}
