//! Error types for configuration and the fetch path

use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("default proxy `{0}` is not defined in [proxies]")]
    UnknownProxy(String),

    #[error("invalid URL for `{field}`: {url}")]
    InvalidUrl { field: String, url: String },

    #[error("`{first}` and `{second}` both use port {port}")]
    DuplicatePort { first: String, second: String, port: u16 },

    #[error("proxy `{0}`: api_username requires api_password")]
    IncompleteAuth(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors on the fetch path (solver, proxy, cache)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("network: {0}")]
    Network(String),

    #[error("json: {0}")]
    Json(String),

    #[error("proxy tunnel failed: {0}")]
    Tunnel(String),

    #[error("challenge not solved: {0}")]
    Challenge(String),

    #[error("solver: {0}")]
    Solver(String),

    #[error("no solution in solver response")]
    MissingSolution,

    #[error("no session in solver response")]
    MissingSession,

    #[error("target returned status {0}")]
    Status(u16),

    #[error("proxy api: {0}")]
    ProxyApi(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unknown proxy `{0}`")]
    UnknownProxy(String),

    #[error("all proxies are cooling down, retry in {}s", wait.as_secs())]
    PoolExhausted { wait: Duration },
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        // Report the innermost cause, reqwest's top level message is generic
        let mut err: &dyn std::error::Error = &error;
        while let Some(source) = err.source() {
            err = source;
        }
        if error.is_decode() {
            FetchError::Json(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        FetchError::Json(error.to_string())
    }
}

impl FetchError {
    /// Classifies an error message reported by the solver
    pub fn from_solver_message(message: &str) -> Self {
        if message.contains("ERR_TUNNEL_CONNECTION_FAILED") {
            FetchError::Tunnel(message.to_string())
        } else if message.contains("Error solving the challenge") {
            FetchError::Challenge(message.to_string())
        } else {
            FetchError::Solver(message.to_string())
        }
    }

    /// Whether a new attempt (after recovery) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Tunnel(_)
                | FetchError::Challenge(_)
                | FetchError::MissingSolution
                | FetchError::MissingSession
                | FetchError::ProxyApi(_)
                | FetchError::Timeout(_)
        )
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_message_classification() {
        let tunnel = FetchError::from_solver_message(
            "Error: Unable to process browser request. net::ERR_TUNNEL_CONNECTION_FAILED",
        );
        assert!(matches!(tunnel, FetchError::Tunnel(_)));
        assert!(tunnel.is_retryable());

        let challenge = FetchError::from_solver_message(
            "Error: Error solving the challenge. Timeout after 60.0 seconds.",
        );
        assert!(matches!(challenge, FetchError::Challenge(_)));
        assert!(challenge.is_retryable());

        let other = FetchError::from_solver_message("Error: Request parameter 'url' is mandatory");
        assert!(matches!(other, FetchError::Solver(_)));
        assert!(!other.is_retryable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Network("connection refused".into()).is_retryable());
        assert!(!FetchError::PoolExhausted { wait: Duration::from_secs(5) }.is_retryable());
        assert!(FetchError::Timeout("restart".into()).is_retryable());
    }

    #[test]
    fn test_pool_exhausted_message() {
        let err = FetchError::PoolExhausted { wait: Duration::from_secs(42) };
        assert_eq!(err.to_string(), "all proxies are cooling down, retry in 42s");
    }
}
