use serde::Serialize;
use std::fmt;

use crate::error::FetchError;
use crate::proxy::{Credentials, GluetunApi, ProxyStatus};

/// A named egress point: an HTTP proxy plus its optional control API
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    name: String,
    url: String,
    credentials: Option<Credentials>,
    api: Option<GluetunApi>,
}

/// Proxy object in the solver's `sessions.create` command
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SolverProxy {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

impl ProxyEndpoint {
    pub fn new(
        name: &str,
        url: &str,
        credentials: Option<Credentials>,
        api: Option<GluetunApi>,
    ) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            credentials,
            api,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn api(&self) -> Option<&GluetunApi> {
        self.api.as_ref()
    }

    pub fn solver_proxy(&self) -> SolverProxy {
        match &self.credentials {
            Some(Credentials::Basic { username, password }) => SolverProxy {
                url: self.url.clone(),
                username: Some(username.clone()),
                password: Some(password.clone()),
            },
            _ => SolverProxy {
                url: self.url.clone(),
                username: None,
                password: None,
            },
        }
    }

    /// VPN status, `Unknown` when there is no control API
    pub async fn status(&self) -> Result<ProxyStatus, FetchError> {
        match &self.api {
            Some(api) => api.status().await,
            None => Ok(ProxyStatus::Unknown),
        }
    }

    pub async fn public_ip(&self) -> Result<Option<String>, FetchError> {
        match &self.api {
            Some(api) => api.public_ip().await.map(Some),
            None => Ok(None),
        }
    }
}
