//! gluetun control server client
//!
//! See <https://github.com/qdm12/gluetun-wiki/blob/main/setup/advanced/control-server.md>

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::{sleep, timeout, Duration};

use crate::error::FetchError;
use crate::proxy::Credentials;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const STOP_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyStatus {
    Running,
    Stopped,
    Unknown,
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyStatus::Running => f.write_str("running"),
            ProxyStatus::Stopped => f.write_str("stopped"),
            ProxyStatus::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VpnStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct PublicIp {
    public_ip: String,
}

#[derive(Debug, Clone)]
pub struct GluetunApi {
    url: String,
    credentials: Option<Credentials>,
    http_client: Client,
}

impl GluetunApi {
    pub fn new(url: &str, credentials: Option<Credentials>) -> Self {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            url: url.trim_end_matches('/').to_string(),
            credentials,
            http_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, FetchError> {
        match &self.credentials {
            Some(credentials) => Ok(request.headers(credentials.to_headers()?)),
            None => Ok(request),
        }
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = self
            .authorize(request)?
            .send()
            .await
            .map_err(|e| FetchError::ProxyApi(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::ProxyApi(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::ProxyApi(format!("unexpected response: {}", e)))
    }

    /// Public IP address of the VPN exit
    pub async fn public_ip(&self) -> Result<String, FetchError> {
        let request = self.http_client.get(self.endpoint("/v1/publicip/ip"));
        let ip: PublicIp = self.send(request).await?;
        Ok(ip.public_ip)
    }

    /// VPN tunnel status
    pub async fn status(&self) -> Result<ProxyStatus, FetchError> {
        let request = self.http_client.get(self.endpoint("/v1/openvpn/status"));
        let status: VpnStatus = self.send(request).await?;
        Ok(match status.status.as_str() {
            "running" => ProxyStatus::Running,
            "stopped" => ProxyStatus::Stopped,
            _ => ProxyStatus::Unknown,
        })
    }

    async fn put_status(&self, status: &str) -> Result<(), FetchError> {
        let request = self
            .http_client
            .put(self.endpoint("/v1/openvpn/status"))
            .json(&VpnStatus { status: status.to_string() });
        let response = self
            .authorize(request)?
            .send()
            .await
            .map_err(|e| FetchError::ProxyApi(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::ProxyApi(format!(
                "setting status `{}` returned {}",
                status,
                response.status()
            )));
        }
        Ok(())
    }

    /// Reconnects the VPN and waits until it reports `running`
    pub async fn restart(&self, wait: Duration) -> Result<(), FetchError> {
        tracing::info!("Restarting VPN at {}", self.url);

        // gluetun may drop the connection while stopping, only the final state matters
        if let Err(e) = self.put_status("stopped").await {
            tracing::debug!("Stopping VPN at {}: {}", self.url, e);
        }
        sleep(STOP_PAUSE).await;
        if let Err(e) = self.put_status("running").await {
            tracing::debug!("Starting VPN at {}: {}", self.url, e);
        }

        match timeout(wait, self.wait_until_running()).await {
            Ok(()) => {
                tracing::info!("VPN at {} is running", self.url);
                Ok(())
            }
            Err(_) => Err(FetchError::Timeout(format!(
                "VPN at {} not running after {}s",
                self.url,
                wait.as_secs()
            ))),
        }
    }

    async fn wait_until_running(&self) {
        loop {
            match self.status().await {
                Ok(ProxyStatus::Running) => break,
                Ok(status) => tracing::debug!("VPN at {} is {}", self.url, status),
                Err(e) => tracing::debug!("VPN at {} status: {}", self.url, e),
            }
            sleep(POLL_INTERVAL).await;
        }
        // Give the tunnel a moment before routing traffic through it
        sleep(POLL_INTERVAL).await;
    }
}
