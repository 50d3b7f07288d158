use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;
use crate::proxy::{Credentials, GluetunApi, ProxyEndpoint};

/// Gateway configuration
///
/// ```toml
/// solver = "http://localhost:8191/v1"
/// cache = "/path/to/wnrake-cache"
/// proxy = "vpn1"
///
/// [proxies]
/// vpn1 = { url = "http://localhost:9000", api = "http://localhost:8000", api_key = "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Challenge solver endpoint
    #[serde(default = "default_solver")]
    pub solver: String,

    /// Cache root directory, caching is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,

    /// Default proxy name, requests go direct when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Solver timeout per request, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub proxies: BTreeMap<String, ProxyEntry>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// gluetun control server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// Secrets stay out of logs
impl fmt::Debug for ProxyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("ProxyEntry")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("api", &self.api)
            .field("api_username", &self.api_username)
            .field("api_password", &redact(&self.api_password))
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl ProxyEntry {
    /// Builds the runtime endpoint for this entry
    pub fn to_endpoint(&self, name: &str) -> Result<ProxyEndpoint, ConfigError> {
        let api = match self.api.as_deref() {
            Some(url) => {
                let credentials = if let Some(key) = self.api_key.as_deref() {
                    Some(Credentials::api_key(key))
                } else if let Some(username) = self.api_username.as_deref() {
                    let password = self
                        .api_password
                        .as_deref()
                        .ok_or_else(|| ConfigError::IncompleteAuth(name.to_string()))?;
                    Some(Credentials::basic(username, password))
                } else {
                    None
                };
                Some(GluetunApi::new(url, credentials))
            }
            None => None,
        };

        let credentials = self
            .username
            .as_deref()
            .map(|u| Credentials::basic(u, self.password.as_deref().unwrap_or_default()));

        Ok(ProxyEndpoint::new(name, &self.url, credentials, api))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Reconnect the VPN through its control API, rotate if that is not possible
    Restart,
    /// Move on to the next proxy in the pool
    Rotate,
}

impl Default for RecoveryMode {
    fn default() -> Self {
        Self::Restart
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, recoveries included
    #[serde(default = "default_attempts")]
    pub attempts: usize,

    #[serde(default)]
    pub recovery: RecoveryMode,

    /// Seconds to wait for a restarted VPN to report `running`
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout: u64,

    /// Seconds a failed proxy is skipped by rotation
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,

    /// Base delay between attempts, grows linearly with the attempt number
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            recovery: RecoveryMode::default(),
            restart_timeout: default_restart_timeout(),
            cooldown: default_cooldown(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solver: default_solver(),
            cache: None,
            proxy: None,
            timeout: default_timeout(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            proxies: BTreeMap::new(),
        }
    }
}

// Default value functions
fn default_solver() -> String { "http://localhost:8191/v1".to_string() }
fn default_timeout() -> u64 { 60 }
fn default_attempts() -> usize { 5 }
fn default_restart_timeout() -> u64 { 60 }
fn default_cooldown() -> u64 { 300 }
fn default_backoff_ms() -> u64 { 1000 }
fn default_port() -> u16 { 8190 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_log_level() -> String { "info".to_string() }

/// Command line overrides applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub solver: Option<String>,
    pub cache: Option<PathBuf>,
    pub no_cache: bool,
    pub proxy: Option<String>,
}

impl Config {
    /// Parses and validates a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Checks cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url("solver", &self.solver)?;

        if let Some(name) = &self.proxy {
            if !self.proxies.contains_key(name) {
                return Err(ConfigError::UnknownProxy(name.clone()));
            }
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        // Ports map one-to-one onto published container ports, whatever the host is called
        let mut claimed: HashMap<u16, String> = HashMap::new();
        for (name, entry) in &self.proxies {
            if entry.api_username.is_some() && entry.api_password.is_none() {
                return Err(ConfigError::IncompleteAuth(name.clone()));
            }

            let mut endpoints = vec![(format!("{}.url", name), entry.url.as_str())];
            if let Some(api) = entry.api.as_deref() {
                endpoints.push((format!("{}.api", name), api));
            }

            for (field, raw) in endpoints {
                let url = parse_http_url(&field, raw)?;
                let port = url.port_or_known_default().ok_or_else(|| ConfigError::InvalidUrl {
                    field: field.clone(),
                    url: raw.to_string(),
                })?;

                if let Some(first) = claimed.get(&port) {
                    return Err(ConfigError::DuplicatePort {
                        first: first.clone(),
                        second: field,
                        port,
                    });
                }
                claimed.insert(port, field);
            }
        }

        Ok(())
    }

    /// Applies command line overrides and re-validates
    pub fn apply(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(solver) = overrides.solver {
            self.solver = solver;
        }
        if let Some(cache) = overrides.cache {
            self.cache = Some(cache);
        }
        if overrides.no_cache {
            self.cache = None;
        }
        if let Some(proxy) = overrides.proxy {
            self.proxy = Some(proxy);
        }
        self.validate()?;
        Ok(self)
    }

    /// Configuration matching `count` gluetun containers: vpnN on 9000+N-1 / 8000+N-1
    pub fn sample(count: usize) -> Self {
        let proxies = (0..count)
            .map(|i| {
                let entry = ProxyEntry {
                    url: format!("http://localhost:{}", 9000 + i),
                    username: None,
                    password: None,
                    api: Some(format!("http://localhost:{}", 8000 + i)),
                    api_username: None,
                    api_password: None,
                    api_key: Some("CHANGE_ME".to_string()),
                };
                (format!("vpn{}", i + 1), entry)
            })
            .collect::<BTreeMap<_, _>>();

        Self {
            cache: Some(PathBuf::from("/path/to/wnrake-cache")),
            proxy: if count > 0 { Some("vpn1".to_string()) } else { None },
            proxies,
            ..Self::default()
        }
    }

    /// Cache directory with `~` expanded
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.as_ref().map(expand_path)
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        field: field.to_string(),
        url: raw.to_string(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" | "socks5" | "socks5h" if url.host_str().is_some() => Ok(url),
        _ => Err(invalid()),
    }
}

/// Get default config file path
/// Uses ~/.config/wnrake/config.toml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("wnrake")
        .join("config.toml")
}

/// Config file to load, `None` when no file exists and defaults apply.
///
/// Loading order:
/// 1. Specified path (if provided, must exist)
/// 2. ./wnrake.toml (if exists)
/// 3. default_config_path() (usually ~/.config/wnrake/config.toml)
pub fn locate_config(path: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    locate_in(path, &[PathBuf::from("wnrake.toml"), default_config_path()])
}

fn locate_in(path: Option<PathBuf>, candidates: &[PathBuf]) -> anyhow::Result<Option<PathBuf>> {
    if let Some(config_path) = path {
        let config_path = expand_path(&config_path);
        if config_path.exists() {
            return Ok(Some(config_path));
        }
        anyhow::bail!("Specified config file not found: {:?}", config_path);
    }
    Ok(candidates.iter().find(|p| p.exists()).cloned())
}

/// Loads `located`, or defaults when it is `None`
pub fn load_located(located: Option<PathBuf>) -> anyhow::Result<Config> {
    match located {
        Some(path) => {
            let config = Config::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load {:?}: {}", path, e))?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load config from the file picked by [`locate_config`], or defaults
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    load_located(locate_config(path)?)
}

/// Expand ~ in path to home directory
pub fn expand_path(path: &PathBuf) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.clone()
}
