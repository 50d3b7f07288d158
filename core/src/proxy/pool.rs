//! Proxy pool: registry of named endpoints and failover selection

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{ConfigError, FetchError};
use crate::proxy::cooldown::CooldownTracker;
use crate::proxy::ProxyEndpoint;

/// Listing entry for status output
#[derive(Debug, Clone, Serialize)]
pub struct ProxyInfo {
    pub name: String,
    pub url: String,
    pub active: bool,
    pub has_api: bool,
    pub cooldown_secs: Option<u64>,
}

pub struct ProxyPool {
    endpoints: DashMap<String, Arc<ProxyEndpoint>>,
    active: RwLock<Option<String>>,
    cooldowns: CooldownTracker,
    cooldown: Duration,
    rotations: AtomicUsize,
}

impl ProxyPool {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            endpoints: DashMap::new(),
            active: RwLock::new(None),
            cooldowns: CooldownTracker::new(),
            cooldown,
            rotations: AtomicUsize::new(0),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let pool = Self::new(Duration::from_secs(config.retry.cooldown));
        pool.load(config).await?;
        Ok(pool)
    }

    /// Replace the registry with the proxies of `config`
    pub async fn load(&self, config: &Config) -> Result<usize, ConfigError> {
        let mut endpoints = Vec::with_capacity(config.proxies.len());
        for (name, entry) in &config.proxies {
            endpoints.push(entry.to_endpoint(name)?);
        }
        if let Some(name) = &config.proxy {
            if !config.proxies.contains_key(name) {
                return Err(ConfigError::UnknownProxy(name.clone()));
            }
        }

        self.endpoints.clear();
        self.cooldowns.cleanup_expired();
        for endpoint in endpoints {
            self.endpoints.insert(endpoint.name().to_string(), Arc::new(endpoint));
        }
        *self.active.write().await = config.proxy.clone();

        tracing::debug!("Loaded {} proxies, default {:?}", self.endpoints.len(), config.proxy);
        Ok(self.endpoints.len())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProxyEndpoint>> {
        self.endpoints.get(name).map(|e| e.value().clone())
    }

    /// Proxy names in rotation order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Active proxy, None means requests go direct
    pub async fn current(&self) -> Option<Arc<ProxyEndpoint>> {
        let active = self.active.read().await;
        active.as_deref().and_then(|name| self.get(name))
    }

    /// Make `name` the active proxy
    pub async fn pin(&self, name: &str) -> Result<Arc<ProxyEndpoint>, FetchError> {
        let endpoint = self
            .get(name)
            .ok_or_else(|| FetchError::UnknownProxy(name.to_string()))?;
        *self.active.write().await = Some(name.to_string());
        Ok(endpoint)
    }

    /// Switch to the next proxy that is not cooling down
    pub async fn rotate(&self) -> Result<Arc<ProxyEndpoint>, FetchError> {
        let names = self.names();
        let total = names.len();
        if total == 0 {
            return Err(FetchError::PoolExhausted { wait: Duration::ZERO });
        }

        let mut active = self.active.write().await;

        // Start right after the active proxy so it is considered last
        let start = active
            .as_deref()
            .and_then(|a| names.iter().position(|n| n == a))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        for offset in 0..total {
            let name = &names[(start + offset) % total];
            if self.cooldowns.is_cooling(name) {
                continue;
            }
            if let Some(endpoint) = self.get(name) {
                if active.as_deref() != Some(name.as_str()) {
                    tracing::info!("Rotating proxy {:?} -> {}", active.as_deref(), name);
                    self.rotations.fetch_add(1, Ordering::Relaxed);
                }
                *active = Some(name.clone());
                return Ok(endpoint);
            }
        }

        let wait = names
            .iter()
            .filter_map(|n| self.cooldowns.remaining(n))
            .min()
            .unwrap_or(self.cooldown);
        Err(FetchError::PoolExhausted { wait })
    }

    pub fn mark_failed(&self, name: &str, reason: &str) {
        self.cooldowns.mark(name, self.cooldown, reason);
    }

    pub fn clear_failure(&self, name: &str) -> bool {
        self.cooldowns.clear(name)
    }

    pub fn is_cooling(&self, name: &str) -> bool {
        self.cooldowns.is_cooling(name)
    }

    pub fn remaining_cooldown(&self, name: &str) -> Option<Duration> {
        self.cooldowns.remaining(name)
    }

    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::Relaxed)
    }

    pub async fn list(&self) -> Vec<ProxyInfo> {
        let active = self.active.read().await.clone();
        self.names()
            .into_iter()
            .filter_map(|name| self.get(&name))
            .map(|endpoint| ProxyInfo {
                name: endpoint.name().to_string(),
                url: endpoint.url().to_string(),
                active: active.as_deref() == Some(endpoint.name()),
                has_api: endpoint.api().is_some(),
                cooldown_secs: self.remaining_cooldown(endpoint.name()).map(|d| d.as_secs()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool(default: Option<&str>) -> ProxyPool {
        let mut config = Config::sample(3);
        config.proxy = default.map(String::from);
        ProxyPool::from_config(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_starts_at_default() {
        let pool = pool(Some("vpn2")).await;
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.current().await.unwrap().name(), "vpn2");
        assert_eq!(pool.names(), vec!["vpn1", "vpn2", "vpn3"]);
    }

    #[tokio::test]
    async fn test_direct_without_default() {
        let pool = pool(None).await;
        assert!(pool.current().await.is_none());
        // Rotation picks up the first proxy
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn1");
    }

    #[tokio::test]
    async fn test_rotation_wraps_and_skips_cooling() {
        let pool = pool(Some("vpn2")).await;
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn3");
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn1");

        pool.mark_failed("vpn2", "tunnel failed");
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn3");
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn1");
        assert_eq!(pool.rotations(), 4);
    }

    #[tokio::test]
    async fn test_rotation_keeps_only_healthy_proxy() {
        let pool = pool(Some("vpn1")).await;
        pool.mark_failed("vpn2", "x");
        pool.mark_failed("vpn3", "x");
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn1");
    }

    #[tokio::test]
    async fn test_exhausted_pool() {
        let pool = pool(Some("vpn1")).await;
        for name in pool.names() {
            pool.mark_failed(&name, "down");
        }
        match pool.rotate().await {
            Err(FetchError::PoolExhausted { wait }) => {
                assert!(wait > Duration::from_secs(290) && wait <= Duration::from_secs(300));
            }
            other => panic!("expected PoolExhausted, got {:?}", other.map(|e| e.name().to_string())),
        }

        pool.clear_failure("vpn3");
        assert_eq!(pool.rotate().await.unwrap().name(), "vpn3");
    }

    #[tokio::test]
    async fn test_pin_and_list() {
        let pool = pool(Some("vpn1")).await;
        pool.pin("vpn3").await.unwrap();
        assert!(matches!(pool.pin("vpn9").await, Err(FetchError::UnknownProxy(_))));
        pool.mark_failed("vpn1", "x");

        let list = pool.list().await;
        assert_eq!(list.len(), 3);
        assert!(list[2].active && !list[0].active);
        assert!(list[0].cooldown_secs.is_some());
        assert!(list[1].cooldown_secs.is_none());
        assert!(list.iter().all(|p| p.has_api));
    }

    #[tokio::test]
    async fn test_empty_pool() {
        let pool = ProxyPool::from_config(&Config::default()).await.unwrap();
        assert!(pool.is_empty());
        assert!(pool.current().await.is_none());
        assert!(matches!(pool.rotate().await, Err(FetchError::PoolExhausted { .. })));
    }
}
