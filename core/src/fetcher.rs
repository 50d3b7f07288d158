//! Fetch orchestration: cache, proxy selection, solver sessions and recovery

use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::cache::DiskCache;
use crate::config::{Config, RecoveryMode, RetryConfig};
use crate::error::{FetchError, FetchResult};
use crate::proxy::{ProxyEndpoint, ProxyPool};
use crate::solver::{SolverClient, SolverRequest};

const JITTER_FACTOR: f64 = 0.2;

/// Solver session bound to one proxy (None = direct)
type SessionSlot = Arc<Mutex<Option<String>>>;

pub struct Fetcher {
    solver: SolverClient,
    pool: Arc<ProxyPool>,
    cache: Option<Arc<DiskCache>>,
    retry: RetryConfig,
    sessions: DashMap<Option<String>, SessionSlot>,
}

impl Fetcher {
    pub fn new(
        solver: SolverClient,
        pool: Arc<ProxyPool>,
        cache: Option<Arc<DiskCache>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            solver,
            pool,
            cache,
            retry,
            sessions: DashMap::new(),
        }
    }

    pub async fn from_config(config: &Config) -> FetchResult<Self> {
        let solver = SolverClient::new(&config.solver, Duration::from_secs(config.timeout))?;
        let pool = Arc::new(ProxyPool::from_config(config).await?);
        let cache = match config.cache_dir() {
            Some(dir) => Some(Arc::new(DiskCache::open(dir).await?)),
            None => None,
        };
        Ok(Self::new(solver, pool, cache, config.retry.clone()))
    }

    pub fn solver(&self) -> &SolverClient {
        &self.solver
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    pub fn cache(&self) -> Option<&Arc<DiskCache>> {
        self.cache.as_ref()
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn get(&self, url: &str) -> FetchResult<String> {
        self.fetch(&SolverRequest::get(url).build()).await
    }

    pub async fn post<K: AsRef<str>, V: AsRef<str>>(
        &self,
        url: &str,
        form: &[(K, V)],
    ) -> FetchResult<String> {
        self.fetch(&SolverRequest::post(url).form(form).build()).await
    }

    /// Fetches through the active proxy
    pub async fn fetch(&self, request: &SolverRequest) -> FetchResult<String> {
        self.fetch_cached(request, None).await
    }

    /// Fetches through a named proxy without touching the active one
    pub async fn fetch_via(&self, request: &SolverRequest, proxy: &str) -> FetchResult<String> {
        if self.pool.get(proxy).is_none() {
            return Err(FetchError::UnknownProxy(proxy.to_string()));
        }
        self.fetch_cached(request, Some(proxy)).await
    }

    async fn fetch_cached(&self, request: &SolverRequest, pinned: Option<&str>) -> FetchResult<String> {
        let cache = match self.cache.as_ref() {
            Some(cache) if request.uses_cache() => cache,
            _ => return self.fetch_with_retry(request, pinned).await,
        };

        // Concurrent fetches of one URL wait here and then hit the cache
        let _lock = cache.lock(request.url()).await;
        if let Some(data) = cache.get(request.url()).await? {
            tracing::debug!("{} found in cache", request.url());
            return Ok(String::from_utf8_lossy(&data).into_owned());
        }
        tracing::debug!("{} not found in cache", request.url());

        let body = self.fetch_with_retry(request, pinned).await?;
        cache.insert(request.url(), body.as_bytes()).await?;
        Ok(body)
    }

    async fn fetch_with_retry(&self, request: &SolverRequest, pinned: Option<&str>) -> FetchResult<String> {
        let max_attempts = self.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let proxy = match pinned {
                Some(name) => Some(
                    self.pool
                        .get(name)
                        .ok_or_else(|| FetchError::UnknownProxy(name.to_string()))?,
                ),
                None => self.pool.current().await,
            };

            let error = match self.attempt(request, proxy.as_deref()).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::error!("fatal: {}: {}", request.url(), error);
                return Err(error);
            }
            tracing::warn!("({}/{}) attempts: {}: {}", attempt, max_attempts, request.url(), error);
            if attempt >= max_attempts {
                return Err(error);
            }

            self.recover(proxy.as_deref(), pinned.is_some(), &error).await?;
            sleep(self.backoff(attempt)).await;
        }
    }

    async fn attempt(&self, request: &SolverRequest, proxy: Option<&ProxyEndpoint>) -> FetchResult<String> {
        let slot = self.slot(proxy.map(ProxyEndpoint::name));
        let mut session = slot.lock().await;
        if session.is_none() {
            *session = Some(self.solver.create_session(proxy).await?);
        }
        self.solver.solve(request, session.as_deref()).await
    }

    fn slot(&self, proxy: Option<&str>) -> SessionSlot {
        self.sessions
            .entry(proxy.map(String::from))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    async fn drop_session(&self, proxy: Option<&str>) {
        let slot = self.slot(proxy);
        let mut session = slot.lock().await;
        if let Some(id) = session.take() {
            if let Err(e) = self.solver.destroy_session(&id).await {
                tracing::debug!("Failed to destroy session {}: {}", id, e);
            }
        }
    }

    /// Resets the session and gets a fresh exit: VPN restart or proxy rotation
    async fn recover(&self, proxy: Option<&ProxyEndpoint>, pinned: bool, cause: &FetchError) -> FetchResult<()> {
        self.drop_session(proxy.map(ProxyEndpoint::name)).await;

        let proxy = match proxy {
            Some(proxy) => proxy,
            None => return Ok(()),
        };

        if self.retry.recovery == RecoveryMode::Restart {
            if let Some(api) = proxy.api() {
                match api.restart(Duration::from_secs(self.retry.restart_timeout)).await {
                    Ok(()) => return Ok(()),
                    Err(e) => tracing::warn!("Restart of {} failed: {}", proxy.name(), e),
                }
            }
        }

        // Nowhere else to go, retry on the same exit
        if pinned || self.pool.len() <= 1 {
            return Ok(());
        }

        self.pool.mark_failed(proxy.name(), &cause.to_string());
        let next = self.pool.rotate().await?;
        tracing::info!("Switched from {} to {}", proxy.name(), next);
        Ok(())
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let base = self.retry.backoff_ms.saturating_mul(attempt as u64) as f64;
        if base == 0.0 {
            return Duration::ZERO;
        }
        let jitter = rand::rng().random_range(-JITTER_FACTOR..=JITTER_FACTOR);
        Duration::from_millis((base * (1.0 + jitter)) as u64)
    }

    /// Destroys every open solver session
    pub async fn close(&self) {
        let slots: Vec<(Option<String>, SessionSlot)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (proxy, slot) in slots {
            let mut session = slot.lock().await;
            if let Some(id) = session.take() {
                match self.solver.destroy_session(&id).await {
                    Ok(()) => tracing::debug!(
                        "Closed session {} ({})",
                        id,
                        proxy.as_deref().unwrap_or("direct")
                    ),
                    Err(e) => tracing::warn!("Failed to close session {}: {}", id, e),
                }
            }
        }
    }

    /// Number of open solver sessions
    pub async fn open_sessions(&self) -> usize {
        let slots: Vec<SessionSlot> = self.sessions.iter().map(|e| e.value().clone()).collect();
        let mut open = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                open += 1;
            }
        }
        open
    }
}
