//! Disk cache for fetched pages
//!
//! Entries live in a flat directory as `<YYYY-MM-DD>_<sanitized url>_<digest>`.
//! Opening the cache drops entries from previous days.

use chrono::Local;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::FetchResult;

/// Longest readable part of a key
const MAX_READABLE_LEN: usize = 160;
/// Digest bytes appended to every key
const DIGEST_BYTES: usize = 8;

type KeyLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    prefix: String,
    locks: KeyLocks,
}

/// Exclusive access to one cache key, released on drop
pub struct CacheLock {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: KeyLocks,
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        self.guard.take();
        // Prune the entry unless another task is waiting on it
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl DiskCache {
    /// Opens (creating if needed) the cache under `dir` for today
    pub async fn open(dir: impl AsRef<Path>) -> FetchResult<Self> {
        let prefix = Local::now().date_naive().to_string();
        Self::open_with_prefix(dir, &prefix).await
    }

    pub async fn open_with_prefix(dir: impl AsRef<Path>, prefix: &str) -> FetchResult<Self> {
        let cache = Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            locks: Arc::new(DashMap::new()),
        };
        fs::create_dir_all(&cache.dir).await?;
        let removed = cache.evict_stale().await?;
        if removed > 0 {
            tracing::info!("Removed {} stale cache entries from {:?}", removed, cache.dir);
        }
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn evict_stale(&self) -> FetchResult<usize> {
        let current = format!("{}_", self.prefix);
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&current) {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// File name component for a URL: readable prefix plus a digest of the full URL
    pub fn key_for(url: &str) -> String {
        let flattened = url.replace(':', "").replace("//", "/").replace('/', "_");
        let mut readable: String = flattened
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' | '=' | '&' | '+' => c,
                _ => '_',
            })
            .collect();
        // Only ASCII is left, byte truncation is safe
        readable.truncate(MAX_READABLE_LEN);

        let digest = Sha256::digest(url.as_bytes());
        let suffix: String = digest[..DIGEST_BYTES].iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}_{}", readable, suffix)
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}_{}", self.prefix, Self::key_for(url)))
    }

    pub async fn get(&self, url: &str) -> FetchResult<Option<Vec<u8>>> {
        let path = self.path_for(url);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn insert(&self, url: &str, data: &[u8]) -> FetchResult<()> {
        let path = self.path_for(url);
        // Readers never observe a partially written entry
        let tmp = self.dir.join(format!(".tmp-{:08x}", rand::random::<u32>()));
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!("Cached {} at {:?}", url, path);
        Ok(())
    }

    pub async fn remove(&self, url: &str) -> FetchResult<bool> {
        match fs::remove_file(self.path_for(url)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Waits for exclusive access to the entry for `url`
    pub async fn lock(&self, url: &str) -> CacheLock {
        let key = Self::key_for(url);
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = mutex.lock_owned().await;
        CacheLock {
            key,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Number of keys currently locked or awaited
    pub fn pending_locks(&self) -> usize {
        self.locks.len()
    }
}
