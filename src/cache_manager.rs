/// TTL Cache
/// Process-local key -> value store with a fixed per-entry time to live,
/// lazy purge on read and a periodic background sweep.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// One stored value. Never mutated; `set` replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: V,
    pub stored_at: Instant,
    pub expires_at: Instant,
    /// Wall-clock time of `stored_at`, for reporting to callers.
    pub cached_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    /// How long ago the entry was stored.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }
}

/// Result of a non-purging read.
#[derive(Debug, Clone)]
pub enum Lookup<V> {
    Fresh(CacheEntry<V>),
    Stale(CacheEntry<V>),
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub ttl_seconds: u64,
}

pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Build the key for a search. The term is lower-cased so searches that
    /// only differ in letter case share an entry.
    pub fn make_key(namespace: &str, search_term: &str, limit: u32) -> String {
        format!("{}:{}:{}", namespace, search_term.to_lowercase(), limit)
    }

    /// Get a live entry. Expired entries are removed, not just skipped.
    pub async fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have replaced the entry in between.
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            debug!("Cache entry expired on read: {}", key);
        }
        None
    }

    /// Read without purging, reporting whether the entry is still fresh.
    pub async fn lookup(&self, key: &str) -> Lookup<V> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => Lookup::Stale(entry.clone()),
            Some(entry) => Lookup::Fresh(entry.clone()),
            None => Lookup::Miss,
        }
    }

    pub async fn set(&self, key: impl Into<String>, payload: V) -> CacheEntry<V> {
        let now = Instant::now();
        let entry = CacheEntry {
            payload,
            stored_at: now,
            expires_at: now + self.ttl,
            cached_at: Utc::now(),
        };
        self.entries.write().await.insert(key.into(), entry.clone());
        entry
    }

    /// Remove every expired entry and return how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let expired = entries.values().filter(|e| e.is_expired(now)).count();

        CacheStats {
            total: entries.len(),
            active: entries.len() - expired,
            expired,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Run `sweep` on a fixed interval, independent of request traffic.
pub fn start_cleanup_task<V>(
    name: &'static str,
    cache: Arc<TtlCache<V>>,
    every: Duration,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        loop {
            ticker.tick().await;
            let removed = cache.sweep().await;
            if removed > 0 {
                info!("Cache cleanup ({}): removed {} expired entries", name, removed);
            }
        }
    })
}
