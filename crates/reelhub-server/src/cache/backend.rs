//! Key-value cache backend: an in-process map or a shared Redis instance.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A cached entry with TTL support.
///
/// The data is wrapped in `Arc` so a hit hands out the payload without
/// copying it.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Failures talking to Redis. Never leaves this module: every public
/// operation turns it into a miss, a skipped write or zero deletions.
#[derive(Debug, thiserror::Error)]
enum BackendError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("redis command error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("redis operation timed out after {0:?}")]
    Timeout(Duration),
}

async fn bounded<T, F>(op_timeout: Duration, op: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(op_timeout, op)
        .await
        .map_err(|_| BackendError::Timeout(op_timeout))?
}

/// Response cache storage.
///
/// ## Cache Modes
///
/// - **Local**: single instance, entries live in a DashMap with per-entry TTL
/// - **Redis**: entries live in Redis and are shared by every instance
///
/// Every key passed in is stored under the backend's namespace prefix
/// (`cache:` by default), so callers work with bare keys such as
/// `movies:list:1:10:default:asc`.
///
/// No operation returns an error. Backend failures and timeouts are logged
/// and reported as a miss, `false` or `0`.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local {
        entries: Arc<DashMap<String, CachedEntry>>,
        namespace: Arc<str>,
    },

    /// Multi-instance: Redis, every command bounded by `op_timeout`
    Redis {
        pool: Pool,
        namespace: Arc<str>,
        op_timeout: Duration,
    },
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local(namespace: &str) -> Self {
        CacheBackend::Local {
            entries: Arc::new(DashMap::new()),
            namespace: Arc::from(namespace),
        }
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(pool: Pool, namespace: &str, op_timeout: Duration) -> Self {
        CacheBackend::Redis {
            pool,
            namespace: Arc::from(namespace),
            op_timeout,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            CacheBackend::Local { namespace, .. } | CacheBackend::Redis { namespace, .. } => {
                namespace
            }
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace(), key)
    }

    /// Get a value from the cache. Expired, missing and unreadable entries
    /// are all `None`.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let full_key = self.namespaced(key);
        match self {
            CacheBackend::Local { entries, .. } => {
                let entry = entries.get(&full_key)?;
                if entry.is_expired() {
                    drop(entry);
                    entries.remove(&full_key);
                    return None;
                }
                Some(Arc::clone(&entry.data))
            }
            CacheBackend::Redis {
                pool, op_timeout, ..
            } => {
                let result = bounded(*op_timeout, async {
                    let mut conn = pool.get().await?;
                    let data: Option<Vec<u8>> = conn.get(&full_key).await?;
                    Ok::<_, BackendError>(data)
                })
                .await;

                match result {
                    Ok(data) => data.map(Arc::new),
                    Err(e) => {
                        tracing::warn!(key = %full_key, error = %e, "Redis GET failed, treating as miss");
                        None
                    }
                }
            }
        }
    }

    /// Store a value with a TTL. Returns `false` if the write did not happen.
    pub async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        let full_key = self.namespaced(key);
        match self {
            CacheBackend::Local { entries, .. } => {
                entries.insert(full_key, CachedEntry::new(value, ttl));
                true
            }
            CacheBackend::Redis {
                pool, op_timeout, ..
            } => {
                // SETEX rejects a zero expiry
                let ttl_secs = ttl.as_secs().max(1);
                let result = bounded(*op_timeout, async {
                    let mut conn = pool.get().await?;
                    conn.set_ex::<_, _, ()>(&full_key, value, ttl_secs).await?;
                    Ok::<_, BackendError>(())
                })
                .await;

                match result {
                    Ok(()) => {
                        tracing::debug!(key = %full_key, ttl_secs, "cache set");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(key = %full_key, error = %e, "Redis SETEX failed, skipping write");
                        false
                    }
                }
            }
        }
    }

    /// Delete every key matching a glob pattern (`*` and `?` wildcards).
    ///
    /// Matching keys are enumerated first and then removed in one batch.
    /// Returns the number of keys deleted; no match is `0`.
    pub async fn delete_by_pattern(&self, pattern: &str) -> usize {
        let full_pattern = self.namespaced(pattern);
        match self {
            CacheBackend::Local { entries, .. } => {
                let matcher = match glob_to_regex(&full_pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        tracing::warn!(pattern = %full_pattern, error = %e, "invalid cache key pattern");
                        return 0;
                    }
                };
                let matched: Vec<String> = entries
                    .iter()
                    .filter(|entry| matcher.is_match(entry.key()))
                    .map(|entry| entry.key().clone())
                    .collect();

                let deleted = matched
                    .iter()
                    .filter_map(|key| entries.remove(key))
                    .filter(|(_, entry)| !entry.is_expired())
                    .count();
                tracing::debug!(pattern = %full_pattern, deleted, "cache keys deleted (local)");
                deleted
            }
            CacheBackend::Redis {
                pool, op_timeout, ..
            } => {
                let result = bounded(*op_timeout, async {
                    let mut conn = pool.get().await?;
                    let keys: Vec<String> = conn.keys(&full_pattern).await?;
                    if keys.is_empty() {
                        return Ok::<_, BackendError>(0);
                    }
                    let deleted: usize = conn.del(&keys).await?;
                    Ok(deleted)
                })
                .await;

                match result {
                    Ok(deleted) => {
                        tracing::debug!(pattern = %full_pattern, deleted, "cache keys deleted (redis)");
                        deleted
                    }
                    Err(e) => {
                        tracing::warn!(pattern = %full_pattern, error = %e, "Redis pattern delete failed");
                        0
                    }
                }
            }
        }
    }

    /// Check if Redis is available (for health checks).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local { .. } => false,
            CacheBackend::Redis {
                pool, op_timeout, ..
            } => bounded(*op_timeout, async {
                pool.get().await?;
                Ok::<_, BackendError>(())
            })
            .await
            .is_ok(),
        }
    }

    /// Clean up expired entries.
    ///
    /// Local mode only; Redis expires keys itself. Returns the number of
    /// entries removed.
    pub fn cleanup_expired(&self) -> usize {
        match self {
            CacheBackend::Local { entries, .. } => sweep_expired(entries),
            CacheBackend::Redis { .. } => 0,
        }
    }

    /// Starts a background task that sweeps expired local entries every
    /// `interval`. The task ends once the backend is dropped. Redis mode
    /// needs no sweeper and returns `None`.
    pub fn spawn_cleanup(&self, interval: Duration) -> Option<JoinHandle<()>> {
        let CacheBackend::Local { entries, .. } = self else {
            return None;
        };
        let entries: Weak<DashMap<String, CachedEntry>> = Arc::downgrade(entries);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(map) = entries.upgrade() else {
                    break;
                };
                let removed = sweep_expired(&map);
                if removed > 0 {
                    tracing::debug!(removed, "expired cache entries swept");
                }
            }
        }))
    }

    /// Get cache statistics. Entry counts are only known in local mode.
    pub fn stats(&self) -> CacheStats {
        match self {
            CacheBackend::Local { entries, .. } => CacheStats {
                mode: "local",
                local_entries: Some(entries.len()),
            },
            CacheBackend::Redis { .. } => CacheStats {
                mode: "redis",
                local_entries: None,
            },
        }
    }
}

fn sweep_expired(entries: &DashMap<String, CachedEntry>) -> usize {
    let mut removed = 0;
    entries.retain(|_, entry| {
        if entry.is_expired() {
            removed += 1;
            false
        } else {
            true
        }
    });
    removed
}

/// Translates a Redis-style glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Cache statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_entries: Option<usize>,
}
