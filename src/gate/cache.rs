//! Short-lived memo of routing decisions.
//!
//! Keys combine the normalised path with a SHA-256 fingerprint of the session
//! token, so two callers hitting the same path never share a decision.
//! Staleness is judged when an entry is read; nothing runs in the background.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::routing::RoutingDecision;

/// Identity of the token a request carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenFingerprint {
    Absent,
    Sha256([u8; 32]),
}

impl TokenFingerprint {
    pub fn of(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) if !raw.is_empty() => {
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&Sha256::digest(raw.as_bytes()));
                Self::Sha256(digest)
            }
            _ => Self::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    token: TokenFingerprint,
}

impl CacheKey {
    /// `path` must already be normalised.
    pub fn new(path: &str, raw_token: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            token: TokenFingerprint::of(raw_token),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: RoutingDecision,
    created_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_ms: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Storage for routing decisions.
///
/// Implementations must be safe to share between concurrent requests. Writes
/// are last-write-wins; a reader may observe a decision up to one TTL old.
pub trait DecisionCache: Send + Sync {
    /// A decision stored less than one TTL ago.
    fn get(&self, key: &CacheKey) -> Option<RoutingDecision>;

    /// Store `decision`, replacing whatever was there.
    fn put(&self, key: CacheKey, decision: RoutingDecision);

    fn stats(&self) -> CacheStats;
}

/// Process-local LRU with a fixed TTL.
pub struct InMemoryDecisionCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    capacity: NonZeroUsize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryDecisionCache {
    /// A capacity of zero is treated as one.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        // Entries are replaced whole, so a panic mid-update cannot leave one torn.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DecisionCache for InMemoryDecisionCache {
    fn get(&self, key: &CacheKey) -> Option<RoutingDecision> {
        let fresh = {
            let mut entries = self.lock();
            entries
                .get(key)
                .filter(|entry| entry.created_at.elapsed() < self.ttl)
                .map(|entry| entry.decision.clone())
        };
        let counter = if fresh.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        fresh
    }

    fn put(&self, key: CacheKey, decision: RoutingDecision) {
        let entry = CacheEntry {
            decision,
            created_at: Instant::now(),
        };
        self.lock().put(key, entry);
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.lock().len(),
            capacity: self.capacity.get(),
            ttl_ms: self.ttl.as_millis() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
