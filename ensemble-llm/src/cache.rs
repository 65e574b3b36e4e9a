//! Response cache, partitioned per credential.
//!
//! ```text
//! partition key = hex(SHA-256(identity))
//! entry key     = hex(SHA-256(len(identity) ‖ identity ‖ len(prompt) ‖ prompt))
//!
//! outer LRU: partition key ──▶ inner LRU: entry key ──▶ (response, inserted_at)
//! ```
//!
//! Raw identities and prompts are never stored as keys. Both levels are
//! bounded; entries older than the TTL are treated as misses and dropped.

use std::num::NonZeroUsize;
use std::time::Duration;

use ensemble_core::config::InferenceConfig;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

/// Cache sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries per credential partition. 0 disables caching.
    pub capacity: usize,
    /// How long an entry stays valid. `None` keeps entries until evicted.
    pub ttl: Option<Duration>,
    /// Credential partitions kept at once.
    pub max_partitions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            ttl: Some(Duration::from_secs(600)),
            max_partitions: 16,
        }
    }
}

impl From<&InferenceConfig> for CacheConfig {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            capacity: config.cache_capacity,
            ttl: (config.cache_ttl_secs > 0).then(|| Duration::from_secs(config.cache_ttl_secs)),
            max_partitions: config.cache_partitions,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    response: String,
    inserted_at: Instant,
}

type Partition = LruCache<String, CacheEntry>;

/// Bounded, credential-partitioned LRU of model replies.
#[derive(Debug)]
pub struct InferenceCache {
    partitions: Option<Mutex<LruCache<String, Partition>>>,
    entry_capacity: NonZeroUsize,
    ttl: Option<Duration>,
}

impl InferenceCache {
    /// Create a cache. A zero `capacity` or `max_partitions` yields a cache
    /// that stores nothing.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let outer = NonZeroUsize::new(config.max_partitions);
        let inner = NonZeroUsize::new(config.capacity);
        match (outer, inner) {
            (Some(outer), Some(inner)) => Self {
                partitions: Some(Mutex::new(LruCache::new(outer))),
                entry_capacity: inner,
                ttl: config.ttl,
            },
            _ => Self {
                partitions: None,
                entry_capacity: NonZeroUsize::MIN,
                ttl: config.ttl,
            },
        }
    }

    /// Whether the cache stores anything at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.partitions.is_some()
    }

    /// Look up a reply. Expired entries are removed and reported as misses.
    #[must_use]
    pub fn get(&self, identity: &str, prompt: &str) -> Option<String> {
        let partitions = self.partitions.as_ref()?;
        let mut partitions = partitions.lock();
        let partition = partitions.get_mut(&partition_key(identity))?;
        let key = cache_key(identity, prompt);

        let expired = match partition.get(&key) {
            None => return None,
            Some(entry) => self.ttl.is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl),
        };
        if expired {
            partition.pop(&key);
            debug!(partition = %short(&partition_key(identity)), "cache entry expired");
            return None;
        }
        partition.get(&key).map(|entry| entry.response.clone())
    }

    /// Store a reply, evicting the least recently used entry or partition
    /// when full.
    pub fn insert(&self, identity: &str, prompt: &str, response: impl Into<String>) {
        let Some(partitions) = self.partitions.as_ref() else {
            return;
        };
        let pkey = partition_key(identity);
        let mut partitions = partitions.lock();
        if !partitions.contains(&pkey) {
            if let Some((evicted, _)) = partitions.push(pkey.clone(), LruCache::new(self.entry_capacity)) {
                debug!(partition = %short(&evicted), "cache partition evicted");
            }
        }
        if let Some(partition) = partitions.get_mut(&pkey) {
            partition.put(
                cache_key(identity, prompt),
                CacheEntry {
                    response: response.into(),
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drop every entry for one credential. Returns how many were removed.
    pub fn invalidate(&self, identity: &str) -> usize {
        self.partitions
            .as_ref()
            .and_then(|p| p.lock().pop(&partition_key(identity)))
            .map_or(0, |partition| partition.len())
    }

    /// Drop everything.
    pub fn clear(&self) {
        if let Some(partitions) = self.partitions.as_ref() {
            partitions.lock().clear();
        }
    }

    /// Entries across all partitions, expired ones included until touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions
            .as_ref()
            .map_or(0, |p| p.lock().iter().map(|(_, partition)| partition.len()).sum())
    }

    /// Whether no entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live credential partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.as_ref().map_or(0, |p| p.lock().len())
    }
}

/// Hex SHA-256 of a credential identity.
#[must_use]
pub fn partition_key(identity: &str) -> String {
    hex::encode(Sha256::digest(identity.as_bytes()))
}

/// Hex SHA-256 over the length-framed identity and prompt.
#[must_use]
pub fn cache_key(identity: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [identity, prompt] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// First 12 hex digits, for logs.
pub(crate) fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}
