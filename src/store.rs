//! Tagged store.
//!
//! The store is the external collaborator the decorator writes through:
//! key/value entries with tag sets, tag-based bulk invalidation, atomic at
//! single-key granularity. [`MemoryStore`] is the in-process backend with
//! LRU eviction; deployments with a shared backend implement
//! [`TaggedStore`] over it.

use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::StoreError;
use crate::lock::write_guard;
use crate::registry::TagRegistry;
use crate::tag::{Tag, TagSet};
use crate::trace;

const SOURCE: &str = "store";

/// A stored cache entry: payload plus the tags it was written under.
///
/// Immutable once written; replaced wholesale on the next miss for its key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub tags: TagSet,
}

/// Key/value store with tagged entries and tag-based bulk invalidation.
#[async_trait]
pub trait TaggedStore: Send + Sync {
    /// Fetch an entry. A hit records the entry's tags with any active
    /// dependency collector.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Store the full `(payload, tags)` pair under `key`, replacing any
    /// previous entry. Never leaves a partial entry behind.
    async fn put(&self, key: &str, payload: Bytes, tags: TagSet) -> Result<(), StoreError>;

    /// Remove every entry whose tag set contains `tag`. Returns the number
    /// of entries removed.
    async fn invalidate(&self, tag: &Tag) -> Result<usize, StoreError>;

    /// Drop every entry.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory tagged store with LRU eviction.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, CacheEntry>>,
    registry: TagRegistry,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.entry_limit_non_zero())),
            registry: TagRegistry::new(),
        }
    }

    pub fn len(&self) -> usize {
        write_guard(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tag index, exposed for diagnostics.
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }
}

#[async_trait]
impl TaggedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        // LruCache::get updates recency, so a write guard is required.
        let entry = write_guard(&self.entries, SOURCE, "get").get(key).cloned();

        if let Some(entry) = &entry {
            trace::record_all(&entry.tags);
        }
        Ok(entry)
    }

    async fn put(&self, key: &str, payload: Bytes, tags: TagSet) -> Result<(), StoreError> {
        let entry = CacheEntry {
            payload,
            tags: tags.clone(),
        };

        // Replace the previous registration before touching the LRU so the
        // registry never points at a payload that is about to disappear.
        self.registry.register(key, tags);

        let evicted = write_guard(&self.entries, SOURCE, "put").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                debug!(key = %evicted_key, "Cache entry evicted by LRU pressure");
                self.registry.forget_key(&evicted_key);
            }
        }
        Ok(())
    }

    async fn invalidate(&self, tag: &Tag) -> Result<usize, StoreError> {
        let affected = self.registry.take_tag(tag);

        let mut entries = write_guard(&self.entries, SOURCE, "invalidate");
        let mut removed = 0;
        for key in &affected {
            if entries.pop(key).is_some() {
                removed += 1;
            }
        }
        drop(entries);

        info!(tag = %tag, removed, "Cache tag invalidated");
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        write_guard(&self.entries, SOURCE, "clear").clear();
        self.registry.clear();
        Ok(())
    }
}
