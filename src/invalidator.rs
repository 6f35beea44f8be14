//! Deferred tag invalidation.
//!
//! Mutation pathways can invalidate tags immediately or defer them into a
//! FIFO queue flushed in batches, keeping latency-sensitive write paths off
//! the invalidation critical path. Deferred tags are deduplicated per
//! flush; a tag queued twice removes its entries once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics::counter;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::StoreError;
use crate::lock::mutex_guard;
use crate::store::TaggedStore;
use crate::tag::Tag;

const SOURCE: &str = "invalidator";

const METRIC_DEFERRED: &str = "strato_cache_deferred_tags_total";
const METRIC_FLUSHED: &str = "strato_cache_flushed_tags_total";

/// Monotonic ordering number assigned per deferred tag.
pub type Epoch = u64;

/// A tag waiting in the deferred queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvalidation {
    pub epoch: Epoch,
    pub tag: Tag,
}

/// Immediate and deferred tag invalidation over a [`TaggedStore`].
pub struct Invalidator<S> {
    store: Arc<S>,
    queue: Mutex<VecDeque<PendingInvalidation>>,
    epoch_counter: AtomicU64,
    flush_batch_limit: usize,
}

impl<S: TaggedStore> Invalidator<S> {
    pub fn new(store: Arc<S>, config: &CacheConfig) -> Self {
        Self {
            store,
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            flush_batch_limit: config.flush_batch_limit.max(1),
        }
    }

    /// Invalidate tags right away. Returns the number of entries removed.
    ///
    /// No stale entry survives past this call returning.
    pub async fn invalidate_now(&self, tags: &[Tag]) -> Result<usize, StoreError> {
        let mut removed = 0;
        for tag in tags {
            removed += self.store.invalidate(tag).await?;
        }
        counter!(METRIC_FLUSHED).increment(tags.len() as u64);
        Ok(removed)
    }

    /// Queue a tag for the next flush. Returns its epoch.
    pub fn defer(&self, tag: Tag) -> Epoch {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::SeqCst);

        info!(tag = %tag, epoch, "Cache invalidation deferred");
        counter!(METRIC_DEFERRED).increment(1);

        mutex_guard(&self.queue, SOURCE, "defer")
            .push_back(PendingInvalidation { epoch, tag });
        epoch
    }

    /// Apply one batch of deferred invalidations in FIFO order.
    ///
    /// Returns the number of entries removed. Duplicate tags within the
    /// batch are applied once.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let batch: Vec<PendingInvalidation> = {
            let mut queue = mutex_guard(&self.queue, SOURCE, "flush");
            let count = self.flush_batch_limit.min(queue.len());
            queue.drain(..count).collect()
        };

        if batch.is_empty() {
            return Ok(0);
        }

        let mut seen: Vec<&Tag> = Vec::with_capacity(batch.len());
        let mut removed = 0;
        for pending in &batch {
            if seen.contains(&&pending.tag) {
                continue;
            }
            seen.push(&pending.tag);
            removed += self.store.invalidate(&pending.tag).await?;
        }

        info!(
            batch_size = batch.len(),
            distinct = seen.len(),
            removed,
            "Deferred cache invalidations flushed"
        );
        counter!(METRIC_FLUSHED).increment(seen.len() as u64);
        Ok(removed)
    }

    pub fn pending(&self) -> usize {
        mutex_guard(&self.queue, SOURCE, "pending").len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}
