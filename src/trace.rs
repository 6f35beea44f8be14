//! Dependency tracer.
//!
//! Uses `tokio::task_local!` for zero-cost tag collection while a wrapped
//! operation runs. Nested cache reads call [`record`]; the tracer scopes a
//! collector around the operation and keeps the collected set addressable
//! by name. Collected tags are re-emitted into any enclosing collector, so
//! an outer cache inherits the invalidation dependencies of the inner
//! caches it composes over without static knowledge of what they read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::lock::mutex_guard;
use crate::tag::{Tag, TagSet};

const SOURCE: &str = "trace";

tokio::task_local! {
    static TOUCHED: RefCell<TagSet>;
}

/// Record a touched invalidation tag.
///
/// Called by cache-backed reads before returning data that affects the
/// response. If no collector is active, the call is silently ignored.
pub fn record(tag: Tag) {
    let _ = TOUCHED.try_with(|touched| {
        touched.borrow_mut().insert(tag);
    });
}

/// Record every tag in the given set.
pub fn record_all<'a>(tags: impl IntoIterator<Item = &'a Tag>) {
    let _ = TOUCHED.try_with(|touched| {
        let mut touched = touched.borrow_mut();
        for tag in tags {
            touched.insert(tag.clone());
        }
    });
}

/// Per-invocation tag collection with named results.
///
/// `trace` runs a future with a fresh collector and stores the collected
/// set under the given name; `get` retrieves the most recently recorded
/// set for that name.
#[derive(Default)]
pub struct CacheTracer {
    results: Mutex<HashMap<String, TagSet>>,
}

impl CacheTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while collecting every tag recorded during its execution.
    ///
    /// The collected set is stored under `name` and re-emitted into any
    /// enclosing collector once the inner scope ends.
    pub async fn trace<F, T>(&self, name: &str, f: F) -> T
    where
        F: Future<Output = T>,
    {
        let (result, touched) = TOUCHED
            .scope(RefCell::new(TagSet::new()), async move {
                let result = f.await;
                let touched = TOUCHED.with(|t| t.borrow().clone());
                (result, touched)
            })
            .await;

        // The inner scope has ended here, so this reaches the enclosing
        // collector when one is active.
        record_all(&touched);

        mutex_guard(&self.results, SOURCE, "trace").insert(name.to_string(), touched);
        result
    }

    /// Retrieve the most recently recorded set for `name`.
    ///
    /// Returns an empty set when nothing has been traced under that name.
    pub fn get(&self, name: &str) -> TagSet {
        mutex_guard(&self.results, SOURCE, "get")
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_without_collector_is_no_op() {
        record(Tag::from("orphan"));
        let tracer = CacheTracer::new();
        assert!(tracer.get("anything").is_empty());
    }

    #[tokio::test]
    async fn trace_captures_recorded_tags() {
        let tracer = CacheTracer::new();

        let value = tracer
            .trace("salutation-route", async {
                record(Tag::from("salutation-entity-42"));
                record(Tag::from("language-entity-7"));
                "response"
            })
            .await;

        assert_eq!(value, "response");
        let tags = tracer.get("salutation-route");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("salutation-entity-42"));
        assert!(tags.contains("language-entity-7"));
    }

    #[tokio::test]
    async fn trace_deduplicates() {
        let tracer = CacheTracer::new();

        tracer
            .trace("r", async {
                record(Tag::from("entity-1"));
                record(Tag::from("entity-1"));
            })
            .await;

        assert_eq!(tracer.get("r").len(), 1);
    }

    #[tokio::test]
    async fn nested_trace_propagates_to_outer_collector() {
        let inner_tracer = CacheTracer::new();
        let outer_tracer = CacheTracer::new();

        outer_tracer
            .trace("outer-route", async {
                record(Tag::from("outer-entity"));
                inner_tracer
                    .trace("inner-route", async {
                        record(Tag::from("inner-entity"));
                    })
                    .await;
            })
            .await;

        let inner = inner_tracer.get("inner-route");
        assert_eq!(inner.len(), 1);
        assert!(inner.contains("inner-entity"));

        // Outer inherits the inner dependency.
        let outer = outer_tracer.get("outer-route");
        assert_eq!(outer.len(), 2);
        assert!(outer.contains("outer-entity"));
        assert!(outer.contains("inner-entity"));
    }

    #[tokio::test]
    async fn get_returns_latest_result() {
        let tracer = CacheTracer::new();

        tracer
            .trace("r", async {
                record(Tag::from("first"));
            })
            .await;
        tracer
            .trace("r", async {
                record(Tag::from("second"));
            })
            .await;

        let tags = tracer.get("r");
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("second"));
    }
}
