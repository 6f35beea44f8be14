//! Read-through cached route decorator.
//!
//! Wraps a [`Route`] behind a [`TaggedStore`]: hits decode the stored
//! envelope without touching the wrapped route, misses trace the wrapped
//! load, tag the result, and store it wholesale. A no-cache state on the
//! caller context forwards straight to the wrapped route.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use crate::codec::ValueCodec;
use crate::config::{CacheConfig, StoreErrorPolicy};
use crate::context::RequestContext;
use crate::error::CacheError;
use crate::hooks::CacheHooks;
use crate::key::{KeyParts, derive_key, hash_context, hash_criteria};
use crate::store::TaggedStore;
use crate::tag::Tag;
use crate::trace::{self, CacheTracer};

const METRIC_HIT: &str = "strato_cache_hit_total";
const METRIC_MISS: &str = "strato_cache_miss_total";
const METRIC_BYPASS: &str = "strato_cache_bypass_total";
const METRIC_LOAD_MS: &str = "strato_cache_load_ms";
const METRIC_INVALIDATED: &str = "strato_cache_invalidated_entries_total";

/// A deterministic, side-effect-free read operation.
///
/// `load` must be a pure read with respect to durable state; it may itself
/// read other caches, and those reads surface as traced tags.
#[async_trait]
pub trait Route: Send + Sync {
    type Criteria: Serialize + Send + Sync;
    type Response: Serialize + DeserializeOwned + Send + Sync;

    /// Stable route name. Prefixes every cache key and doubles as the
    /// route's global invalidation tag.
    fn name(&self) -> &'static str;

    async fn load(
        &self,
        context: &RequestContext,
        criteria: &Self::Criteria,
    ) -> Result<Self::Response, CacheError>;
}

enum Lookup<T> {
    Hit(T),
    Miss,
    /// Store unreachable and the configured policy is to bypass.
    StoreDown,
}

/// Read-through tagged cache decorator over a [`Route`].
pub struct CachedRoute<R: Route, S: TaggedStore> {
    inner: Arc<R>,
    store: Arc<S>,
    tracer: Arc<CacheTracer>,
    hooks: CacheHooks<R::Criteria>,
    codec: ValueCodec,
    config: CacheConfig,
    // Per-key gates collapsing concurrent misses into one upstream load.
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl<R: Route, S: TaggedStore> CachedRoute<R, S> {
    pub fn new(inner: Arc<R>, store: Arc<S>, config: CacheConfig) -> Self {
        Self {
            inner,
            store,
            tracer: Arc::new(CacheTracer::new()),
            hooks: CacheHooks::new(),
            codec: ValueCodec::from_config(&config),
            config,
            inflight: DashMap::new(),
        }
    }

    /// Replace the extension hooks.
    pub fn with_hooks(mut self, hooks: CacheHooks<R::Criteria>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Share a tracer with other cache layers.
    pub fn with_tracer(mut self, tracer: Arc<CacheTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// The wrapped route.
    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    pub fn tracer(&self) -> &Arc<CacheTracer> {
        &self.tracer
    }

    /// The tag present on every entry this decorator writes.
    pub fn all_tag(&self) -> Tag {
        Tag::from(self.inner.name())
    }

    /// Load through the cache.
    ///
    /// Bypasses silently when the context carries a configured no-cache
    /// state. Wrapped-route failures propagate unchanged and are never
    /// cached.
    #[instrument(skip_all, fields(route = self.inner.name()))]
    pub async fn load(
        &self,
        context: &RequestContext,
        criteria: &R::Criteria,
    ) -> Result<R::Response, CacheError> {
        if !self.config.enabled || context.has_any_state(&self.config.no_cache_states) {
            counter!(METRIC_BYPASS, "route" => self.inner.name()).increment(1);
            debug!(outcome = "bypass", "forwarding to wrapped route");
            return self.inner.load(context, criteria).await;
        }

        let started_at = Instant::now();
        let key = self.generate_key(context, criteria)?;

        match self.lookup(&key).await? {
            Lookup::Hit(value) => {
                counter!(METRIC_HIT, "route" => self.inner.name()).increment(1);
                debug!(outcome = "hit", "serving cached response");
                histogram!(METRIC_LOAD_MS, "route" => self.inner.name())
                    .record(started_at.elapsed().as_secs_f64() * 1000.0);
                return Ok(value);
            }
            Lookup::StoreDown => return self.inner.load(context, criteria).await,
            Lookup::Miss => {}
        }

        counter!(METRIC_MISS, "route" => self.inner.name()).increment(1);
        debug!(outcome = "miss", "loading from wrapped route");

        let result = self.populate(&key, context, criteria).await;
        self.inflight.remove(&key);

        histogram!(METRIC_LOAD_MS, "route" => self.inner.name())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Remove every stored entry written under `tag`.
    pub async fn invalidate(&self, tag: &Tag) -> Result<usize, CacheError> {
        let removed = self.store.invalidate(tag).await?;
        counter!(METRIC_INVALIDATED, "route" => self.inner.name()).increment(removed as u64);
        Ok(removed)
    }

    /// Flush every entry this decorator has written.
    pub async fn invalidate_all(&self) -> Result<usize, CacheError> {
        self.invalidate(&self.all_tag()).await
    }

    fn generate_key(
        &self,
        context: &RequestContext,
        criteria: &R::Criteria,
    ) -> Result<String, CacheError> {
        let mut parts = KeyParts::seed(hash_criteria(criteria)?, hash_context(context)?);
        self.hooks.apply_key_hooks(&mut parts, context, criteria);
        Ok(derive_key(self.inner.name(), &parts)?)
    }

    async fn lookup(&self, key: &str) -> Result<Lookup<R::Response>, CacheError> {
        match self.store.get(key).await {
            Ok(Some(entry)) => {
                let value = self.codec.decode(&entry.payload)?;
                Ok(Lookup::Hit(value))
            }
            Ok(None) => Ok(Lookup::Miss),
            Err(err) => match self.config.store_error_policy {
                StoreErrorPolicy::Fail => Err(err.into()),
                StoreErrorPolicy::Bypass => {
                    warn!(error = %err, "cache store unreachable, bypassing");
                    Ok(Lookup::StoreDown)
                }
            },
        }
    }

    async fn populate(
        &self,
        key: &str,
        context: &RequestContext,
        criteria: &R::Criteria,
    ) -> Result<R::Response, CacheError> {
        let gate = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        // A concurrent miss may have populated the key while we waited.
        match self.lookup(key).await? {
            Lookup::Hit(value) => {
                counter!(METRIC_HIT, "route" => self.inner.name()).increment(1);
                debug!(outcome = "hit", collapsed = true, "serving cached response");
                return Ok(value);
            }
            Lookup::StoreDown => return self.inner.load(context, criteria).await,
            Lookup::Miss => {}
        }

        let name = self.inner.name();
        let response = self
            .tracer
            .trace(name, self.inner.load(context, criteria))
            .await?;

        let mut tags = self.tracer.get(name);
        tags.insert(self.all_tag());
        self.hooks.apply_tag_hooks(&mut tags, context, criteria);
        tags.retain(|tag| !tag.as_str().is_empty());

        // Keep hit and miss symmetric for enclosing layers: a store hit
        // re-records the stored tags, so a fresh population must surface
        // the same set to any active outer collector.
        trace::record_all(&tags);

        let payload = self.codec.encode(&response)?;
        if let Err(err) = self.store.put(key, payload, tags).await {
            match self.config.store_error_policy {
                StoreErrorPolicy::Fail => return Err(err.into()),
                StoreErrorPolicy::Bypass => {
                    warn!(error = %err, "cache store write failed, serving uncached response");
                }
            }
        }

        Ok(response)
    }
}
