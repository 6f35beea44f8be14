//! Composable cache layers.
//!
//! An outer cached route that reads through an inner cached route must
//! inherit the inner layer's invalidation tags, on inner misses and inner
//! hits alike, without static knowledge of what the inner layer reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strato::{
    CacheConfig, CacheError, CachedRoute, MemoryStore, RequestContext, Route, Tag, trace,
};

#[derive(Debug, Clone, Serialize)]
struct Criteria {
    country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CountryInfo {
    name: String,
    vat_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CheckoutPage {
    country: CountryInfo,
    heading: String,
}

/// Innermost data source. Records the entity tag it reads.
struct CountryRoute {
    calls: AtomicUsize,
}

#[async_trait]
impl Route for CountryRoute {
    type Criteria = Criteria;
    type Response = CountryInfo;

    fn name(&self) -> &'static str {
        "country-route"
    }

    async fn load(
        &self,
        _context: &RequestContext,
        criteria: &Self::Criteria,
    ) -> Result<Self::Response, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace::record(Tag::from(format!("country-entity-{}", criteria.country)));
        Ok(CountryInfo {
            name: criteria.country.clone(),
            vat_rate: 19,
        })
    }
}

/// Outer route composing over the cached country route.
struct CheckoutRoute {
    country: Arc<CachedRoute<CountryRoute, MemoryStore>>,
    calls: AtomicUsize,
}

#[async_trait]
impl Route for CheckoutRoute {
    type Criteria = Criteria;
    type Response = CheckoutPage;

    fn name(&self) -> &'static str {
        "checkout-route"
    }

    async fn load(
        &self,
        context: &RequestContext,
        criteria: &Self::Criteria,
    ) -> Result<Self::Response, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let country = self.country.load(context, criteria).await?;
        Ok(CheckoutPage {
            heading: format!("Checkout ({})", country.name),
            country,
        })
    }
}

fn layered() -> (
    Arc<CountryRoute>,
    Arc<CheckoutRoute>,
    Arc<MemoryStore>,
    CachedRoute<CheckoutRoute, MemoryStore>,
) {
    let store = Arc::new(MemoryStore::new(&CacheConfig::default()));
    let country = Arc::new(CountryRoute {
        calls: AtomicUsize::new(0),
    });
    let cached_country = Arc::new(CachedRoute::new(
        country.clone(),
        store.clone(),
        CacheConfig::default(),
    ));
    let checkout = Arc::new(CheckoutRoute {
        country: cached_country,
        calls: AtomicUsize::new(0),
    });
    let cached_checkout = CachedRoute::new(checkout.clone(), store.clone(), CacheConfig::default());
    (country, checkout, store, cached_checkout)
}

fn criteria() -> Criteria {
    Criteria {
        country: "DE".to_string(),
    }
}

#[tokio::test]
async fn outer_entry_inherits_inner_tags_on_inner_miss() {
    let (_, _, store, cached_checkout) = layered();

    cached_checkout
        .load(&RequestContext::new(), &criteria())
        .await
        .expect("load");

    let outer_keys = store.registry().keys_for_tag(&Tag::from("checkout-route"));
    assert_eq!(outer_keys.len(), 1);
    let outer_tags = store
        .registry()
        .tags_for_key(outer_keys.iter().next().expect("key"));
    assert!(outer_tags.contains("country-entity-DE"));
    assert!(outer_tags.contains("country-route"), "inner route tag propagates too");
}

#[tokio::test]
async fn outer_entry_inherits_inner_tags_on_inner_hit() {
    let (country, _, store, cached_checkout) = layered();

    // Warm the inner layer only, then flush the outer layer's entry.
    cached_checkout
        .load(&RequestContext::new(), &criteria())
        .await
        .expect("load");
    cached_checkout
        .invalidate(&Tag::from("checkout-route"))
        .await
        .expect("invalidate outer");
    assert_eq!(country.calls.load(Ordering::SeqCst), 1);

    // Repopulating the outer entry hits the inner cache; the inner entry's
    // stored tags must still reach the new outer entry.
    cached_checkout
        .load(&RequestContext::new(), &criteria())
        .await
        .expect("load");
    assert_eq!(country.calls.load(Ordering::SeqCst), 1, "inner layer was a hit");

    let outer_keys = store.registry().keys_for_tag(&Tag::from("checkout-route"));
    let outer_tags = store
        .registry()
        .tags_for_key(outer_keys.iter().next().expect("key"));
    assert!(outer_tags.contains("country-entity-DE"));
}

#[tokio::test]
async fn invalidating_the_inner_entity_refreshes_both_layers() {
    let (country, checkout, store, cached_checkout) = layered();

    let ctx = RequestContext::new();
    let first = cached_checkout.load(&ctx, &criteria()).await.expect("load");
    cached_checkout.load(&ctx, &criteria()).await.expect("load");
    assert_eq!(checkout.calls.load(Ordering::SeqCst), 1);
    assert_eq!(country.calls.load(Ordering::SeqCst), 1);

    // The entity changed; both layers' entries were written with its tag.
    let removed = cached_checkout
        .invalidate(&Tag::from("country-entity-DE"))
        .await
        .expect("invalidate");
    assert_eq!(removed, 2, "inner and outer entries share the entity tag");
    assert!(store.is_empty());

    let second = cached_checkout.load(&ctx, &criteria()).await.expect("load");
    assert_eq!(checkout.calls.load(Ordering::SeqCst), 2);
    assert_eq!(country.calls.load(Ordering::SeqCst), 2);
    assert_eq!(first, second);
}
