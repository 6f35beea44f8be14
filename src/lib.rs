//! Strato — read-through response cache with tag-based invalidation.
//!
//! Wraps a pure read operation (a [`Route`]) behind a tagged cache:
//!
//! - **Keys** are derived from a SHA-256 digest over the route name, the
//!   query criteria, and the caller context, with mutable key hooks for
//!   extra partitioning dimensions (locale, currency, ...).
//! - **Tags** attach invalidation scopes to every entry. Invalidating a tag
//!   removes every entry written with it. Each entry also carries the
//!   route's own tag, so a whole route can be flushed at once.
//! - **Tracing** records which tags nested cache reads touched while the
//!   wrapped operation ran, so an outer cache inherits the invalidation
//!   dependencies of the caches it composes over.
//! - **Storage** holds a compressed envelope of the serialized response.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via [`CacheConfig`]:
//!
//! ```toml
//! [cache]
//! enabled = true
//! no_cache_states = ["admin-preview"]
//! store_error_policy = "fail"
//! compression = true
//! # ... see config.rs for all options
//! ```

mod codec;
mod config;
mod context;
mod error;
mod hooks;
mod invalidator;
mod key;
mod lock;
mod registry;
mod route;
mod store;
mod tag;
pub mod trace;

pub use codec::{Envelope, ValueCodec};
pub use config::{CacheConfig, StoreErrorPolicy};
pub use context::RequestContext;
pub use error::{CacheError, CodecError, StoreError};
pub use hooks::{CacheHooks, KeyHook, TagHook};
pub use invalidator::{Epoch, Invalidator, PendingInvalidation};
pub use key::{KeyParts, derive_key, hash_context, hash_criteria};
pub use registry::TagRegistry;
pub use route::{CachedRoute, Route};
pub use store::{CacheEntry, MemoryStore, TaggedStore};
pub use tag::{Tag, TagSet};
pub use trace::CacheTracer;
