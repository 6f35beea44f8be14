//! Extension points.
//!
//! Two synchronous mutation hook lists replace the source platform's
//! dispatched cache events: one over the key-derivation parts, one over the
//! final tag set. Hooks run in registration order and mutate the passed
//! structure in place; the decorator proceeds from the post-mutation state.

use crate::context::RequestContext;
use crate::key::KeyParts;
use crate::tag::TagSet;

/// Mutates the key parts before the cache key is finalized.
pub type KeyHook<C> = Box<dyn Fn(&mut KeyParts, &RequestContext, &C) + Send + Sync>;

/// Mutates the tag set before the entry is committed.
pub type TagHook<C> = Box<dyn Fn(&mut TagSet, &RequestContext, &C) + Send + Sync>;

/// Registered extension hooks for one cached route.
pub struct CacheHooks<C> {
    key_hooks: Vec<KeyHook<C>>,
    tag_hooks: Vec<TagHook<C>>,
}

impl<C> Default for CacheHooks<C> {
    fn default() -> Self {
        Self {
            key_hooks: Vec::new(),
            tag_hooks: Vec::new(),
        }
    }
}

impl<C> CacheHooks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key-parts hook. Hooks run in registration order.
    pub fn on_key(mut self, hook: impl Fn(&mut KeyParts, &RequestContext, &C) + Send + Sync + 'static) -> Self {
        self.key_hooks.push(Box::new(hook));
        self
    }

    /// Register a tag-set hook. Hooks run in registration order.
    pub fn on_tags(mut self, hook: impl Fn(&mut TagSet, &RequestContext, &C) + Send + Sync + 'static) -> Self {
        self.tag_hooks.push(Box::new(hook));
        self
    }

    pub(crate) fn apply_key_hooks(&self, parts: &mut KeyParts, context: &RequestContext, criteria: &C) {
        for hook in &self.key_hooks {
            hook(parts, context, criteria);
        }
    }

    pub(crate) fn apply_tag_hooks(&self, tags: &mut TagSet, context: &RequestContext, criteria: &C) {
        for hook in &self.tag_hooks {
            hook(tags, context, criteria);
        }
    }
}
