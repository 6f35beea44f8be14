//! Bidirectional tag registry.
//!
//! Tracks tag -> keys and key -> tags mappings for the in-memory store,
//! so invalidating a tag finds every affected entry and evicting an entry
//! cleans up its tag mappings.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::lock::{read_guard, write_guard};
use crate::tag::{Tag, TagSet};

const SOURCE: &str = "registry";

/// Tag <-> cache key index backing tag-based invalidation.
#[derive(Default)]
pub struct TagRegistry {
    tag_to_keys: RwLock<HashMap<Tag, HashSet<String>>>,
    key_to_tags: RwLock<HashMap<String, TagSet>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache key with the tags it was written under.
    ///
    /// Replaces any previous registration for the key.
    pub fn register(&self, key: &str, tags: TagSet) {
        self.forget_key(key);

        let mut t2k = write_guard(&self.tag_to_keys, SOURCE, "register.tag_to_keys");
        let mut k2t = write_guard(&self.key_to_tags, SOURCE, "register.key_to_tags");

        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(key.to_string());
        }
        k2t.insert(key.to_string(), tags);
    }

    /// All keys registered under a tag.
    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<String> {
        read_guard(&self.tag_to_keys, SOURCE, "keys_for_tag")
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// The tags a key was registered under.
    pub fn tags_for_key(&self, key: &str) -> TagSet {
        read_guard(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a key and clean up its tag mappings.
    ///
    /// Called when an entry is evicted, replaced, or invalidated.
    pub fn forget_key(&self, key: &str) {
        let mut t2k = write_guard(&self.tag_to_keys, SOURCE, "forget_key.tag_to_keys");
        let mut k2t = write_guard(&self.key_to_tags, SOURCE, "forget_key.key_to_tags");

        if let Some(tags) = k2t.remove(key) {
            for tag in tags {
                if let Some(keys) = t2k.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        t2k.remove(&tag);
                    }
                }
            }
        }
    }

    /// Remove a tag and every mapping for it, returning the affected keys.
    pub fn take_tag(&self, tag: &Tag) -> HashSet<String> {
        let affected = {
            let mut t2k = write_guard(&self.tag_to_keys, SOURCE, "take_tag.tag_to_keys");
            t2k.remove(tag).unwrap_or_default()
        };

        let mut k2t = write_guard(&self.key_to_tags, SOURCE, "take_tag.key_to_tags");
        for key in &affected {
            k2t.remove(key);
        }

        // Affected keys may have carried other tags; drop those reverse
        // mappings as well so no dangling key survives under another tag.
        let mut t2k = write_guard(&self.tag_to_keys, SOURCE, "take_tag.cleanup");
        t2k.retain(|_, keys| {
            for key in &affected {
                keys.remove(key);
            }
            !keys.is_empty()
        });

        affected
    }

    pub fn clear(&self) {
        write_guard(&self.tag_to_keys, SOURCE, "clear.tag_to_keys").clear();
        write_guard(&self.key_to_tags, SOURCE, "clear.key_to_tags").clear();
    }

    pub fn tag_count(&self) -> usize {
        read_guard(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        read_guard(&self.key_to_tags, SOURCE, "key_count").len()
    }
}
