//! Request context.
//!
//! Carries the caller/session facts that partition the cache: opaque state
//! flags (checked against the configured no-cache set) and an ordered map
//! of dimensions (locale, currency, channel, ...) that feed the context
//! hash.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;

/// Caller/session context for a cached load.
///
/// Dimensions use a `BTreeMap` so their serialization order is stable
/// across processes; the context hash is reproducible by construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    states: HashSet<String>,
    dimensions: BTreeMap<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a state flag (e.g. `"admin-preview"`).
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.states.insert(state.into());
        self
    }

    /// Attach a cache-partitioning dimension.
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    /// Returns true if any of the given states is present.
    pub fn has_any_state(&self, states: &[String]) -> bool {
        states.iter().any(|s| self.states.contains(s))
    }

    pub fn dimensions(&self) -> &BTreeMap<String, Value> {
        &self.dimensions
    }
}
