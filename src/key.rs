//! Cache key derivation.
//!
//! A key is `{route-name}-{hex(sha256(json(parts)))}` where the parts start
//! as `[criteria_hash, context_hash]` and may be extended or rewritten by
//! key hooks before finalization. Element order contributes to the digest,
//! so callers must produce parts in a stable, reproducible order.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::context::RequestContext;
use crate::error::CodecError;

/// Mutable key-derivation parts, the state a key hook operates on.
///
/// The final key is derived from the post-mutation state, not the original
/// inputs, so hooks can widen or narrow cache partitioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts(Vec<Value>);

impl KeyParts {
    /// Seed the parts with the criteria and context hashes, in that order.
    pub fn seed(criteria_hash: String, context_hash: String) -> Self {
        Self(vec![
            Value::String(criteria_hash),
            Value::String(context_hash),
        ])
    }

    /// Append a partitioning dimension (e.g. a locale).
    pub fn push(&mut self, value: impl Into<Value>) {
        self.0.push(value.into());
    }

    /// Replace the parts wholesale.
    pub fn replace(&mut self, parts: Vec<Value>) {
        self.0 = parts;
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Hex SHA-256 over the serde_json serialization of any serializable value.
///
/// Struct field order and `BTreeMap` iteration order are stable, which makes
/// the digest reproducible across processes and restarts.
pub fn hash_criteria<C: Serialize>(criteria: &C) -> Result<String, CodecError> {
    let encoded = serde_json::to_vec(criteria).map_err(CodecError::Serialize)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

/// Hash the context's partitioning dimensions.
pub fn hash_context(context: &RequestContext) -> Result<String, CodecError> {
    let encoded = serde_json::to_vec(context.dimensions()).map_err(CodecError::Serialize)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

/// Derive the final cache key from a route name and finalized parts.
pub fn derive_key(name: &str, parts: &KeyParts) -> Result<String, CodecError> {
    let encoded = serde_json::to_vec(parts.as_slice()).map_err(CodecError::Serialize)?;
    Ok(format!("{name}-{}", hex::encode(Sha256::digest(&encoded))))
}
