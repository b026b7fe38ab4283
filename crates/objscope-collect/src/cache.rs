//! Pass-scoped normalization cache.
//!
//! Overlapping per-node directories report the same objects; normalizing a
//! topology once per `(object, csn)` avoids rebuilding identical trees for
//! every reporting node. The cache is an explicit object with a defined
//! lifetime: the collector invalidates it at the start of each pass, never
//! relying on implicit global state.

use dashmap::DashMap;
use uuid::Uuid;

use objscope_core::error::CoreResult;
use objscope_core::topology::{normalize_object, RawObject, StorageObject};

/// Memoizes normalized topologies for the duration of one pass.
#[derive(Debug, Default)]
pub struct PassCache {
    normalized: DashMap<(Uuid, u64), StorageObject>,
}

impl PassCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the normalized form of `raw`, building it on first sight of
    /// this `(object, csn)` pair.
    pub fn get_or_normalize(&self, raw: &RawObject) -> CoreResult<StorageObject> {
        let key = (raw.uuid, raw.csn);
        if let Some(hit) = self.normalized.get(&key) {
            return Ok(hit.value().clone());
        }
        let object = normalize_object(raw)?;
        self.normalized.insert(key, object.clone());
        Ok(object)
    }

    /// Number of cached topologies.
    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Drops every cached entry. Called between passes.
    pub fn invalidate(&self) {
        self.normalized.clear();
    }
}
