//! Per-artifact lazy values.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::{Artifact, ArtifactId};
use crate::lazy::LazyValue;

pub type ArtifactValue = LazyValue<Artifact>;

/// Every known artifact's [`LazyValue`].
///
/// A value is created the first time its artifact is discovered and then only
/// invalidated and republished. Entries of removed sources are dropped; readers
/// already holding the `Arc` keep a valid value.
#[derive(Default)]
pub struct ArtifactStore {
    values: RwLock<FxHashMap<ArtifactId, Arc<ArtifactValue>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ArtifactId) -> Option<Arc<ArtifactValue>> {
        self.values.read().get(id).cloned()
    }

    pub fn get_or_create(&self, id: &ArtifactId) -> Arc<ArtifactValue> {
        if let Some(value) = self.get(id) {
            return value;
        }
        let mut values = self.values.write();
        Arc::clone(values.entry(id.clone()).or_default())
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.values.read().contains_key(id)
    }

    pub fn remove(&self, id: &ArtifactId) -> Option<Arc<ArtifactValue>> {
        self.values.write().remove(id)
    }

    /// Known artifact ids, in stage order.
    pub fn ids(&self) -> Vec<ArtifactId> {
        let mut ids: Vec<_> = self.values.read().keys().cloned().collect();
        ids.sort();
        ids.sort_by_key(ArtifactId::stage);
        ids
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
