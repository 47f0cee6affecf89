//! Batched metadata resolution for every entity touched by a traversal.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::graph::Entity;
use crate::store::EntityStore;
use crate::Result;

/// Resolved entities keyed by id, plus the ids the store no longer knows about.
#[derive(Debug, Default)]
pub struct ResolvedEntities {
    entities: HashMap<String, Arc<Entity>>,
    missing: BTreeSet<String>,
}

impl ResolvedEntities {
    pub fn get(&self, id: &str) -> Option<&Arc<Entity>> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn missing(&self) -> &BTreeSet<String> {
        &self.missing
    }
}

/// Resolves a whole traversal's entities in a single store round trip.
pub struct EntityResolver<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> EntityResolver<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    /// One batched read, regardless of how many ids are requested. Each entity is shared via
    /// `Arc` so every connection referencing it sees the same value.
    pub async fn resolve_batch(&self, ids: &BTreeSet<String>) -> Result<ResolvedEntities> {
        if ids.is_empty() {
            return Ok(ResolvedEntities::default());
        }

        let request: Vec<String> = ids.iter().cloned().collect();
        let fetched = self.store.fetch_entities(&request).await?;

        let mut entities = HashMap::with_capacity(fetched.len());
        for entity in fetched {
            if ids.contains(&entity.id) {
                entities.insert(entity.id.clone(), Arc::new(entity));
            }
        }
        let missing: BTreeSet<String> = ids
            .iter()
            .filter(|id| !entities.contains_key(id.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            log::warn!(
                "{} of {} entities could not be resolved and will be skipped",
                missing.len(),
                ids.len()
            );
        }

        Ok(ResolvedEntities { entities, missing })
    }
}
