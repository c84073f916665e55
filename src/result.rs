//! Result sets and their identity-keyed combination.
//!
//! Every entity returned by the remote store carries an `id` key (the engine
//! injects `id` into the select list if the caller left it out) and identity
//! is the sole key used when combining partial results: AND intersects by id,
//! OR unions with first-seen deduplication. Order stays deterministic, always
//! anchored on the first child of the combined node.

use std::collections::HashSet;
use std::hash::BuildHasherDefault;

use seahash::SeaHasher;
use serde_json::{Map, Value};
use tracing::trace;

/// A single entity as returned by the remote store.
pub type Entity = Map<String, Value>;

/// Fast default hasher for identity sets.
pub type IdHasher = BuildHasherDefault<SeaHasher>;

/// An ordered list of entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entities: Vec<Entity>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self { entities: Vec::new() }
    }

    pub fn from_entities(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }

    /// AND combination: keep the entities of the first set whose id appears
    /// in every other set, preserving the first set's order.
    pub fn intersect(mut sets: Vec<ResultSet>) -> ResultSet {
        if sets.len() <= 1 {
            return sets.pop().unwrap_or_default();
        }
        let anchor = sets.remove(0);
        let others: Vec<HashSet<String, IdHasher>> =
            sets.iter().map(|s| s.id_set()).collect();
        let mut result = ResultSet::new();
        for entity in anchor.entities {
            let Some(id) = identity(&entity) else { continue };
            if others.iter().all(|ids| ids.contains(&id)) {
                result.push(entity);
            } else {
                trace!(%id, "dropped by intersection");
            }
        }
        result
    }

    /// OR combination: all entities without duplicates, first-seen order.
    pub fn union(sets: Vec<ResultSet>) -> ResultSet {
        let mut sets = sets.into_iter();
        let Some(first) = sets.next() else { return ResultSet::new() };
        let mut seen: HashSet<String, IdHasher> = first.id_set();
        let mut result = first;
        for other in sets {
            for entity in other.entities {
                match identity(&entity) {
                    Some(id) if seen.contains(&id) => {
                        trace!(%id, "duplicate skipped");
                    }
                    Some(id) => {
                        seen.insert(id);
                        result.push(entity);
                    }
                    // no identity to deduplicate on; keep the entity
                    None => result.push(entity),
                }
            }
        }
        result
    }

    fn id_set(&self) -> HashSet<String, IdHasher> {
        self.entities.iter().filter_map(identity).collect()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;
    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;
    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

/// The identity key of an entity, rendered to a comparable string. Ids may be
/// JSON strings or numbers depending on the entity type.
fn identity(entity: &Entity) -> Option<String> {
    entity.get("id").map(|id| match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
