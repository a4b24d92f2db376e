//! # Run Index
//!
//! Append-only registry of the entities built during one seeding run.
//! It is created by the seeder for a single run, passed by reference to the
//! reference resolver, and dropped when the run ends. Nothing is shared
//! between runs.

use crate::class::ClassRef;
use crate::types::{Criteria, EntityRef};
use std::collections::BTreeMap;

/// Entities built so far in the current run, in creation order.
#[derive(Debug, Default)]
pub struct RunIndex {
    /// Creation order.
    entries: Vec<EntityRef>,
    /// Class path -> positions in `entries`.
    by_class: BTreeMap<String, Vec<usize>>,
    /// Document id (`"!id"`) -> entity.
    by_id: BTreeMap<String, EntityRef>,
}

impl RunIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built entity under its concrete class.
    ///
    /// Registering the same instance twice is a no-op.
    pub fn register(&mut self, entity: EntityRef) {
        if self.contains(&entity) {
            return;
        }
        self.by_class
            .entry(entity.class_path())
            .or_default()
            .push(self.entries.len());
        self.entries.push(entity);
    }

    /// Name a registered entity for id references. A later entity with the
    /// same id replaces the earlier one.
    pub fn register_id(&mut self, id: impl Into<String>, entity: &EntityRef) {
        self.by_id.insert(id.into(), entity.clone());
    }

    /// The entity registered under `id`, if any.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<EntityRef> {
        self.by_id.get(id).cloned()
    }

    /// Registered entities of `class` whose attributes match every criterion.
    #[must_use]
    pub fn matching(&self, class: &ClassRef, criteria: &Criteria) -> Vec<EntityRef> {
        self.by_class
            .get(&class.path())
            .map(|positions| {
                positions
                    .iter()
                    .map(|&i| &self.entries[i])
                    .filter(|entity| entity.matches(criteria))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when this exact instance is registered.
    #[must_use]
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.by_class
            .get(&entity.class_path())
            .is_some_and(|positions| positions.iter().any(|&i| self.entries[i].ptr_eq(entity)))
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered entities in creation order.
    #[must_use]
    pub fn into_entities(self) -> Vec<EntityRef> {
        self.entries
    }
}
