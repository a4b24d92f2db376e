//! In-memory entity store.

use super::{EntityStore, assign_primary_key};
use crate::class::{ClassRef, same_class};
use crate::types::{Criteria, EntityRef, FieldValue, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Entity store held entirely in memory.
///
/// Entities move through three states: staged (added), flushed (visible to
/// `find`, keys assigned), and persisted (committed).
#[derive(Debug, Default)]
pub struct MemoryStore {
    persisted: Vec<EntityRef>,
    flushed: Vec<EntityRef>,
    staged: Vec<EntityRef>,
    /// Class path -> last generated key.
    sequences: BTreeMap<String, u64>,
    committed_sequences: BTreeMap<String, u64>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose committed state already holds `entities`.
    #[must_use]
    pub fn with_persisted(entities: impl IntoIterator<Item = EntityRef>) -> Self {
        let mut store = Self::new();
        for entity in entities {
            if let Some(FieldValue::Literal(Value::Number(number))) = entity.primary_key() {
                if let Some(key) = number.as_u64() {
                    let last = store.sequences.entry(entity.class_path()).or_insert(0);
                    *last = (*last).max(key);
                }
            }
            store.persisted.push(entity);
        }
        store.committed_sequences = store.sequences.clone();
        store
    }

    /// Committed and flushed entities, in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.persisted.iter().chain(self.flushed.iter())
    }

    /// Number of entities visible to `find`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.persisted.len() + self.flushed.len()
    }

    /// True when nothing is visible to `find`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entities added but not yet flushed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    fn knows(&self, entity: &EntityRef) -> bool {
        self.entities()
            .chain(self.staged.iter())
            .any(|known| known.ptr_eq(entity))
    }
}

impl EntityStore for MemoryStore {
    fn add(&mut self, entity: &EntityRef) -> Result<()> {
        if !self.knows(entity) {
            self.staged.push(entity.clone());
        }
        Ok(())
    }

    fn find(&mut self, class: &ClassRef, criteria: &Criteria) -> Result<Vec<EntityRef>> {
        Ok(self
            .entities()
            .filter(|entity| same_class(entity.class(), class) && entity.matches(criteria))
            .cloned()
            .collect())
    }

    fn flush(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.staged).into_iter();
        while let Some(entity) = pending.next() {
            if let Err(e) = assign_primary_key(&entity, &mut self.sequences) {
                self.staged.push(entity);
                self.staged.extend(pending);
                return Err(e);
            }
            self.flushed.push(entity);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.flush()?;
        self.persisted.append(&mut self.flushed);
        self.committed_sequences = self.sequences.clone();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.staged.clear();
        self.flushed.clear();
        self.sequences = self.committed_sequences.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::EntityClass;
    use crate::record::ClassDef;
    use crate::types::{Entity, SeedError};
    use serde_json::json;
    use std::rc::Rc;

    /// Class whose entities refuse every attribute, including the key.
    #[derive(Debug)]
    struct Sealed;

    #[derive(Debug)]
    struct SealedEntity;

    impl EntityClass for Sealed {
        fn name(&self) -> &str {
            "Sealed"
        }

        fn module(&self) -> &str {
            "vault"
        }

        fn construct(&self) -> Box<dyn Entity> {
            Box::new(SealedEntity)
        }

        fn primary_key(&self) -> Option<&str> {
            Some("id")
        }
    }

    impl Entity for SealedEntity {
        fn set_field(&mut self, field: &str, _value: FieldValue) -> std::result::Result<(), String> {
            Err(format!("'{}' is sealed", field))
        }

        fn get_field(&self, _field: &str) -> Option<FieldValue> {
            None
        }

        fn field_names(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn country_class() -> ClassRef {
        ClassDef::new("geo", "Country")
            .with_fields(["short", "name"])
            .with_primary_key("id")
            .into_class()
    }

    fn country(class: &ClassRef, short: &str) -> EntityRef {
        let entity = EntityRef::construct(class);
        entity.set("short", json!(short).into()).expect("set");
        entity
    }

    fn by_short(short: &str) -> Criteria {
        let mut criteria = Criteria::new();
        criteria.insert("short".to_string(), json!(short));
        criteria
    }

    #[test]
    fn staged_entities_are_invisible_until_flush() {
        let class = country_class();
        let mut store = MemoryStore::new();
        let uk = country(&class, "UK");

        store.add(&uk).expect("add");
        assert!(store.find(&class, &by_short("UK")).expect("find").is_empty());
        assert_eq!(store.pending(), 1);

        store.flush().expect("flush");
        assert_eq!(store.find(&class, &by_short("UK")).expect("find"), vec![uk.clone()]);
        assert_eq!(uk.get("id"), Some(json!(1).into()));
    }

    #[test]
    fn add_twice_is_a_noop() {
        let class = country_class();
        let mut store = MemoryStore::new();
        let uk = country(&class, "UK");

        store.add(&uk).expect("add");
        store.flush().expect("flush");
        store.add(&uk).expect("add");
        store.flush().expect("flush");

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rollback_discards_uncommitted_work() {
        let class = country_class();
        let persisted = country(&class, "NL");
        persisted.set("id", json!(3).into()).expect("set");
        let mut store = MemoryStore::with_persisted([persisted]);

        let uk = country(&class, "UK");
        store.add(&uk).expect("add");
        store.flush().expect("flush");
        assert_eq!(uk.get("id"), Some(json!(4).into()));

        store.rollback().expect("rollback");
        assert_eq!(store.len(), 1);

        let be = country(&class, "BE");
        store.add(&be).expect("add");
        store.commit().expect("commit");
        assert_eq!(be.get("id"), Some(json!(4).into()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn failed_flush_keeps_unflushed_entities_staged() {
        let sealed: ClassRef = Rc::new(Sealed);
        let class = country_class();
        let mut store = MemoryStore::new();
        let uk = country(&class, "UK");
        let locked = EntityRef::construct(&sealed);
        let be = country(&class, "BE");

        store.add(&uk).expect("add");
        store.add(&locked).expect("add");
        store.add(&be).expect("add");

        let err = store.flush().expect_err("key assignment should fail");
        assert!(matches!(err, SeedError::FieldAssignment { ref field, .. } if field == "id"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending(), 2);
        assert!(store.find(&class, &by_short("BE")).expect("find").is_empty());

        store.rollback().expect("rollback");
        assert_eq!(store.pending(), 0);
        assert!(store.is_empty());
    }
}
