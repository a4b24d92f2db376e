//! # Entity Stores
//!
//! The persisted-object collaborator of a seeding run. The engine only ever
//! calls [`EntityStore::add`], [`EntityStore::find`] and
//! [`EntityStore::flush`]; committing or rolling back is the caller's call.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: in-memory, for tests and dry runs
//! - [`RedbStore`]: disk-backed ACID storage on redb

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::class::ClassRef;
use crate::types::{Criteria, EntityRef, FieldValue, Result, SeedError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Transactional store of persisted entities.
pub trait EntityStore {
    /// Stage a new entity. Adding the same instance twice is a no-op.
    fn add(&mut self, entity: &EntityRef) -> Result<()>;

    /// Flushed or persisted entities of `class` matching every criterion.
    ///
    /// Staged entities are not visible until flushed.
    fn find(&mut self, class: &ClassRef, criteria: &Criteria) -> Result<Vec<EntityRef>>;

    /// Materialize staged entities: assign store-generated primary keys and
    /// make them visible to `find`.
    fn flush(&mut self) -> Result<()>;

    /// Make everything flushed so far durable.
    fn commit(&mut self) -> Result<()>;

    /// Discard everything staged or flushed since the last commit.
    fn rollback(&mut self) -> Result<()>;
}

/// Assign the next sequence value to an unset integer primary key.
///
/// Explicit integer keys advance the sequence past themselves, so generated
/// keys never collide with declared ones.
pub(crate) fn assign_primary_key(
    entity: &EntityRef,
    sequences: &mut BTreeMap<String, u64>,
) -> Result<()> {
    let Some(pk) = entity.class().primary_key() else {
        return Ok(());
    };
    let last = sequences.entry(entity.class_path()).or_insert(0);

    match entity.primary_key() {
        Some(FieldValue::Literal(Value::Number(number))) => {
            if let Some(explicit) = number.as_u64() {
                *last = (*last).max(explicit);
            }
            Ok(())
        }
        Some(_) => Ok(()),
        None => {
            *last = last.saturating_add(1);
            entity
                .set(pk, FieldValue::Literal(Value::from(*last)))
                .map_err(|reason| SeedError::FieldAssignment {
                    class: entity.class_path(),
                    field: pk.to_string(),
                    reason,
                    location: Default::default(),
                })
        }
    }
}
