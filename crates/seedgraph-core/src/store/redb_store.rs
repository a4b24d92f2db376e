//! # redb-backed Entity Store
//!
//! A disk-backed entity store using the redb embedded database.
//!
//! - Rows are keyed by class path and JSON-encoded primary key
//! - Row payloads use the record format in [`crate::formats::persistence`]
//! - Entity-valued attributes are stored as links and reloaded lazily
//!
//! Rows are materialized at most once per store session, so every handle
//! returned by `find` for the same row is the same instance. Nothing reaches
//! the database before `commit`, which writes every flushed row and the key
//! sequences in one ACID write transaction.

use super::{EntityStore, assign_primary_key};
use crate::class::{ClassRef, ClassResolver, same_class};
use crate::formats::persistence::{
    StoredRecord, StoredValue, decode_record, encode_record, encoded_row_key, row_key,
};
use crate::types::{Criteria, EntityRef, FieldValue, Location, Result, SeedError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Table for rows: "class path \x1f key json" -> encoded record
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Table for key sequences: class path -> last generated key
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// A link field whose target is assigned after loading.
struct PendingLink {
    owner: EntityRef,
    field: String,
    target: String,
}

/// Entity store persisted to a redb database file.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Maps stored class paths back to classes.
    classes: Rc<dyn ClassResolver>,
    /// Row key -> materialized entity, for loaded and flushed rows.
    identity: BTreeMap<String, EntityRef>,
    /// Classes whose rows have all been materialized.
    loaded_classes: BTreeSet<String>,
    /// Added but not yet flushed.
    staged: Vec<EntityRef>,
    /// Row keys flushed since the last commit, in flush order.
    flushed: Vec<String>,
    /// Class path -> last generated key, including uncommitted work.
    sequences: BTreeMap<String, u64>,
    /// Sequences as of the last commit.
    committed_sequences: BTreeMap<String, u64>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("identity_size", &self.identity.len())
            .field("staged", &self.staged.len())
            .field("flushed", &self.flushed.len())
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create an entity database at the given path.
    pub fn open(path: impl AsRef<Path>, classes: Rc<dyn ClassResolver>) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(store_error("open"))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(store_error("open"))?;
            let _ = write_txn
                .open_table(RECORDS)
                .map_err(store_error("open"))?;
            let _ = write_txn
                .open_table(SEQUENCES)
                .map_err(store_error("open"))?;
            write_txn.commit().map_err(store_error("open"))?;
        }

        let sequences = {
            let read_txn = db.begin_read().map_err(store_error("open"))?;
            let table = read_txn
                .open_table(SEQUENCES)
                .map_err(store_error("open"))?;
            let mut sequences = BTreeMap::new();
            for entry in table.iter().map_err(store_error("open"))? {
                let (key, value) = entry.map_err(store_error("open"))?;
                sequences.insert(key.value().to_string(), value.value());
            }
            sequences
        };

        Ok(Self {
            db,
            classes,
            identity: BTreeMap::new(),
            loaded_classes: BTreeSet::new(),
            staged: Vec::new(),
            flushed: Vec::new(),
            committed_sequences: sequences.clone(),
            sequences,
        })
    }

    /// Number of committed rows.
    pub fn count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(store_error("count"))?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(store_error("count"))?;
        table.len().map_err(store_error("count"))
    }

    /// Number of entities added but not yet flushed.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Every row of `class` visible to `find`, ordered by row key.
    pub fn list(&mut self, class: &ClassRef) -> Result<Vec<EntityRef>> {
        self.find(class, &Criteria::new())
    }

    /// Materialize every committed row of `class` once per session.
    fn load_class(&mut self, class: &ClassRef) -> Result<()> {
        let path = class.path();
        if self.loaded_classes.contains(&path) {
            return Ok(());
        }

        let start = encoded_row_key(&path, "");
        let end = format!("{}\u{20}", path);
        let rows: Vec<(String, Vec<u8>)> = {
            let read_txn = self.db.begin_read().map_err(store_error("find"))?;
            let table = read_txn
                .open_table(RECORDS)
                .map_err(store_error("find"))?;
            let mut rows = Vec::new();
            for entry in table
                .range(start.as_str()..end.as_str())
                .map_err(store_error("find"))?
            {
                let (key, value) = entry.map_err(store_error("find"))?;
                rows.push((key.value().to_string(), value.value().to_vec()));
            }
            rows
        };

        debug!(class = %path, rows = rows.len(), "loading stored rows");
        let rows: Vec<(String, Vec<u8>)> = rows
            .into_iter()
            .filter(|(key, _)| !self.identity.contains_key(key))
            .collect();
        self.materialize(rows)?;
        self.loaded_classes.insert(path);
        Ok(())
    }

    /// Build entities from stored rows and enter them into the identity map,
    /// loading every linked row that is not mapped yet.
    ///
    /// Links are assigned only once every reachable row is mapped, so long
    /// chains and cycles load without recursion.
    fn materialize(&mut self, rows: Vec<(String, Vec<u8>)>) -> Result<()> {
        let read_txn = self.db.begin_read().map_err(store_error("load"))?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(store_error("load"))?;

        let mut queued: BTreeSet<String> = rows.iter().map(|(key, _)| key.clone()).collect();
        let mut queue: VecDeque<(String, Vec<u8>)> = rows.into();
        let mut links: Vec<PendingLink> = Vec::new();

        while let Some((key, bytes)) = queue.pop_front() {
            if self.identity.contains_key(&key) {
                continue;
            }
            let record = decode_record(&bytes)?;
            let class = self.classes.resolve(&record.class)?;
            let entity = EntityRef::construct(&class);
            self.identity.insert(key, entity.clone());

            for (field, stored) in record.fields {
                match stored {
                    StoredValue::Link { class, key } => {
                        let target = encoded_row_key(&class, &key);
                        if !self.identity.contains_key(&target) && queued.insert(target.clone()) {
                            let bytes = table
                                .get(target.as_str())
                                .map_err(store_error("load"))?
                                .map(|value| value.value().to_vec())
                                .ok_or_else(|| SeedError::Store {
                                    operation: "load".to_string(),
                                    message: format!(
                                        "dangling link from {} to {}#{}",
                                        record.class, class, key
                                    ),
                                })?;
                            queue.push_back((target.clone(), bytes));
                        }
                        links.push(PendingLink {
                            owner: entity.clone(),
                            field,
                            target,
                        });
                    }
                    literal @ StoredValue::Literal(_) => {
                        let value = literal.to_literal()?.unwrap_or_default();
                        assign(&entity, &field, FieldValue::Literal(value))?;
                    }
                }
            }
        }

        debug!(links = links.len(), "assigning loaded links");
        for link in links {
            let target = self.identity.get(&link.target).cloned().ok_or_else(|| {
                SeedError::Store {
                    operation: "load".to_string(),
                    message: format!("row {} was not loaded", link.target),
                }
            })?;
            assign(&link.owner, &link.field, FieldValue::Entity(target))?;
        }
        Ok(())
    }

    /// Row key of a flushed or flushable entity.
    fn key_of(entity: &EntityRef) -> Result<String> {
        match entity.primary_key() {
            Some(FieldValue::Literal(key)) => row_key(&entity.class_path(), &key),
            Some(FieldValue::Entity(_)) => Err(SeedError::Store {
                operation: "flush".to_string(),
                message: format!("primary key of {} holds an entity", entity.class_path()),
            }),
            None => Err(SeedError::Store {
                operation: "flush".to_string(),
                message: format!(
                    "class {} declares no primary key and cannot be persisted",
                    entity.class_path()
                ),
            }),
        }
    }

    /// Encode an entity, turning entity-valued attributes into links.
    fn to_record(entity: &EntityRef) -> Result<StoredRecord> {
        let mut fields = Vec::new();
        for (field, value) in entity.fields() {
            let stored = match value {
                FieldValue::Literal(literal) => StoredValue::literal(&literal)?,
                FieldValue::Entity(target) => {
                    let Some(FieldValue::Literal(key)) = target.primary_key() else {
                        return Err(SeedError::Store {
                            operation: "commit".to_string(),
                            message: format!(
                                "{}.{} links to {}, which has no primary key",
                                entity.class_path(),
                                field,
                                target.label()
                            ),
                        });
                    };
                    StoredValue::Link {
                        class: target.class_path(),
                        key: serde_json::to_string(&key)
                            .map_err(|e| SeedError::Serialization(e.to_string()))?,
                    }
                }
            };
            fields.push((field, stored));
        }
        Ok(StoredRecord {
            class: entity.class_path(),
            fields,
        })
    }

    /// Key a staged entity and check it against the rows already known.
    fn flush_one(&mut self, entity: &EntityRef) -> Result<String> {
        // Committed rows must be visible to the duplicate check below.
        self.load_class(entity.class())?;
        assign_primary_key(entity, &mut self.sequences)?;

        let key = Self::key_of(entity)?;
        if self.identity.contains_key(&key) {
            return Err(SeedError::Store {
                operation: "flush".to_string(),
                message: format!("duplicate primary key for {}", entity.label()),
            });
        }
        Ok(key)
    }

    fn knows(&self, entity: &EntityRef) -> bool {
        self.staged.iter().any(|known| known.ptr_eq(entity))
            || self.identity.values().any(|known| known.ptr_eq(entity))
    }
}

impl EntityStore for RedbStore {
    fn add(&mut self, entity: &EntityRef) -> Result<()> {
        if !self.knows(entity) {
            self.staged.push(entity.clone());
        }
        Ok(())
    }

    fn find(&mut self, class: &ClassRef, criteria: &Criteria) -> Result<Vec<EntityRef>> {
        self.load_class(class)?;
        Ok(self
            .identity
            .values()
            .filter(|entity| same_class(entity.class(), class) && entity.matches(criteria))
            .cloned()
            .collect())
    }

    fn flush(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.staged).into_iter();
        while let Some(entity) = pending.next() {
            match self.flush_one(&entity) {
                Ok(key) => {
                    debug!(entity = %entity.label(), "flushed");
                    self.identity.insert(key.clone(), entity);
                    self.flushed.push(key);
                }
                Err(e) => {
                    // The failed entity and the rest stay staged.
                    self.staged.push(entity);
                    self.staged.extend(pending);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.flush()?;

        let write_txn = self.db.begin_write().map_err(store_error("commit"))?;
        {
            let mut records = write_txn
                .open_table(RECORDS)
                .map_err(store_error("commit"))?;
            for key in &self.flushed {
                let Some(entity) = self.identity.get(key) else {
                    continue;
                };
                let bytes = encode_record(&Self::to_record(entity)?)?;
                records
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(store_error("commit"))?;
            }

            let mut sequences = write_txn
                .open_table(SEQUENCES)
                .map_err(store_error("commit"))?;
            for (class, last) in &self.sequences {
                sequences
                    .insert(class.as_str(), *last)
                    .map_err(store_error("commit"))?;
            }
        }
        write_txn.commit().map_err(store_error("commit"))?;

        debug!(rows = self.flushed.len(), "committed");
        self.flushed.clear();
        self.committed_sequences = self.sequences.clone();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        for key in self.flushed.drain(..) {
            self.identity.remove(&key);
        }
        self.staged.clear();
        self.sequences = self.committed_sequences.clone();
        Ok(())
    }
}

/// Set a loaded attribute.
fn assign(entity: &EntityRef, field: &str, value: FieldValue) -> Result<()> {
    entity
        .set(field, value)
        .map_err(|reason| SeedError::FieldAssignment {
            class: entity.class_path(),
            field: field.to_string(),
            reason,
            location: Location::default(),
        })
}

/// Map a redb failure during `operation` into a store error.
fn store_error<E: std::fmt::Display>(operation: &'static str) -> impl Fn(E) -> SeedError {
    move |e| SeedError::Store {
        operation: operation.to_string(),
        message: e.to_string(),
    }
}
