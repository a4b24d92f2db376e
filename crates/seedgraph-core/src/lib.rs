//! # seedgraph-core
//!
//! The reference-resolving entity seeder.
//!
//! A seed document declares groups of entities to build. Each entity may
//! reference other entities by class and attribute criteria; a reference
//! resolves against the entities built earlier in the same run and against
//! an external entity store, and must match exactly one entity.
//!
//! ## Components
//!
//! - `document`: shape validation of the generic document tree
//! - `builder`: one entity per entity-data node, plain fields only
//! - `resolver`: reference matching over run index and store
//! - `seeder`: the ordered walk over groups and entities
//! - `registry`, `record`: the default class resolver and dynamic entity type
//! - `store`: the entity store trait with in-memory and redb backends
//! - `formats`: JSON/YAML decoding and the persisted record format
//!
//! ## Constraints
//!
//! - Synchronous and single-threaded: ordering is load-bearing
//! - No global state: the run index lives for one run only
//! - Every failure is a typed `SeedError` that aborts the run
//! - Commit and rollback are decided by the caller

// =============================================================================
// MODULES
// =============================================================================

pub mod builder;
pub mod class;
pub mod document;
pub mod formats;
pub mod index;
pub mod primitives;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod seeder;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Criteria, Entity, EntityRef, FieldValue, Location, Result, SeedError};

// =============================================================================
// RE-EXPORTS: Classes
// =============================================================================

pub use class::{ClassPath, ClassRef, ClassResolver, EntityClass};
pub use record::{ClassDef, Record, RecordClass};
pub use registry::ClassRegistry;

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use builder::EntityBuilder;
pub use document::{
    Document, DocumentValidator, EntityData, EntityGroup, IdReference, ReferenceDescription,
};
pub use index::RunIndex;
pub use resolver::ReferenceResolver;
pub use seeder::{SeedOptions, Seeder, group_by_class};
pub use store::{EntityStore, MemoryStore, RedbStore};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{DocumentFormat, parse_json_str, parse_yaml_str, read_document};
