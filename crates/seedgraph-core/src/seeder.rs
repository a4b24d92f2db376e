//! # Seeder
//!
//! Sequences validation, building and reference resolution over a seed
//! document and returns every created entity in creation order.
//!
//! ## Run
//!
//! 1. Validate the whole document before building anything
//! 2. For each group in order, for each entity data in order:
//!    build, resolve every reference, register in the run index,
//!    add to the store, and flush when `flush_on_create` is set
//! 3. Return the entities (group order, then declaration order)
//!
//! An entity is visible to references of every entity declared after it,
//! within its own group as well as in later groups. Nothing declared later
//! is ever visible (no forward references), including through `"#id"`.
//!
//! The first error aborts the run. The seeder never commits or rolls back:
//! on error the caller is expected to roll back the store.

use crate::builder::EntityBuilder;
use crate::class::ClassResolver;
use crate::document::{Document, DocumentValidator};
use crate::formats::source::{parse_json_str, parse_yaml_str, read_document};
use crate::index::RunIndex;
use crate::resolver::ReferenceResolver;
use crate::store::EntityStore;
use crate::types::{EntityRef, Location, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    /// Add and flush each entity right after it is built.
    ///
    /// When false entities are still added but never flushed, so
    /// store-assigned attributes stay unset during the run.
    pub flush_on_create: bool,
    /// Accept `"!Class?key=value[:field]"` strings as references.
    pub inline_references: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            flush_on_create: true,
            inline_references: true,
        }
    }
}

/// Builds entity graphs from seed documents.
pub struct Seeder<'a> {
    classes: &'a dyn ClassResolver,
    store: &'a mut dyn EntityStore,
    options: SeedOptions,
}

impl<'a> Seeder<'a> {
    /// Create a seeder with default options.
    pub fn new(classes: &'a dyn ClassResolver, store: &'a mut dyn EntityStore) -> Self {
        Self {
            classes,
            store,
            options: SeedOptions::default(),
        }
    }

    /// Replace the run settings.
    #[must_use]
    pub fn with_options(mut self, options: SeedOptions) -> Self {
        self.options = options;
        self
    }

    /// The current run settings.
    #[must_use]
    pub fn options(&self) -> SeedOptions {
        self.options
    }

    /// Validate a decoded document tree without building anything.
    pub fn validate(&self, tree: &Value) -> Result<Document> {
        DocumentValidator::new()
            .inline_references(self.options.inline_references)
            .validate(tree)
    }

    /// Seed a decoded document tree.
    ///
    /// Returns the created entities in creation order. Nothing is committed.
    pub fn load_from_parsed_document(&mut self, tree: &Value) -> Result<Vec<EntityRef>> {
        let document = self.validate(tree)?;
        self.seed_document(&document)
    }

    /// Seed an already validated document.
    pub fn seed_document(&mut self, document: &Document) -> Result<Vec<EntityRef>> {
        let builder = EntityBuilder::new(self.classes);
        let resolver = ReferenceResolver::new(self.classes);
        let mut index = RunIndex::new();

        for (g, group) in document.groups.iter().enumerate() {
            for (e, data) in group.entities.iter().enumerate() {
                let at = Location::entity(g, e);
                let entity = builder.build(data, &group.target_class, &at)?;

                for (field, reference) in &data.references {
                    resolver.resolve(&entity, field, reference, &index, &mut *self.store, &at)?;
                }
                for (field, reference) in &data.id_references {
                    resolver.resolve_id(&entity, field, reference, &index, &at)?;
                }

                index.register(entity.clone());
                if let Some(id) = &data.id {
                    index.register_id(id.clone(), &entity);
                }
                self.store.add(&entity)?;
                if self.options.flush_on_create {
                    self.store.flush()?;
                }
            }
        }

        info!(
            groups = document.groups.len(),
            entities = index.len(),
            "seeded document"
        );
        Ok(index.into_entities())
    }

    /// Decode JSON text and seed it.
    pub fn load_from_json_str(&mut self, text: &str) -> Result<Vec<EntityRef>> {
        let tree = parse_json_str(text)?;
        self.load_from_parsed_document(&tree)
    }

    /// Decode YAML text and seed it.
    pub fn load_from_yaml_str(&mut self, text: &str) -> Result<Vec<EntityRef>> {
        let tree = parse_yaml_str(text)?;
        self.load_from_parsed_document(&tree)
    }

    /// Read a `.json`, `.yaml` or `.yml` file and seed it.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<EntityRef>> {
        let path = path.as_ref();
        let tree = read_document(path)?;
        info!(path = %path.display(), "loaded seed file");
        self.load_from_parsed_document(&tree)
    }
}

/// Group entities by class path, keeping creation order within each class.
#[must_use]
pub fn group_by_class(entities: &[EntityRef]) -> BTreeMap<String, Vec<EntityRef>> {
    let mut grouped: BTreeMap<String, Vec<EntityRef>> = BTreeMap::new();
    for entity in entities {
        grouped
            .entry(entity.class_path())
            .or_default()
            .push(entity.clone());
    }
    grouped
}
