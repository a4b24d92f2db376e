//! # Reference Resolver
//!
//! Resolves one reference description against two sources:
//! - the run index (entities built earlier in this run)
//! - the entity store (flushed or persisted entities)
//!
//! Candidates from both sources are unioned and de-duplicated by identity.
//! Exactly one candidate must remain; zero or several is an error.
//!
//! Id references (`"#id"`) are looked up in the run index only, since ids
//! are local to one document.
//!
//! The resolver never flushes. Whatever the store returns at the time of the
//! call is taken as current.

use crate::class::ClassResolver;
use crate::document::{IdReference, ReferenceDescription};
use crate::index::RunIndex;
use crate::primitives::ID_KEY;
use crate::store::EntityStore;
use crate::types::{Criteria, EntityRef, FieldValue, Location, Result, SeedError};
use tracing::debug;

/// Matches reference descriptions and assigns the result.
pub struct ReferenceResolver<'a> {
    classes: &'a dyn ClassResolver,
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver looking up classes through `classes`.
    #[must_use]
    pub fn new(classes: &'a dyn ClassResolver) -> Self {
        Self { classes }
    }

    /// The single entity matching `reference`.
    ///
    /// # Errors
    ///
    /// - `ClassResolution` when the target class does not resolve
    /// - `NoMatch` when no candidate matches
    /// - `AmbiguousMatch` when several distinct candidates match
    pub fn find_unique(
        &self,
        reference: &ReferenceDescription,
        index: &RunIndex,
        store: &mut dyn EntityStore,
        at: &Location,
    ) -> Result<EntityRef> {
        let class = self
            .classes
            .resolve(&reference.target_class)
            .map_err(|e| e.with_location(at))?;

        let from_index = index.matching(&class, &reference.criteria);
        let from_store = store.find(&class, &reference.criteria)?;

        debug!(
            target_class = %class.path(),
            criteria = ?reference.criteria,
            index_matches = from_index.len(),
            store_matches = from_store.len(),
            "resolving reference"
        );

        let mut candidates = from_index;
        for entity in from_store {
            if !candidates.iter().any(|known| known.ptr_eq(&entity)) {
                candidates.push(entity);
            }
        }

        match candidates.len() {
            0 => Err(SeedError::NoMatch {
                target_class: reference.target_class.clone(),
                criteria: reference.criteria.clone(),
                location: at.clone(),
            }),
            1 => Ok(candidates.remove(0)),
            count => Err(SeedError::AmbiguousMatch {
                target_class: reference.target_class.clone(),
                criteria: reference.criteria.clone(),
                count,
                location: at.clone(),
            }),
        }
    }

    /// Resolve `reference` and assign the result to `owner.field`.
    ///
    /// With `reference.field` set the matched entity's attribute is copied,
    /// otherwise the matched entity itself is assigned.
    pub fn resolve(
        &self,
        owner: &EntityRef,
        field: &str,
        reference: &ReferenceDescription,
        index: &RunIndex,
        store: &mut dyn EntityStore,
        at: &Location,
    ) -> Result<()> {
        let at = at.with_field(field);
        let matched = self.find_unique(reference, index, store, &at)?;
        assign(owner, field, matched, reference.field.as_deref(), &at)
    }

    /// Resolve an id reference against the run index and assign the result
    /// to `owner.field`.
    ///
    /// # Errors
    ///
    /// `NoMatch` when no earlier entity of this run declared the id.
    pub fn resolve_id(
        &self,
        owner: &EntityRef,
        field: &str,
        reference: &IdReference,
        index: &RunIndex,
        at: &Location,
    ) -> Result<()> {
        let at = at.with_field(field);
        let matched = index.by_id(&reference.id).ok_or_else(|| {
            let mut criteria = Criteria::new();
            criteria.insert(ID_KEY.to_string(), reference.id.clone().into());
            SeedError::NoMatch {
                target_class: "entity".to_string(),
                criteria,
                location: at.clone(),
            }
        })?;
        debug!(id = %reference.id, matched = %matched.label(), "resolved id reference");
        assign(owner, field, matched, reference.field.as_deref(), &at)
    }
}

/// Assign `matched`, or its `source` attribute, to `owner.field`.
fn assign(
    owner: &EntityRef,
    field: &str,
    matched: EntityRef,
    source: Option<&str>,
    at: &Location,
) -> Result<()> {
    let value = match source {
        Some(source) => matched.get(source).ok_or_else(|| SeedError::FieldAssignment {
            class: matched.class_path(),
            field: source.to_string(),
            reason: format!("matched {} has no value for it", matched.label()),
            location: at.clone(),
        })?,
        None => FieldValue::Entity(matched),
    };

    owner
        .set(field, value)
        .map_err(|reason| SeedError::FieldAssignment {
            class: owner.class_path(),
            field: field.to_string(),
            reason,
            location: at.clone(),
        })
}
