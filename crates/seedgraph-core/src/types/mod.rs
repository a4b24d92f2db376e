//! # Core Type Definitions
//!
//! This module contains the types shared by every stage of a seeding run:
//! - Entity capability and shared handle (`Entity`, `EntityRef`)
//! - Attribute values and lookup criteria (`FieldValue`, `Criteria`)
//! - Error reporting (`SeedError`, `Location`)
//!
//! ## Identity
//!
//! `EntityRef` equality is identity: two handles are equal only when they
//! point at the same instance. Candidate de-duplication during reference
//! resolution relies on this.

use crate::class::ClassRef;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Attribute name -> literal value pairs a candidate must match.
pub type Criteria = BTreeMap<String, Value>;

// =============================================================================
// FIELD VALUES
// =============================================================================

/// The value held by one named attribute of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A plain value taken from the document or assigned by the store.
    Literal(Value),
    /// A relationship pointer to another entity.
    Entity(EntityRef),
}

impl FieldValue {
    /// The literal payload, if this is not a relationship.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Entity(_) => None,
        }
    }

    /// The referenced entity, if this is a relationship.
    #[must_use]
    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Literal(_) => None,
            Self::Entity(entity) => Some(entity),
        }
    }

    /// True for a missing-value literal (`null`).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Literal(Value::Null))
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<EntityRef> for FieldValue {
    fn from(entity: EntityRef) -> Self {
        Self::Entity(entity)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{}", value),
            Self::Entity(entity) => write!(f, "{}", entity.label()),
        }
    }
}

// =============================================================================
// ENTITY CAPABILITY
// =============================================================================

/// The capability set every seeded type must provide.
///
/// The engine never inspects a concrete type. It constructs instances through
/// their [`EntityClass`](crate::class::EntityClass) and then only sets and
/// reads attributes by name.
pub trait Entity: fmt::Debug {
    /// Assign a named attribute.
    ///
    /// Returns the reason as `Err` when the attribute does not exist or does
    /// not accept the value.
    fn set_field(&mut self, field: &str, value: FieldValue) -> std::result::Result<(), String>;

    /// Read a named attribute. `None` when it does not exist or is unset.
    fn get_field(&self, field: &str) -> Option<FieldValue>;

    /// Names of the attributes this entity exposes, in declaration order.
    fn field_names(&self) -> Vec<String>;

    /// Detach and return every entity-valued attribute.
    ///
    /// Called only on an entity that is being released, so long chains of
    /// links are dropped one entity at a time. The default keeps the links.
    fn take_links(&mut self) -> Vec<EntityRef> {
        Vec::new()
    }
}

// =============================================================================
// ENTITY HANDLE
// =============================================================================

/// Shared handle to a constructed entity together with its class.
///
/// Handles are cheap to clone. The same handle is held by the run index,
/// the entity store, the output sequence, and any entity that references it.
#[derive(Clone)]
pub struct EntityRef {
    class: ClassRef,
    cell: Rc<RefCell<Box<dyn Entity>>>,
}

impl EntityRef {
    /// Wrap an already constructed entity.
    pub fn new(class: ClassRef, entity: Box<dyn Entity>) -> Self {
        Self {
            class,
            cell: Rc::new(RefCell::new(entity)),
        }
    }

    /// Construct a bare instance of `class`.
    pub fn construct(class: &ClassRef) -> Self {
        Self::new(Rc::clone(class), class.construct())
    }

    /// The class this entity was constructed from.
    #[must_use]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Qualified path of the entity's class (`module:Name`).
    #[must_use]
    pub fn class_path(&self) -> String {
        self.class.path()
    }

    /// True when both handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Read a named attribute.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.cell
            .try_borrow()
            .ok()
            .and_then(|entity| entity.get_field(field))
    }

    /// Assign a named attribute.
    pub fn set(&self, field: &str, value: FieldValue) -> std::result::Result<(), String> {
        let mut entity = self
            .cell
            .try_borrow_mut()
            .map_err(|_| "entity is being read while assigned".to_string())?;
        entity.set_field(field, value)
    }

    /// Every attribute that currently holds a value, in declaration order.
    #[must_use]
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        let Ok(entity) = self.cell.try_borrow() else {
            return Vec::new();
        };
        entity
            .field_names()
            .into_iter()
            .filter_map(|name| {
                let value = entity.get_field(&name)?;
                Some((name, value))
            })
            .collect()
    }

    /// Value of the class's primary key attribute, if declared and set.
    #[must_use]
    pub fn primary_key(&self) -> Option<FieldValue> {
        self.class
            .primary_key()
            .and_then(|pk| self.get(pk))
            .filter(|value| !value.is_null())
    }

    /// True when every criterion equals the attribute of the same name.
    ///
    /// A missing attribute is a non-match, never an error.
    #[must_use]
    pub fn matches(&self, criteria: &Criteria) -> bool {
        criteria.iter().all(|(field, expected)| {
            matches!(self.get(field), Some(FieldValue::Literal(actual)) if actual == *expected)
        })
    }

    /// Short human-readable identity: `path#key` or `path@address`.
    #[must_use]
    pub fn label(&self) -> String {
        match self.primary_key() {
            Some(FieldValue::Literal(key)) => format!("{}#{}", self.class_path(), key),
            _ => format!("{}@{:p}", self.class_path(), Rc::as_ptr(&self.cell)),
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EntityRef {}

impl Drop for EntityRef {
    fn drop(&mut self) {
        if Rc::strong_count(&self.cell) > 1 {
            return;
        }
        let mut pending = match self.cell.try_borrow_mut() {
            Ok(mut entity) => entity.take_links(),
            Err(_) => return,
        };
        // Links whose last holder is released here are emptied first, so
        // dropping them never recurses.
        while let Some(link) = pending.pop() {
            if Rc::strong_count(&link.cell) > 1 {
                continue;
            }
            if let Ok(mut entity) = link.cell.try_borrow_mut() {
                pending.extend(entity.take_links());
            }
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({})", self.label())
    }
}

// =============================================================================
// LOCATION
// =============================================================================

/// Position of a declaration inside a seed document.
///
/// Every part is optional: errors raised by collaborators outside a run
/// carry an unknown location until the engine attaches one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Index of the entity group.
    pub group: Option<usize>,
    /// Index of the entity data within its group.
    pub entity: Option<usize>,
    /// Field being assigned or resolved.
    pub field: Option<String>,
}

impl Location {
    /// Location of one entity-data node.
    #[must_use]
    pub fn entity(group: usize, entity: usize) -> Self {
        Self {
            group: Some(group),
            entity: Some(entity),
            field: None,
        }
    }

    /// The same location narrowed to one field.
    #[must_use]
    pub fn with_field(&self, field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            ..self.clone()
        }
    }

    /// True when nothing about the position is known.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.group.is_none() && self.entity.is_none() && self.field.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "unknown location");
        }
        let mut parts = Vec::new();
        if let Some(group) = self.group {
            parts.push(format!("group {}", group));
        }
        if let Some(entity) = self.entity {
            parts.push(format!("entity {}", entity));
        }
        if let Some(field) = &self.field {
            parts.push(format!("field '{}'", field));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Render criteria as compact JSON for error messages.
#[must_use]
pub fn render_criteria(criteria: &Criteria) -> String {
    serde_json::to_string(criteria).unwrap_or_default()
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while seeding.
///
/// - Every error is terminal for the current run
/// - Nothing is retried or downgraded to a warning
/// - Library code never panics
#[derive(Debug, Error)]
pub enum SeedError {
    /// The document does not have the entity-group shape.
    #[error("Malformed document at {path}: {message}")]
    Shape { path: String, message: String },

    /// A class identifier does not map to a constructible class.
    #[error("Cannot resolve class '{identifier}' ({location}): {reason}")]
    ClassResolution {
        identifier: String,
        reason: String,
        location: Location,
    },

    /// A named attribute cannot be set or read.
    #[error("Cannot assign field '{field}' on {class} ({location}): {reason}")]
    FieldAssignment {
        class: String,
        field: String,
        reason: String,
        location: Location,
    },

    /// A reference matched no entity.
    #[error("No {target_class} matches {} ({location})", render_criteria(.criteria))]
    NoMatch {
        target_class: String,
        criteria: Criteria,
        location: Location,
    },

    /// A reference matched more than one entity.
    #[error(
        "{count} {target_class} entities match {} ({location}), expected exactly one",
        render_criteria(.criteria)
    )]
    AmbiguousMatch {
        target_class: String,
        criteria: Criteria,
        count: usize,
        location: Location,
    },

    /// The entity store failed.
    #[error("Entity store error during {operation}: {message}")]
    Store { operation: String, message: String },

    /// A JSON or YAML source could not be decoded.
    #[error("Cannot parse {format} document: {message}")]
    Parse { format: String, message: String },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SeedError {
    /// Class resolution failure with no location yet.
    pub fn class_resolution(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClassResolution {
            identifier: identifier.into(),
            reason: reason.into(),
            location: Location::default(),
        }
    }

    /// Attach `location` to errors that were raised without one.
    ///
    /// The error kind and every other detail stay as they were.
    #[must_use]
    pub fn with_location(self, at: &Location) -> Self {
        match self {
            Self::ClassResolution {
                identifier,
                reason,
                location,
            } if location.is_unknown() => Self::ClassResolution {
                identifier,
                reason,
                location: at.clone(),
            },
            Self::FieldAssignment {
                class,
                field,
                reason,
                location,
            } if location.is_unknown() => Self::FieldAssignment {
                class,
                field,
                reason,
                location: at.clone(),
            },
            other => other,
        }
    }

    /// The document location carried by the error, if any.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::ClassResolution { location, .. }
            | Self::FieldAssignment { location, .. }
            | Self::NoMatch { location, .. }
            | Self::AmbiguousMatch { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SeedError>;

// =============================================================================
// TESTS
// =============================================================================
