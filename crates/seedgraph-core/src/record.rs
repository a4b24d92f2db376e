//! # Schema-Driven Records
//!
//! `Record` is a ready-made entity type whose attributes are declared by a
//! [`ClassDef`]. Class definitions are plain data, so they can be loaded from
//! configuration files and registered without writing any Rust types.

use crate::class::{ClassRef, EntityClass};
use crate::types::{Entity, EntityRef, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Declaration of a record class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Dotted module path. Empty for top-level classes.
    #[serde(default)]
    pub module: String,
    /// Bare class name.
    pub name: String,
    /// Settable attributes, in declaration order.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Attribute assigned by the store on flush.
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl ClassDef {
    /// Declare a class with no fields.
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            fields: Vec::new(),
            primary_key: None,
        }
    }

    /// Add one settable attribute.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add several settable attributes.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Declare the primary key attribute.
    #[must_use]
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Turn the declaration into a shareable class.
    #[must_use]
    pub fn into_class(self) -> ClassRef {
        Rc::new(RecordClass::new(self))
    }
}

/// Class of [`Record`] entities built from a [`ClassDef`].
#[derive(Debug, Clone)]
pub struct RecordClass {
    def: Rc<ClassDef>,
}

impl RecordClass {
    /// Build the class. The primary key is always a settable field.
    #[must_use]
    pub fn new(mut def: ClassDef) -> Self {
        if let Some(pk) = def.primary_key.clone() {
            if !def.fields.contains(&pk) {
                def.fields.insert(0, pk);
            }
        }
        Self { def: Rc::new(def) }
    }

    /// The underlying declaration.
    #[must_use]
    pub fn def(&self) -> &ClassDef {
        &self.def
    }
}

impl EntityClass for RecordClass {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn module(&self) -> &str {
        &self.def.module
    }

    fn construct(&self) -> Box<dyn Entity> {
        Box::new(Record {
            def: Rc::clone(&self.def),
            values: BTreeMap::new(),
        })
    }

    fn primary_key(&self) -> Option<&str> {
        self.def.primary_key.as_deref()
    }
}

/// An entity whose settable attributes are those of its [`ClassDef`].
#[derive(Debug, Clone)]
pub struct Record {
    def: Rc<ClassDef>,
    values: BTreeMap<String, FieldValue>,
}

impl Entity for Record {
    fn set_field(&mut self, field: &str, value: FieldValue) -> std::result::Result<(), String> {
        if !self.def.fields.iter().any(|declared| declared == field) {
            return Err(format!("class '{}' has no field '{}'", self.def.name, field));
        }
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    fn get_field(&self, field: &str) -> Option<FieldValue> {
        self.values.get(field).cloned()
    }

    fn field_names(&self) -> Vec<String> {
        self.def.fields.clone()
    }

    fn take_links(&mut self) -> Vec<EntityRef> {
        let (links, literals): (Vec<_>, Vec<_>) = std::mem::take(&mut self.values)
            .into_iter()
            .partition(|(_, value)| matches!(value, FieldValue::Entity(_)));
        self.values = literals.into_iter().collect();
        links
            .into_iter()
            .filter_map(|(_, value)| match value {
                FieldValue::Entity(target) => Some(target),
                FieldValue::Literal(_) => None,
            })
            .collect()
    }
}
