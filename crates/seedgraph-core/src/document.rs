//! # Document Validator
//!
//! Turns the generic parsed tree into typed entity groups, rejecting any
//! deviation from the seed document shape:
//!
//! ```text
//! Root                 := EntityGroup | [EntityGroup, ...]
//! EntityGroup          := { "target_class": <identifier>, "data": EntityData | [EntityData, ...] }
//! EntityData           := { <field>: <literal>, ..., "!id"?: <string>, "!refs"?: { <field>: ReferenceDescription } }
//! ReferenceDescription := { "target_class": <identifier>, "criteria": { <field>: <literal> }, "field"?: <string> }
//! ```
//!
//! With inline references enabled, string field values are also read as
//! references: `"!Class?key=value&key2=value2[:field]"` looks up by criteria,
//! and `"#id[:field]"` names the entity declared with `"!id": "id"`. Ids are
//! unique within a document.
//!
//! Validation is fail-fast: the first deviation is reported as
//! `SeedError::Shape` naming its path (`$[1].data[0].!refs.country`), and
//! nothing is built. Validation has no side effects.

use crate::primitives::{
    CRITERIA_KEY, CRITERIA_SEPARATOR, DATA_KEY, DIRECTIVE_PREFIX, FIELD_KEY, ID_KEY,
    ID_REF_PREFIX, INLINE_REF_PREFIX, KEY_VALUE_SEPARATOR, MAX_DOCUMENT_ENTITIES,
    REF_CLASS_SEPARATOR, REF_FIELD_SEPARATOR, REFS_KEY, TARGET_CLASS_KEY,
};
use crate::types::{Criteria, Result, SeedError};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// A lookup of exactly one entity of `target_class` matching `criteria`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    /// Class identifier of the referenced entity.
    pub target_class: String,
    /// Attribute values the referenced entity must have. Never empty.
    pub criteria: Criteria,
    /// Attribute to copy from the match; the whole entity when `None`.
    pub field: Option<String>,
}

impl ReferenceDescription {
    /// Parse an inline reference string: `!Class?key=value&key2=value2[:field]`.
    ///
    /// A criteria value that reads as a JSON number, boolean or `null` is
    /// taken as that scalar (`id=1`), anything else as a string.
    pub fn parse_inline(reference: &str) -> std::result::Result<Self, String> {
        let body = reference.trim_start_matches(INLINE_REF_PREFIX);
        let Some((target_class, slug)) = body.split_once(REF_CLASS_SEPARATOR) else {
            return Err(format!(
                "inline reference needs '{}' between class and criteria",
                REF_CLASS_SEPARATOR
            ));
        };
        if target_class.trim().is_empty() {
            return Err("inline reference has no class".to_string());
        }

        let (slug, field) = match slug.rsplit_once(REF_FIELD_SEPARATOR) {
            Some((head, tail))
                if !tail.is_empty()
                    && !tail.contains(KEY_VALUE_SEPARATOR)
                    && !tail.contains(CRITERIA_SEPARATOR) =>
            {
                (head, Some(tail.to_string()))
            }
            _ => (slug, None),
        };

        let mut criteria = Criteria::new();
        for pair in slug.split(CRITERIA_SEPARATOR) {
            let Some((key, value)) = pair.split_once(KEY_VALUE_SEPARATOR) else {
                return Err(format!("criterion '{}' is not of the form key=value", pair));
            };
            if key.is_empty() {
                return Err(format!("criterion '{}' has no key", pair));
            }
            criteria.insert(key.to_string(), inline_value(value));
        }

        Ok(Self {
            target_class: target_class.to_string(),
            criteria,
            field,
        })
    }
}

/// Criteria value of an inline reference.
fn inline_value(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(scalar @ (Value::Number(_) | Value::Bool(_) | Value::Null)) if text.trim() == text => {
            scalar
        }
        _ => Value::String(text.to_string()),
    }
}

/// A lookup of the entity declared with `"!id": id` earlier in the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReference {
    /// Document-local id of the referenced entity.
    pub id: String,
    /// Attribute to copy from the entity; the whole entity when `None`.
    pub field: Option<String>,
}

impl IdReference {
    /// Parse an id reference string: `#id[:field]`.
    pub fn parse(reference: &str) -> std::result::Result<Self, String> {
        let body = reference.strip_prefix(ID_REF_PREFIX).unwrap_or(reference);
        let (id, field) = match body.split_once(REF_FIELD_SEPARATOR) {
            Some((id, field)) => (id, Some(field)),
            None => (body, None),
        };
        if id.trim().is_empty() {
            return Err("id reference has no id".to_string());
        }
        if field.is_some_and(str::is_empty) {
            return Err(format!(
                "id reference has nothing after '{}'",
                REF_FIELD_SEPARATOR
            ));
        }
        Ok(Self {
            id: id.to_string(),
            field: field.map(str::to_string),
        })
    }
}

/// Literal fields and unresolved references of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityData {
    /// Plain fields in declaration order.
    pub fields: Vec<(String, Value)>,
    /// References in declaration order.
    pub references: Vec<(String, ReferenceDescription)>,
    /// Id later entities use to reference this one.
    pub id: Option<String>,
    /// References to entities by id, in declaration order.
    pub id_references: Vec<(String, IdReference)>,
}

/// "Build these entities of this class."
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    /// Class identifier of every entity in the group.
    pub target_class: String,
    /// Entity data in declaration order.
    pub entities: Vec<EntityData>,
}

/// A validated seed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Entity groups in document order.
    pub groups: Vec<EntityGroup>,
}

impl Document {
    /// Validate `tree` with default settings.
    pub fn from_tree(tree: &Value) -> Result<Self> {
        DocumentValidator::new().validate(tree)
    }

    /// Total number of entity-data nodes.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.groups.iter().map(|group| group.entities.len()).sum()
    }
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Validates generic trees against the seed document shape.
#[derive(Debug, Clone, Copy)]
pub struct DocumentValidator {
    inline_references: bool,
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self {
            inline_references: true,
        }
    }
}

impl DocumentValidator {
    /// Validator with inline references enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parsing of `"!Class?key=value"` string values.
    #[must_use]
    pub fn inline_references(mut self, enabled: bool) -> Self {
        self.inline_references = enabled;
        self
    }

    /// Validate a document tree.
    pub fn validate(&self, tree: &Value) -> Result<Document> {
        let mut ids = BTreeMap::new();
        let groups = match tree {
            Value::Object(_) => vec![self.group(tree, "$", &mut ids)?],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.group(item, &format!("$[{}]", i), &mut ids))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(shape(
                    "$",
                    "expected an entity group or a sequence of entity groups",
                ));
            }
        };

        let document = Document { groups };
        let count = document.entity_count();
        if count > MAX_DOCUMENT_ENTITIES {
            return Err(shape(
                "$",
                format!(
                    "document declares {} entities, maximum is {}",
                    count, MAX_DOCUMENT_ENTITIES
                ),
            ));
        }
        Ok(document)
    }

    /// `ids` maps every `!id` seen so far to the path declaring it.
    fn group(
        &self,
        node: &Value,
        path: &str,
        ids: &mut BTreeMap<String, String>,
    ) -> Result<EntityGroup> {
        let map = node
            .as_object()
            .ok_or_else(|| shape(path, "entity group must be a mapping"))?;

        if let Some(key) = map
            .keys()
            .find(|key| key.as_str() != TARGET_CLASS_KEY && key.as_str() != DATA_KEY)
        {
            return Err(shape(
                format!("{}.{}", path, key),
                "unknown key in entity group",
            ));
        }

        let target_class = identifier(map, path)?;
        let data_path = format!("{}.{}", path, DATA_KEY);
        let entities = match map.get(DATA_KEY) {
            None => return Err(shape(path, format!("missing '{}'", DATA_KEY))),
            Some(data @ Value::Object(_)) => vec![self.entity_data(data, &data_path, ids)?],
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.entity_data(item, &format!("{}[{}]", data_path, i), ids))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(shape(
                    data_path,
                    "expected entity data or a sequence of entity data",
                ));
            }
        };

        Ok(EntityGroup {
            target_class,
            entities,
        })
    }

    fn entity_data(
        &self,
        node: &Value,
        path: &str,
        ids: &mut BTreeMap<String, String>,
    ) -> Result<EntityData> {
        let map = node
            .as_object()
            .ok_or_else(|| shape(path, "entity data must be a mapping"))?;

        let mut data = EntityData::default();
        for (key, value) in map {
            let key_path = format!("{}.{}", path, key);
            if key == REFS_KEY {
                let refs = value.as_object().ok_or_else(|| {
                    shape(
                        &key_path,
                        "references must map field names to reference descriptions",
                    )
                })?;
                for (field, description) in refs {
                    let reference =
                        reference_description(description, &format!("{}.{}", key_path, field))?;
                    data.references.push((field.clone(), reference));
                }
            } else if key == ID_KEY {
                let id = match value {
                    Value::String(id) if !id.trim().is_empty() => id.clone(),
                    _ => return Err(shape(key_path, "id must be a non-empty string")),
                };
                if let Some(first) = ids.get(&id) {
                    return Err(shape(
                        &key_path,
                        format!("id '{}' is already declared at {}", id, first),
                    ));
                }
                ids.insert(id.clone(), key_path);
                data.id = Some(id);
            } else if key.starts_with(DIRECTIVE_PREFIX) {
                return Err(shape(key_path, "unknown directive"));
            } else if let Some(inline) = value
                .as_str()
                .filter(|s| self.inline_references && s.starts_with(INLINE_REF_PREFIX))
            {
                let reference = ReferenceDescription::parse_inline(inline)
                    .map_err(|message| shape(&key_path, message))?;
                data.references.push((key.clone(), reference));
            } else if let Some(by_id) = value
                .as_str()
                .filter(|s| self.inline_references && s.starts_with(ID_REF_PREFIX))
            {
                let reference =
                    IdReference::parse(by_id).map_err(|message| shape(&key_path, message))?;
                data.id_references.push((key.clone(), reference));
            } else {
                data.fields.push((key.clone(), value.clone()));
            }
        }

        let mut declared = BTreeSet::new();
        let names = data
            .fields
            .iter()
            .map(|(field, _)| field)
            .chain(data.references.iter().map(|(field, _)| field))
            .chain(data.id_references.iter().map(|(field, _)| field));
        for field in names {
            if !declared.insert(field) {
                return Err(shape(
                    format!("{}.{}", path, field),
                    "field is declared more than once",
                ));
            }
        }

        Ok(data)
    }
}

fn reference_description(node: &Value, path: &str) -> Result<ReferenceDescription> {
    let map = node
        .as_object()
        .ok_or_else(|| shape(path, "reference description must be a mapping"))?;

    if let Some(key) = map.keys().find(|key| {
        !matches!(
            key.as_str(),
            TARGET_CLASS_KEY | CRITERIA_KEY | FIELD_KEY
        )
    }) {
        return Err(shape(
            format!("{}.{}", path, key),
            "unknown key in reference description",
        ));
    }

    let target_class = identifier(map, path)?;

    let criteria_path = format!("{}.{}", path, CRITERIA_KEY);
    let criteria = match map.get(CRITERIA_KEY) {
        None => return Err(shape(path, format!("missing '{}'", CRITERIA_KEY))),
        Some(Value::Object(criteria)) if !criteria.is_empty() => criteria
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Criteria>(),
        Some(_) => {
            return Err(shape(criteria_path, "criteria must be a non-empty mapping"));
        }
    };

    let field = match map.get(FIELD_KEY) {
        None => None,
        Some(Value::String(field)) if !field.is_empty() => Some(field.clone()),
        Some(_) => {
            return Err(shape(
                format!("{}.{}", path, FIELD_KEY),
                "field must be a non-empty string",
            ));
        }
    };

    Ok(ReferenceDescription {
        target_class,
        criteria,
        field,
    })
}

fn identifier(map: &Map<String, Value>, path: &str) -> Result<String> {
    match map.get(TARGET_CLASS_KEY) {
        Some(Value::String(identifier)) if !identifier.trim().is_empty() => {
            Ok(identifier.clone())
        }
        Some(_) => Err(shape(
            format!("{}.{}", path, TARGET_CLASS_KEY),
            "target_class must be a non-empty string",
        )),
        None => Err(shape(path, format!("missing '{}'", TARGET_CLASS_KEY))),
    }
}

fn shape(path: impl AsRef<str>, message: impl Into<String>) -> SeedError {
    SeedError::Shape {
        path: path.as_ref().to_string(),
        message: message.into(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
