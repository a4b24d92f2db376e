//! # Entity Builder
//!
//! Instantiates one entity per entity-data node and assigns its plain
//! fields. References are left to the [`ReferenceResolver`](crate::resolver::ReferenceResolver);
//! registration into the run index is the seeder's last step per entity.

use crate::class::ClassResolver;
use crate::document::EntityData;
use crate::types::{EntityRef, FieldValue, Location, Result, SeedError};
use tracing::debug;

/// Builds bare entities through a class resolver.
pub struct EntityBuilder<'a> {
    classes: &'a dyn ClassResolver,
}

impl<'a> EntityBuilder<'a> {
    /// Create a builder resolving classes through `classes`.
    #[must_use]
    pub fn new(classes: &'a dyn ClassResolver) -> Self {
        Self { classes }
    }

    /// Construct an instance of `target_class` with every plain field of
    /// `data` assigned, in declaration order.
    ///
    /// # Errors
    ///
    /// - `ClassResolution` when `target_class` does not resolve
    /// - `FieldAssignment` when the instance rejects a field
    pub fn build(&self, data: &EntityData, target_class: &str, at: &Location) -> Result<EntityRef> {
        let class = self
            .classes
            .resolve(target_class)
            .map_err(|e| e.with_location(at))?;
        let entity = EntityRef::construct(&class);

        for (field, value) in &data.fields {
            entity
                .set(field, FieldValue::Literal(value.clone()))
                .map_err(|reason| SeedError::FieldAssignment {
                    class: class.path(),
                    field: field.clone(),
                    reason,
                    location: at.with_field(field),
                })?;
        }

        debug!(
            class = %class.path(),
            fields = data.fields.len(),
            references = data.references.len(),
            "built entity"
        );
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassRegistry;
    use crate::record::ClassDef;
    use serde_json::json;

    fn registry() -> ClassRegistry {
        let registry = ClassRegistry::with_catalog([ClassDef::new("geo", "Country")
            .with_fields(["name", "short"])
            .into_class()]);
        registry.register("geo").expect("register");
        registry
    }

    fn data(fields: &[(&str, serde_json::Value)]) -> EntityData {
        EntityData {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..EntityData::default()
        }
    }

    #[test]
    fn plain_fields_are_assigned() {
        let registry = registry();
        let builder = EntityBuilder::new(&registry);
        let entity = builder
            .build(
                &data(&[("name", json!("United Kingdom")), ("short", json!("UK"))]),
                "Country",
                &Location::entity(0, 0),
            )
            .expect("build");

        assert_eq!(entity.class_path(), "geo:Country");
        assert_eq!(
            entity.fields(),
            vec![
                ("name".to_string(), json!("United Kingdom").into()),
                ("short".to_string(), json!("UK").into()),
            ]
        );
    }

    #[test]
    fn unknown_field_names_the_field() {
        let registry = registry();
        let builder = EntityBuilder::new(&registry);
        let err = builder
            .build(&data(&[("population", json!(1))]), "Country", &Location::entity(2, 1))
            .expect_err("should fail");

        let SeedError::FieldAssignment { field, location, .. } = err else {
            unreachable!("expected field assignment error");
        };
        assert_eq!(field, "population");
        assert_eq!(location, Location::entity(2, 1).with_field("population"));
    }

    #[test]
    fn unknown_class_carries_location() {
        let registry = registry();
        let builder = EntityBuilder::new(&registry);
        let err = builder
            .build(&EntityData::default(), "Planet", &Location::entity(3, 0))
            .expect_err("should fail");

        assert!(matches!(err, SeedError::ClassResolution { .. }));
        assert_eq!(err.location(), Some(&Location::entity(3, 0)));
    }
}
