//! The mapping context: registered schemas and the descriptor cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::EntityRef;
use crate::error::{Error, Result};
use crate::schema::descriptor::{
    AssociationDescriptor, AssociationKey, AssociationSchema, Cardinality, EntityDescriptor,
    EntitySchema,
};
use crate::schema::id::IdStrategy;

/// A Rust type with a registered graph schema.
pub trait GraphEntity {
    const TYPE_NAME: &'static str;

    fn schema() -> EntitySchema;
}

/// Registry of entity schemas with a lazily populated descriptor cache.
///
/// Schemas are registered up front. Descriptors are validated and built on
/// first lookup and cached for the lifetime of the context; concurrent
/// lookups of a missing descriptor may both build it, but only the first
/// result is kept.
#[derive(Default)]
pub struct MappingContext {
    schemas: RwLock<HashMap<String, Arc<EntitySchema>>>,
    descriptors: RwLock<HashMap<String, Arc<EntityDescriptor>>>,
}

impl MappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema. Type names and primary labels must be unique.
    pub fn register(&self, schema: EntitySchema) -> Result<()> {
        let mut schemas = self.schemas.write();

        if schemas.contains_key(&schema.type_name) {
            return Err(Error::Mapping(format!(
                "The schema already contains a description of type {}",
                schema.type_name
            )));
        }
        if let Some(existing) = schemas
            .values()
            .find(|s| s.primary_label() == schema.primary_label())
        {
            return Err(Error::Mapping(format!(
                "The schema already contains a node description under the primary label {} (type {})",
                schema.primary_label(),
                existing.type_name
            )));
        }

        tracing::debug!(
            type_name = %schema.type_name,
            label = %schema.primary_label(),
            "Registered entity schema"
        );
        schemas.insert(schema.type_name.clone(), Arc::new(schema));
        Ok(())
    }

    /// Register a typed entity unless it is already known.
    pub fn register_type<T: GraphEntity>(&self) -> Result<()> {
        if self.schemas.read().contains_key(T::TYPE_NAME) {
            return Ok(());
        }
        self.register(T::schema())
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.schemas.read().contains_key(type_name)
    }

    /// Descriptor for a registered type, built and cached on first use.
    pub fn descriptor(&self, type_name: &str) -> Result<Arc<EntityDescriptor>> {
        if let Some(found) = self.descriptors.read().get(type_name) {
            return Ok(Arc::clone(found));
        }

        let built = Arc::new(self.build_descriptor(type_name)?);
        let mut cache = self.descriptors.write();
        let entry = cache
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::clone(&built));
        Ok(Arc::clone(entry))
    }

    /// Like [`descriptor`](Self::descriptor), but unregistered types are `None`.
    pub fn find_descriptor(&self, type_name: &str) -> Result<Option<Arc<EntityDescriptor>>> {
        if !self.is_registered(type_name) {
            return Ok(None);
        }
        self.descriptor(type_name).map(Some)
    }

    /// Descriptor for a typed entity, registering its schema on first use.
    pub fn descriptor_of<T: GraphEntity>(&self) -> Result<Arc<EntityDescriptor>> {
        self.register_type::<T>()?;
        self.descriptor(T::TYPE_NAME)
    }

    pub fn descriptor_for(&self, entity: &EntityRef) -> Result<Arc<EntityDescriptor>> {
        self.descriptor(&entity.type_name())
    }

    /// The obverse association of `association`, if the target declares one.
    pub fn obverse_of(
        &self,
        association: &AssociationDescriptor,
    ) -> Result<Option<Arc<AssociationDescriptor>>> {
        let Some(key) = &association.obverse else {
            return Ok(None);
        };
        let target = self.descriptor(&key.owner)?;
        Ok(target.association(&key.field_name).cloned())
    }

    fn schema(&self, type_name: &str) -> Result<Arc<EntitySchema>> {
        self.schemas
            .read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(type_name.to_string()))
    }

    fn build_descriptor(&self, type_name: &str) -> Result<EntityDescriptor> {
        let schema = self.schema(type_name)?;

        let id = match schema.ids.as_slice() {
            [id] => id.clone(),
            [] => {
                return Err(Error::Mapping(format!(
                    "Missing id property on {type_name}"
                )))
            }
            _ => {
                return Err(Error::Mapping(format!(
                    "Entity {type_name} declares more than one id property"
                )))
            }
        };
        if id.primitive && !matches!(id.strategy, IdStrategy::Assigned) {
            return Err(Error::Mapping(format!(
                "Id {type_name}.{} uses the {} strategy but is primitive and cannot represent an unset id",
                id.field_name, id.strategy
            )));
        }

        if schema.versions.len() > 1 {
            return Err(Error::Mapping(format!(
                "Entity {type_name} declares more than one version property"
            )));
        }

        let mut labels = schema.labels.clone();
        if labels.is_empty() {
            labels.push(schema.type_name.clone());
        }
        if labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::Mapping(format!(
                "Entity {type_name} declares an empty label"
            )));
        }

        let mut seen = HashSet::new();
        let field_names = std::iter::once(&id.field_name)
            .chain(schema.versions.iter().map(|v| &v.field_name))
            .chain(schema.properties.iter().map(|p| &p.field_name))
            .chain(schema.associations.iter().map(|a| &a.field_name))
            .chain(schema.dynamic_labels.iter());
        for field in field_names {
            if !seen.insert(field.as_str()) {
                return Err(Error::Mapping(format!(
                    "Field {type_name}.{field} is declared more than once"
                )));
            }
        }

        let mut associations = Vec::with_capacity(schema.associations.len());
        for declared in &schema.associations {
            let target = self.schema(&declared.target).map_err(|_| {
                Error::Mapping(format!(
                    "Association {type_name}.{} targets unregistered type {}",
                    declared.field_name, declared.target
                ))
            })?;
            associations.push(Arc::new(AssociationDescriptor {
                key: AssociationKey {
                    owner: schema.type_name.clone(),
                    field_name: declared.field_name.clone(),
                },
                relationship_type: declared.relationship_type.clone(),
                direction: declared.direction,
                target: declared.target.clone(),
                cardinality: declared.cardinality,
                has_properties: declared.has_properties,
                obverse: find_obverse(&schema, declared, &target),
            }));
        }

        Ok(EntityDescriptor {
            type_name: schema.type_name.clone(),
            labels,
            id,
            version: schema.versions.first().cloned(),
            properties: schema.properties.clone(),
            associations,
            dynamic_labels: schema.dynamic_labels.clone(),
        })
    }
}

/// The association on `target` with the same relationship type, pointing
/// back at `owner` from the other direction.
///
/// The rule is symmetric, so the obverse of the obverse is the original.
fn find_obverse(
    owner: &EntitySchema,
    declared: &AssociationSchema,
    target: &EntitySchema,
) -> Option<AssociationKey> {
    if declared.cardinality == Cardinality::Dynamic {
        return None;
    }
    target
        .associations
        .iter()
        .find(|candidate| {
            candidate.cardinality != Cardinality::Dynamic
                && candidate.relationship_type == declared.relationship_type
                && candidate.target == owner.type_name
                && candidate.direction == declared.direction.opposite()
                && !(target.type_name == owner.type_name
                    && candidate.field_name == declared.field_name)
        })
        .map(|candidate| AssociationKey {
            owner: target.type_name.clone(),
            field_name: candidate.field_name.clone(),
        })
}
