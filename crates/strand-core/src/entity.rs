//! In-memory domain objects.
//!
//! An [`EntityRef`] is a shared handle to one domain instance. Handles are
//! cheap to clone and compare by identity, which is what lets object graphs
//! contain cycles and lets the persistence engine write generated ids back
//! onto instances that are reachable from several places.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::value::Properties;

/// Identity of an entity instance, stable for the lifetime of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityIdentity(usize);

struct EntityState {
    type_name: String,
    fields: Properties,
    associations: BTreeMap<String, AssociationValue>,
}

/// Shared handle to a domain instance.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<EntityState>>);

impl EntityRef {
    /// Create an empty instance of the given registered entity type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(EntityState {
            type_name: type_name.into(),
            fields: Properties::new(),
            associations: BTreeMap::new(),
        })))
    }

    /// Create an instance whose scalar fields are taken from a serializable value.
    ///
    /// The value must serialize to a map. Nested maps are stored as map-valued fields,
    /// not as associations.
    pub fn from_serde<T: Serialize>(type_name: impl Into<String>, value: &T) -> Result<Self> {
        let entity = Self::new(type_name);
        match serde_json::to_value(value)? {
            Value::Object(fields) => {
                entity.0.write().fields = fields;
                Ok(entity)
            }
            other => Err(Error::Mapping(format!(
                "Entity fields must serialize to a map, got {other}"
            ))),
        }
    }

    /// Deserialize the scalar fields of this instance into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        let fields = self.0.read().fields.clone();
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Builder-style field assignment.
    pub fn with(self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Builder-style association assignment.
    pub fn with_association(self, field: &str, value: AssociationValue) -> Self {
        self.set_association(field, value);
        self
    }

    pub fn type_name(&self) -> String {
        self.0.read().type_name.clone()
    }

    pub fn identity(&self) -> EntityIdentity {
        EntityIdentity(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Value of a scalar field. Absent fields and explicit nulls both read as `None`.
    pub fn get(&self, field: &str) -> Option<Value> {
        match self.0.read().fields.get(field) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        }
    }

    pub fn set(&self, field: &str, value: impl Into<Value>) {
        self.0.write().fields.insert(field.to_string(), value.into());
    }

    pub fn unset(&self, field: &str) {
        self.0.write().fields.remove(field);
    }

    /// Snapshot of all scalar fields.
    pub fn fields(&self) -> Properties {
        self.0.read().fields.clone()
    }

    /// Current value of an association field; unset associations read as empty.
    pub fn association(&self, field: &str) -> AssociationValue {
        self.0
            .read()
            .associations
            .get(field)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_association(&self, field: &str, value: AssociationValue) {
        self.0
            .write()
            .associations
            .insert(field.to_string(), value);
    }

    /// Names of all association fields that have been assigned on this instance.
    pub fn association_fields(&self) -> Vec<String> {
        self.0.read().associations.keys().cloned().collect()
    }

    /// Labels held in a dynamic-labels field.
    pub fn labels_in(&self, field: &str) -> Vec<String> {
        match self.get(field) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Associations are omitted: they may be cyclic.
        let state = self.0.read();
        f.debug_struct("EntityRef")
            .field("type", &state.type_name)
            .field("fields", &state.fields)
            .field("associations", &state.associations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The value of one association field.
#[derive(Debug, Clone, Default)]
pub enum AssociationValue {
    #[default]
    Empty,
    Single(EntityRef),
    Many(Vec<EntityRef>),
    /// Map-valued dynamic relationship: relationship type to targets.
    Dynamic(BTreeMap<String, Vec<EntityRef>>),
    /// Targets paired with the properties stored on the connecting relationship.
    WithProperties(Vec<(EntityRef, Properties)>),
}

/// One normalized element of an association value.
#[derive(Debug, Clone)]
pub struct RelatedValue {
    pub target: EntityRef,
    /// Set for dynamic associations, where the map key is the relationship type.
    pub relationship_type: Option<String>,
    pub properties: Option<Properties>,
}

impl AssociationValue {
    pub fn is_empty(&self) -> bool {
        match self {
            AssociationValue::Empty => true,
            AssociationValue::Single(_) => false,
            AssociationValue::Many(items) => items.is_empty(),
            AssociationValue::Dynamic(map) => map.values().all(Vec::is_empty),
            AssociationValue::WithProperties(items) => items.is_empty(),
        }
    }

    /// Flatten into a uniform list of related values.
    pub fn normalize(&self) -> Vec<RelatedValue> {
        match self {
            AssociationValue::Empty => Vec::new(),
            AssociationValue::Single(target) => vec![RelatedValue::plain(target.clone())],
            AssociationValue::Many(targets) => {
                targets.iter().cloned().map(RelatedValue::plain).collect()
            }
            AssociationValue::Dynamic(map) => map
                .iter()
                .flat_map(|(rel_type, targets)| {
                    targets.iter().map(move |target| RelatedValue {
                        target: target.clone(),
                        relationship_type: Some(rel_type.clone()),
                        properties: None,
                    })
                })
                .collect(),
            AssociationValue::WithProperties(items) => items
                .iter()
                .map(|(target, properties)| RelatedValue {
                    target: target.clone(),
                    relationship_type: None,
                    properties: Some(properties.clone()),
                })
                .collect(),
        }
    }
}

impl RelatedValue {
    fn plain(target: EntityRef) -> Self {
        Self {
            target,
            relationship_type: None,
            properties: None,
        }
    }
}

impl From<EntityRef> for AssociationValue {
    fn from(entity: EntityRef) -> Self {
        AssociationValue::Single(entity)
    }
}

impl From<Option<EntityRef>> for AssociationValue {
    fn from(entity: Option<EntityRef>) -> Self {
        entity.map_or(AssociationValue::Empty, AssociationValue::Single)
    }
}

impl From<Vec<EntityRef>> for AssociationValue {
    fn from(entities: Vec<EntityRef>) -> Self {
        AssociationValue::Many(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: Option<i64>,
    }

    #[test]
    fn serde_round_trip_of_scalar_fields() {
        let alice = Person {
            name: "Alice".to_string(),
            age: Some(42),
        };
        let entity = EntityRef::from_serde("Person", &alice).unwrap();
        assert_eq!(entity.get("name"), Some(json!("Alice")));
        assert_eq!(entity.to_typed::<Person>().unwrap(), alice);
    }

    #[test]
    fn non_map_values_are_rejected() {
        let err = EntityRef::from_serde("Person", &42).unwrap_err();
        assert!(matches!(err, Error::Mapping(_)));
    }

    #[test]
    fn clones_share_identity_and_state() {
        let a = EntityRef::new("Person");
        let b = a.clone();
        b.set("name", "Bob");
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.get("name"), Some(json!("Bob")));
        assert_ne!(a.identity(), EntityRef::new("Person").identity());
    }

    #[test]
    fn null_fields_read_as_absent() {
        let a = EntityRef::new("Person").with("age", Value::Null);
        assert_eq!(a.get("age"), None);
    }

    #[test]
    fn cyclic_graphs_can_be_debug_printed() {
        let a = EntityRef::new("Person");
        let b = EntityRef::new("Person");
        a.set_association("friend", b.clone().into());
        b.set_association("friend", a.clone().into());
        assert!(format!("{a:?}").contains("friend"));
    }

    #[test]
    fn normalization_flattens_every_shape() {
        let x = EntityRef::new("Movie");
        let y = EntityRef::new("Movie");

        assert!(AssociationValue::Empty.normalize().is_empty());
        assert_eq!(AssociationValue::from(x.clone()).normalize().len(), 1);
        assert_eq!(
            AssociationValue::Many(vec![x.clone(), y.clone()]).normalize().len(),
            2
        );

        let mut dynamic = BTreeMap::new();
        dynamic.insert("ACTED_IN".to_string(), vec![x.clone()]);
        dynamic.insert("DIRECTED".to_string(), vec![y.clone(), x.clone()]);
        let related = AssociationValue::Dynamic(dynamic).normalize();
        assert_eq!(related.len(), 3);
        assert_eq!(related[0].relationship_type.as_deref(), Some("ACTED_IN"));

        let mut props = Properties::new();
        props.insert("roles".to_string(), json!(["Neo"]));
        let related = AssociationValue::WithProperties(vec![(x, props)]).normalize();
        assert_eq!(related[0].properties.as_ref().unwrap()["roles"], json!(["Neo"]));
    }

    #[test]
    fn emptiness_of_dynamic_maps_considers_values() {
        let mut dynamic = BTreeMap::new();
        dynamic.insert("LIKES".to_string(), Vec::new());
        assert!(AssociationValue::Dynamic(dynamic).is_empty());
        assert!(AssociationValue::Many(Vec::new()).is_empty());
    }
}
