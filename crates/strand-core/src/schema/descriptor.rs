//! Entity schemas (what the application declares) and entity descriptors
//! (the validated metadata the persistence engine works from).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::entity::EntityRef;
use crate::schema::id::IdStrategy;
use crate::value::{Properties, PropertyKind};

// ── Declarations ─────────────────────────────────────────────────

/// Direction of a relationship as seen from the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
    Undirected,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Undirected => Direction::Undirected,
        }
    }
}

/// Shape of the value held by an association field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Single,
    Collection,
    /// Map keyed by relationship type; the declared type is only a fallback.
    Dynamic,
}

/// Declaration of one scalar property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Name of the field on the entity.
    pub field_name: String,
    /// Name of the property on the node.
    pub property_name: String,
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    pub fn new(field_name: impl Into<String>, kind: PropertyKind) -> Self {
        let field_name = field_name.into();
        Self {
            property_name: field_name.clone(),
            field_name,
            kind,
        }
    }
}

/// Declaration of the id field.
#[derive(Debug, Clone)]
pub struct IdDescriptor {
    pub field_name: String,
    /// Graph property holding the id. `None` for internal ids.
    pub property_name: Option<String>,
    pub strategy: IdStrategy,
    pub kind: PropertyKind,
    /// Primitive ids cannot represent "unset".
    pub primitive: bool,
}

/// Declaration of an association field, built fluently.
#[derive(Debug, Clone)]
pub struct AssociationSchema {
    pub field_name: String,
    pub relationship_type: String,
    pub direction: Direction,
    pub target: String,
    pub cardinality: Cardinality,
    pub has_properties: bool,
}

impl AssociationSchema {
    pub fn outgoing(field_name: &str, relationship_type: &str, target: &str) -> Self {
        Self::new(field_name, relationship_type, target, Direction::Outgoing)
    }

    pub fn incoming(field_name: &str, relationship_type: &str, target: &str) -> Self {
        Self::new(field_name, relationship_type, target, Direction::Incoming)
    }

    pub fn undirected(field_name: &str, relationship_type: &str, target: &str) -> Self {
        Self::new(field_name, relationship_type, target, Direction::Undirected)
    }

    fn new(field_name: &str, relationship_type: &str, target: &str, direction: Direction) -> Self {
        Self {
            field_name: field_name.to_string(),
            relationship_type: relationship_type.to_string(),
            direction,
            target: target.to_string(),
            cardinality: Cardinality::Collection,
            has_properties: false,
        }
    }

    pub fn single(mut self) -> Self {
        self.cardinality = Cardinality::Single;
        self
    }

    pub fn many(mut self) -> Self {
        self.cardinality = Cardinality::Collection;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.cardinality = Cardinality::Dynamic;
        self
    }

    pub fn with_properties(mut self) -> Self {
        self.has_properties = true;
        self
    }
}

/// Everything an application declares about one entity type.
///
/// ```
/// use strand_core::schema::{AssociationSchema, EntitySchema, IdStrategy};
/// use strand_core::value::PropertyKind;
///
/// let person = EntitySchema::new("Person")
///     .id("id", IdStrategy::Internal)
///     .property("name", PropertyKind::String)
///     .association(AssociationSchema::outgoing("friends", "FRIEND_OF", "Person"));
/// assert_eq!(person.primary_label(), "Person");
/// ```
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub type_name: String,
    pub labels: Vec<String>,
    pub ids: Vec<IdDescriptor>,
    pub versions: Vec<PropertyDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub associations: Vec<AssociationSchema>,
    pub dynamic_labels: Option<String>,
}

impl EntitySchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            labels: Vec::new(),
            ids: Vec::new(),
            versions: Vec::new(),
            properties: Vec::new(),
            associations: Vec::new(),
            dynamic_labels: None,
        }
    }

    /// Add a label. The first label becomes the primary label; without any,
    /// the type name is used.
    pub fn label(mut self, label: &str) -> Self {
        self.labels.push(label.to_string());
        self
    }

    pub fn id(self, field_name: &str, strategy: IdStrategy) -> Self {
        self.push_id(field_name, strategy, false)
    }

    /// Declare an id field that cannot be unset.
    pub fn primitive_id(self, field_name: &str, strategy: IdStrategy) -> Self {
        self.push_id(field_name, strategy, true)
    }

    fn push_id(mut self, field_name: &str, strategy: IdStrategy, primitive: bool) -> Self {
        let (property_name, kind) = match strategy {
            IdStrategy::Internal => (None, PropertyKind::Integer),
            IdStrategy::Assigned => (Some(field_name.to_string()), PropertyKind::Any),
            IdStrategy::Generated(_) => (Some(field_name.to_string()), PropertyKind::String),
        };
        self.ids.push(IdDescriptor {
            field_name: field_name.to_string(),
            property_name,
            strategy,
            kind,
            primitive,
        });
        self
    }

    pub fn property(mut self, field_name: &str, kind: PropertyKind) -> Self {
        self.properties.push(PropertyDescriptor::new(field_name, kind));
        self
    }

    /// Declare a property stored under a different graph property name.
    pub fn property_named(mut self, field_name: &str, property_name: &str, kind: PropertyKind) -> Self {
        self.properties.push(PropertyDescriptor {
            field_name: field_name.to_string(),
            property_name: property_name.to_string(),
            kind,
        });
        self
    }

    pub fn version(mut self, field_name: &str) -> Self {
        self.versions
            .push(PropertyDescriptor::new(field_name, PropertyKind::Integer));
        self
    }

    pub fn dynamic_labels(mut self, field_name: &str) -> Self {
        self.dynamic_labels = Some(field_name.to_string());
        self
    }

    pub fn association(mut self, association: AssociationSchema) -> Self {
        self.associations.push(association);
        self
    }

    pub fn primary_label(&self) -> &str {
        self.labels.first().map_or(self.type_name.as_str(), String::as_str)
    }
}

// ── Descriptors ──────────────────────────────────────────────────

/// Identifies an association by owner type and field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationKey {
    pub owner: String,
    pub field_name: String,
}

impl fmt::Display for AssociationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.field_name)
    }
}

/// Validated metadata for one relationship field.
#[derive(Debug, Clone)]
pub struct AssociationDescriptor {
    pub key: AssociationKey,
    pub relationship_type: String,
    pub direction: Direction,
    pub target: String,
    pub cardinality: Cardinality,
    pub has_properties: bool,
    /// The association on the target type describing the same relationship
    /// from the other end.
    pub obverse: Option<AssociationKey>,
}

impl AssociationDescriptor {
    pub fn field_name(&self) -> &str {
        &self.key.field_name
    }

    pub fn is_dynamic(&self) -> bool {
        self.cardinality == Cardinality::Dynamic
    }

    /// Path segment used in error messages, e.g. `Person.friends -> Person`.
    pub fn path(&self) -> String {
        format!("{} -> {}", self.key, self.target)
    }
}

/// Validated metadata for one entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub type_name: String,
    pub labels: Vec<String>,
    pub id: IdDescriptor,
    pub version: Option<PropertyDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub associations: Vec<Arc<AssociationDescriptor>>,
    pub dynamic_labels: Option<String>,
}

impl EntityDescriptor {
    pub fn primary_label(&self) -> &str {
        &self.labels[0]
    }

    pub fn additional_labels(&self) -> &[String] {
        &self.labels[1..]
    }

    pub fn is_using_internal_ids(&self) -> bool {
        self.id.strategy.is_internal()
    }

    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }

    /// Batched UNWIND saves cannot check versions, key rows by internal id
    /// or decorate individual nodes with dynamic labels.
    pub fn supports_batch_save(&self) -> bool {
        !self.is_using_internal_ids() && !self.has_version() && self.dynamic_labels.is_none()
    }

    pub fn association(&self, field_name: &str) -> Option<&Arc<AssociationDescriptor>> {
        self.associations
            .iter()
            .find(|a| a.field_name() == field_name)
    }

    pub fn property(&self, field_name: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .chain(self.version.iter())
            .find(|p| p.field_name == field_name)
    }

    /// Graph property name for the id, if it is stored as a property.
    pub fn id_property_name(&self) -> Option<&str> {
        self.id.property_name.as_deref()
    }

    pub fn id_value(&self, entity: &EntityRef) -> Option<Value> {
        entity.get(&self.id.field_name)
    }

    pub fn version_value(&self, entity: &EntityRef) -> Option<i64> {
        self.version
            .as_ref()
            .and_then(|v| entity.get(&v.field_name))
            .and_then(|v| v.as_i64())
    }

    /// Whether the instance has never been persisted.
    ///
    /// Versioned entities are new while their version is unset; all others
    /// while their id is unset.
    pub fn is_new(&self, entity: &EntityRef) -> bool {
        match &self.version {
            Some(version) => entity.get(&version.field_name).is_none(),
            None => self.id_value(entity).is_none(),
        }
    }

    /// Node properties for `entity`, keyed by graph property name.
    ///
    /// Includes the id property for non-internal ids and the version. Never
    /// includes associations or the dynamic-labels field.
    pub fn bind_properties(&self, entity: &EntityRef) -> Properties {
        let fields = entity.fields();
        let mut bound = Properties::new();

        if let Some(id_property) = &self.id.property_name {
            let value = fields.get(&self.id.field_name).cloned().unwrap_or(Value::Null);
            bound.insert(id_property.clone(), value);
        }
        for property in self.properties.iter().chain(self.version.iter()) {
            let value = fields
                .get(&property.field_name)
                .cloned()
                .unwrap_or(Value::Null);
            bound.insert(property.property_name.clone(), value);
        }
        bound
    }

    /// Copy node properties from a result row back onto an entity.
    pub fn hydrate(&self, entity: &EntityRef, node: &Properties) {
        if let Some(id_property) = &self.id.property_name {
            if let Some(v) = node.get(id_property) {
                entity.set(&self.id.field_name, v.clone());
            }
        }
        for property in self.properties.iter().chain(self.version.iter()) {
            if let Some(v) = node.get(&property.property_name) {
                entity.set(&property.field_name, v.clone());
            }
        }
    }

    /// Labels that come from the schema rather than a dynamic-labels field.
    pub fn static_labels(&self) -> &[String] {
        &self.labels
    }
}
