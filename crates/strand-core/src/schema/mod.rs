//! Schema descriptors: what the persistence engine knows about each entity type.

pub mod context;
pub mod descriptor;
pub mod id;

pub use context::{GraphEntity, MappingContext};
pub use descriptor::{
    AssociationDescriptor, AssociationKey, AssociationSchema, Cardinality, Direction,
    EntityDescriptor, EntitySchema, IdDescriptor, PropertyDescriptor,
};
pub use id::{IdGenerator, IdStrategy, UuidGenerator};
