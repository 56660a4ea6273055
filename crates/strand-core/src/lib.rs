//! strand-core: shared types, configuration, and error handling for Strand.
//!
//! This crate provides the foundational types used across all Strand components:
//! - The in-memory entity model (shared, possibly cyclic object graphs)
//! - Schema declarations and validated entity descriptors
//! - Configuration management
//! - Common error types

pub mod config;
pub mod entity;
pub mod error;
pub mod schema;
pub mod value;

pub use config::StrandConfig;
pub use entity::{AssociationValue, EntityIdentity, EntityRef, RelatedValue};
pub use error::{DriverError, DriverErrorKind, Error, Result};
pub use schema::{
    AssociationDescriptor, AssociationSchema, Direction, EntityDescriptor, EntitySchema,
    GraphEntity, IdStrategy, MappingContext,
};
pub use value::{Properties, PropertyKind};
