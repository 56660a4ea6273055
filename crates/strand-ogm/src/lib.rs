//! strand-ogm: object-graph mapping on top of the Strand driver boundary.
//!
//! [`Template`] saves entities together with everything reachable through
//! their associations, loads them back, and deletes them. Saving replaces
//! the persisted relationships of every association with what is currently
//! held in memory. [`Repository`] narrows a template to one typed entity,
//! and [`blocking::BlockingTemplate`] offers the same operations without an
//! async runtime.

pub mod blocking;
pub mod callbacks;
pub mod database;
pub mod nested;
pub mod query;
pub mod repository;
pub mod template;

pub use callbacks::{BeforeBindCallback, EntityCallbacks};
pub use database::{DatabaseSelection, DatabaseSelectionProvider, StaticDatabaseSelection};
pub use nested::{NestedRelationshipContext, ProcessState, ProcessedState};
pub use query::{ExecutableQuery, Page, PreparedQuery, ResultShape, RowMapper};
pub use repository::Repository;
pub use template::Template;
