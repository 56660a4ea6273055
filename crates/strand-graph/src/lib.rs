//! strand-graph: the driver boundary of Strand.
//!
//! The persistence engine only talks to [`Driver`] and [`Transaction`].
//! [`GraphClient`] implements them over Bolt with `neo4rs`; [`MemoryDriver`]
//! executes the structured form of generated statements against an
//! in-process graph.

pub mod client;
pub mod driver;
pub mod memory;

pub use client::{GraphClient, GraphConfig, Neo4jTransaction};
pub use driver::{Driver, Record, ResultSummary, RollbackHook, RollbackHooks, Transaction};
pub use memory::{GraphState, MemoryDriver, MemoryTransaction};
