//! The driver boundary: everything the persistence engine needs from a
//! graph database.

use std::fmt;

use async_trait::async_trait;
use strand_core::{Properties, Result};
use strand_cypher::Statement;

/// One result row, keyed by column name.
pub type Record = Properties;

/// Update counters reported for one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
}

impl ResultSummary {
    pub fn contains_updates(&self) -> bool {
        *self != Self::default()
    }

    /// Add another summary's counters to this one.
    pub fn merge(&mut self, other: &ResultSummary) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
        self.properties_set += other.properties_set;
        self.labels_added += other.labels_added;
        self.labels_removed += other.labels_removed;
    }
}

/// Work to undo on the caller's side when a transaction does not commit.
pub type RollbackHook = Box<dyn FnOnce() + Send>;

/// Rollback hooks registered on one transaction.
///
/// Hooks run in reverse registration order when the set is dropped, which
/// covers both an explicit rollback and a transaction dropped without
/// committing. A successful commit calls [`RollbackHooks::discard`].
#[derive(Default)]
pub struct RollbackHooks(Vec<RollbackHook>);

impl RollbackHooks {
    pub fn push(&mut self, hook: RollbackHook) {
        self.0.push(hook);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Forget every hook without running it.
    pub fn discard(mut self) {
        self.0.clear();
    }
}

impl Drop for RollbackHooks {
    fn drop(&mut self) {
        while let Some(hook) = self.0.pop() {
            hook();
        }
    }
}

impl fmt::Debug for RollbackHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RollbackHooks").field(&self.0.len()).finish()
    }
}

/// Opens transactions against a database.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Begin a transaction on `database`, or on the server default when `None`.
    async fn begin(&self, database: Option<&str>) -> Result<Box<dyn Transaction>>;
}

/// A unit of work. Dropping a transaction without committing discards it.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a statement for its side effects.
    async fn run(&mut self, statement: &Statement) -> Result<ResultSummary>;

    /// Execute a statement and collect its rows.
    async fn fetch(&mut self, statement: &Statement) -> Result<Vec<Record>>;

    /// Register work to run if this transaction rolls back or is dropped
    /// without committing.
    fn on_rollback(&mut self, hook: RollbackHook);

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
