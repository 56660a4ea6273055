//! An in-process graph that executes generated statements.
//!
//! Each database is a [`GraphState`] behind an async mutex. A transaction
//! holds the lock for its whole lifetime and works on a snapshot; commit
//! writes the snapshot back, rollback or drop discards it. Transactions on
//! the same database are therefore serialized: beginning a second
//! transaction on a database while one is open waits for the lock, and
//! fails with a transient error once the lock timeout elapses.

mod eval;
mod graph;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use strand_core::{DriverError, Result};
use strand_cypher::Statement;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub use graph::{GraphState, StoredNode, StoredRelationship};

use crate::driver::{Driver, Record, ResultSummary, RollbackHook, RollbackHooks, Transaction};

/// Name used when no database is selected.
pub const DEFAULT_DATABASE: &str = "neo4j";

/// How long `begin` waits for another transaction on the same database.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

type SharedGraph = Arc<AsyncMutex<GraphState>>;

/// In-memory driver. Clone is cheap and clones share the same databases.
#[derive(Clone)]
pub struct MemoryDriver {
    databases: Arc<Mutex<HashMap<String, SharedGraph>>>,
    lock_timeout: Duration,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self {
            databases: Arc::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the wait for a database held by another open transaction.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// A copy of the committed state of a database.
    pub async fn snapshot(&self, database: Option<&str>) -> GraphState {
        let graph = self.graph(database);
        let state = graph.lock().await;
        state.clone()
    }

    fn graph(&self, database: Option<&str>) -> SharedGraph {
        let name = database.unwrap_or(DEFAULT_DATABASE);
        let mut databases = self.databases.lock();
        Arc::clone(databases.entry(name.to_string()).or_default())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn begin(&self, database: Option<&str>) -> Result<Box<dyn Transaction>> {
        let name = database.unwrap_or(DEFAULT_DATABASE);
        let guard = tokio::time::timeout(self.lock_timeout, self.graph(database).lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(database = %name, timeout = ?self.lock_timeout, "Timed out waiting for transaction lock");
                DriverError::transient(format!(
                    "Timed out after {:?} waiting for another transaction on database `{name}`",
                    self.lock_timeout
                ))
            })?;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            database: name.to_string(),
            guard,
            working,
            hooks: RollbackHooks::default(),
        }))
    }
}

pub struct MemoryTransaction {
    database: String,
    guard: OwnedMutexGuard<GraphState>,
    working: GraphState,
    hooks: RollbackHooks,
}

impl MemoryTransaction {
    fn execute(&mut self, statement: &Statement) -> Result<(Vec<Record>, ResultSummary)> {
        let operation = statement.operation().ok_or_else(|| {
            DriverError::permanent(format!(
                "The in-memory driver only executes generated statements: {}",
                statement.cypher()
            ))
        })?;
        let (rows, summary) = self.working.execute(operation, statement.parameters())?;
        tracing::debug!(
            database = %self.database,
            rows = rows.len(),
            nodes_created = summary.nodes_created,
            nodes_deleted = summary.nodes_deleted,
            relationships_created = summary.relationships_created,
            relationships_deleted = summary.relationships_deleted,
            "Executed statement in memory"
        );
        Ok((rows, summary))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn run(&mut self, statement: &Statement) -> Result<ResultSummary> {
        self.execute(statement).map(|(_, summary)| summary)
    }

    async fn fetch(&mut self, statement: &Statement) -> Result<Vec<Record>> {
        self.execute(statement).map(|(rows, _)| rows)
    }

    fn on_rollback(&mut self, hook: RollbackHook) {
        self.hooks.push(hook);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            mut guard,
            working,
            hooks,
            ..
        } = *self;
        *guard = working;
        hooks.discard();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!(database = %self.database, "Discarded in-memory transaction");
        Ok(())
    }
}
