//! Neo4j connection management and the Bolt-backed driver.

use async_trait::async_trait;
use neo4rs::{
    BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Neo4jClientErrorKind,
    Neo4jErrorKind, Neo4jSecurityErrorKind, Query, Txn,
};
use serde::Deserialize;
use serde_json::Value;
use strand_core::config::Neo4jSettings;
use strand_core::{DriverError, DriverErrorKind, Properties, Result};
use strand_cypher::Statement;

use crate::driver::{Driver, Record, ResultSummary, RollbackHook, RollbackHooks, Transaction};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
    /// Database used when a call does not name one.
    #[serde(default)]
    pub database: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Neo4jSettings::default().into()
    }
}

impl From<Neo4jSettings> for GraphConfig {
    fn from(settings: Neo4jSettings) -> Self {
        Self {
            uri: settings.uri,
            user: settings.user,
            password: settings.password,
            max_connections: settings.max_connections,
            fetch_size: settings.fetch_size,
            database: (!settings.database.is_empty()).then_some(settings.database),
        }
    }
}

/// Thread-safe Neo4j client with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    default_database: Option<String>,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(classify)?;

        let graph = Graph::connect(neo_config).await.map_err(classify)?;

        tracing::info!(uri = %config.uri, database = ?config.database, "Connected to Neo4j");
        Ok(Self {
            graph,
            default_database: config.database.clone(),
        })
    }

    /// The underlying neo4rs graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl Driver for GraphClient {
    async fn begin(&self, database: Option<&str>) -> Result<Box<dyn Transaction>> {
        let database = database.or(self.default_database.as_deref());
        let txn = match database {
            Some(name) => self.graph.start_txn_on(name).await,
            None => self.graph.start_txn().await,
        }
        .map_err(classify)?;

        tracing::debug!(database = ?database, "Began Neo4j transaction");
        Ok(Box::new(Neo4jTransaction {
            txn,
            hooks: RollbackHooks::default(),
        }))
    }
}

/// An open Bolt transaction.
pub struct Neo4jTransaction {
    txn: Txn,
    hooks: RollbackHooks,
}

#[async_trait]
impl Transaction for Neo4jTransaction {
    /// Bolt does not hand back update counters through this client; the
    /// returned summary is always empty.
    async fn run(&mut self, statement: &Statement) -> Result<ResultSummary> {
        self.txn.run(to_query(statement)).await.map_err(classify)?;
        Ok(ResultSummary::default())
    }

    async fn fetch(&mut self, statement: &Statement) -> Result<Vec<Record>> {
        let mut stream = self
            .txn
            .execute(to_query(statement))
            .await
            .map_err(classify)?;

        let mut records = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await.map_err(classify)? {
            let record: Properties = row
                .to()
                .map_err(|e| DriverError::permanent(format!("Unreadable result row: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    fn on_rollback(&mut self, hook: RollbackHook) {
        self.hooks.push(hook);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Neo4jTransaction { txn, hooks } = *self;
        // A failed commit drops the hooks, which runs them.
        txn.commit().await.map_err(classify)?;
        hooks.discard();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let Neo4jTransaction { txn, hooks } = *self;
        drop(hooks);
        txn.rollback().await.map_err(classify)?;
        Ok(())
    }
}

// ── Conversion helpers ───────────────────────────────────────────

fn to_query(statement: &Statement) -> Query {
    statement
        .parameters()
        .iter()
        .fold(neo4rs::query(statement.cypher()), |q, (name, value)| {
            q.param(name, to_bolt(value))
        })
}

/// Convert a JSON parameter value into its Bolt counterpart.
pub fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => BoltType::from(s.clone()),
        Value::Array(items) => BoltType::List(BoltList {
            value: items.iter().map(to_bolt).collect(),
        }),
        Value::Object(map) => BoltType::Map(BoltMap {
            value: map
                .iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v)))
                .collect(),
        }),
    }
}

/// Map a neo4rs error onto the driver error taxonomy.
fn classify(err: neo4rs::Error) -> DriverError {
    let kind = match &err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => DriverErrorKind::Transient,
        neo4rs::Error::AuthenticationError(_) => DriverErrorKind::AccessDenied,
        neo4rs::Error::Neo4j(server) => kind_of(server.kind()),
        _ => DriverErrorKind::Permanent,
    };
    DriverError::new(kind, err.to_string())
}

/// Classify a server failure by its status code (`Neo.TransientError.*`,
/// `Neo.ClientError.Security.*`, ...).
fn kind_of(kind: Neo4jErrorKind) -> DriverErrorKind {
    match kind {
        Neo4jErrorKind::Transient
        | Neo4jErrorKind::Client(Neo4jClientErrorKind::SessionExpired)
        | Neo4jErrorKind::Client(Neo4jClientErrorKind::Security(
            Neo4jSecurityErrorKind::AuthorizationExpired,
        )) => DriverErrorKind::Transient,
        Neo4jErrorKind::Client(Neo4jClientErrorKind::Security(_)) => DriverErrorKind::AccessDenied,
        _ => DriverErrorKind::Permanent,
    }
}
