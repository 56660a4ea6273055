//! Id strategies and generators.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::entity::EntityRef;

/// Produces ids for entities using [`IdStrategy::Generated`].
pub trait IdGenerator: fmt::Debug + Send + Sync {
    fn generate_id(&self, primary_label: &str, entity: &EntityRef) -> Value;
}

/// Random (v4) UUIDs rendered as strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate_id(&self, _primary_label: &str, _entity: &EntityRef) -> Value {
        Value::String(Uuid::new_v4().to_string())
    }
}

/// How an entity's identity is established.
#[derive(Debug, Clone)]
pub enum IdStrategy {
    /// Assigned by the graph engine, exposed through `id(n)`.
    Internal,
    /// Supplied by the application and stored as an ordinary property.
    Assigned,
    /// Produced by a generator before the first save and stored as a property.
    Generated(Arc<dyn IdGenerator>),
}

impl IdStrategy {
    pub fn uuid() -> Self {
        IdStrategy::Generated(Arc::new(UuidGenerator))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, IdStrategy::Internal)
    }
}

impl fmt::Display for IdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdStrategy::Internal => f.write_str("internal"),
            IdStrategy::Assigned => f.write_str("assigned"),
            IdStrategy::Generated(_) => f.write_str("generated"),
        }
    }
}
