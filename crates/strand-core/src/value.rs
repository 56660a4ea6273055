//! Property values as they travel between entities, statements and drivers.

use serde_json::{Map, Value};

/// String-keyed property map, used for node properties, relationship
/// properties, statement parameters and result rows alike.
pub type Properties = Map<String, Value>;

/// Scalar kinds a property can hold. Used by the predicate builder to decide
/// which properties take string matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
    Any,
}

impl PropertyKind {
    /// Whether `value` is acceptable for a property of this kind. `Null` is always accepted.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (PropertyKind::Any, _) => true,
            (PropertyKind::String, Value::String(_)) => true,
            (PropertyKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (PropertyKind::Float, Value::Number(_)) => true,
            (PropertyKind::Boolean, Value::Bool(_)) => true,
            (PropertyKind::List, Value::Array(_)) => true,
            (PropertyKind::Map, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Render a value for log and error messages.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total order over JSON values used for sorting result rows.
///
/// Nulls sort last, mirroring Cypher's `ORDER BY` behavior.
pub fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or(f64::NAN)
                    .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
