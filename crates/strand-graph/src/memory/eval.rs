//! Evaluation of condition trees against stored nodes.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;
use strand_core::value::compare_values;
use strand_core::{DriverError, Properties, Result};
use strand_cypher::{Condition, Expression, Operator};

use super::graph::StoredNode;

/// The node a condition is evaluated against, plus the statement parameters.
pub(crate) struct Scope<'a> {
    pub id: i64,
    pub node: &'a StoredNode,
    pub parameters: &'a Properties,
}

impl Scope<'_> {
    pub fn test(&self, condition: &Condition) -> Result<bool> {
        Ok(match condition {
            Condition::Comparison {
                left,
                operator,
                right,
            } => {
                let left = self.value_of(left)?;
                let right = self.value_of(right)?;
                compare(&left, *operator, &right)?
            }
            Condition::IsNull(expression) => self.value_of(expression)?.is_null(),
            Condition::And(parts) => {
                for part in parts {
                    if !self.test(part)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Or(parts) => {
                for part in parts {
                    if self.test(part)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(inner) => !self.test(inner)?,
        })
    }

    pub fn value_of(&self, expression: &Expression) -> Result<Value> {
        Ok(match expression {
            Expression::Property(name) => self
                .node
                .properties
                .get(name)
                .cloned()
                .unwrap_or(Value::Null),
            Expression::InternalId => Value::from(self.id),
            Expression::Parameter(name) => parameter(self.parameters, name)?.clone(),
            Expression::ToLower(inner) => match self.value_of(inner)? {
                Value::String(s) => Value::String(s.to_lowercase()),
                _ => Value::Null,
            },
        })
    }
}

/// A required statement parameter.
pub(crate) fn parameter<'a>(parameters: &'a Properties, name: &str) -> Result<&'a Value> {
    parameters.get(name).ok_or_else(|| {
        DriverError::permanent(format!("Expected parameter(s): {name}")).into()
    })
}

/// Equality with numeric widening; null never equals anything.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

fn compare(left: &Value, operator: Operator, right: &Value) -> Result<bool> {
    Ok(match (operator, left, right) {
        (Operator::Equals, _, _) => values_equal(left, right),
        (Operator::In, _, Value::Array(items)) => items.iter().any(|item| values_equal(left, item)),
        (Operator::Contains, Value::String(l), Value::String(r)) => l.contains(r.as_str()),
        (Operator::StartsWith, Value::String(l), Value::String(r)) => l.starts_with(r.as_str()),
        (Operator::EndsWith, Value::String(l), Value::String(r)) => l.ends_with(r.as_str()),
        (Operator::Matches, Value::String(l), Value::String(pattern)) => {
            // `=~` must match the whole string.
            let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                DriverError::permanent(format!("Invalid regular expression {pattern}: {e}"))
            })?;
            regex.is_match(l)
        }
        _ => false,
    })
}
