//! Rendered statements and the structured plan they were rendered from.

use std::fmt;

use serde_json::Value;
use strand_core::schema::Direction;
use strand_core::Properties;

use crate::condition::{escape_name, Condition};
use crate::sort::Order;

/// A Cypher statement with its bound parameters.
///
/// Statements produced by the generator also carry the [`Operation`] they
/// were rendered from, so drivers that do not speak Cypher can still execute
/// them. Hand-written statements have no operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    cypher: String,
    parameters: Properties,
    operation: Option<Operation>,
}

impl Statement {
    /// A hand-written statement.
    pub fn raw(cypher: impl Into<String>) -> Self {
        Self {
            cypher: cypher.into(),
            parameters: Properties::new(),
            operation: None,
        }
    }

    pub(crate) fn planned(cypher: String, operation: Operation) -> Self {
        Self {
            cypher,
            parameters: Properties::new(),
            operation: Some(operation),
        }
    }

    pub fn cypher(&self) -> &str {
        &self.cypher
    }

    pub fn parameters(&self) -> &Properties {
        &self.parameters
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_parameter(name, value);
        self
    }

    pub fn bind_all(mut self, parameters: Properties) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) {
        self.parameters.insert(name.to_string(), value.into());
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cypher)
    }
}

/// How a node is located: by engine id or by a stored id property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKey {
    InternalId,
    Property(String),
}

impl NodeKey {
    pub(crate) fn render(&self, node: &str) -> String {
        match self {
            NodeKey::InternalId => format!("id({node})"),
            NodeKey::Property(name) => format!("{node}.{}", escape_name(name)),
        }
    }
}

/// What a node match returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// One row per node, the node under `n` with its properties plus
    /// `__internal_id__` and `__labels__`.
    Nodes,
    /// A single row with `count`.
    Count,
}

/// The structured form of a generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    MatchNodes {
        labels: Vec<String>,
        condition: Option<Condition>,
        /// Graph property names.
        orders: Vec<Order>,
        /// Skip and limit are bound as `__skip__` and `__limit__`.
        paged: bool,
        projection: Projection,
    },
    /// Create or update one node; binds `__id__`, `__properties__` and,
    /// when versioned, `__version__`. Returns `__internal_id__`, or no row
    /// when the version check fails.
    SaveNode {
        labels: Vec<String>,
        key: NodeKey,
        version_property: Option<String>,
        dynamic_labels: DynamicLabels,
    },
    /// Merge every row of `__entities__` on the id property. Returns one row
    /// per entity with `__id__` and `__internal_id__`.
    SaveNodes {
        labels: Vec<String>,
        id_property: String,
    },
    /// Detach-delete the matching nodes. Returns `count`.
    DeleteNodes {
        labels: Vec<String>,
        condition: Option<Condition>,
    },
    /// Merge a relationship between the nodes with internal ids `fromId`
    /// and `toId`, setting `__properties__` when `with_properties`.
    CreateRelationship {
        relationship_type: String,
        direction: Direction,
        with_properties: bool,
    },
    /// Delete the owner's relationships of one type (any type when `None`)
    /// that lead to nodes labelled `target_label`.
    RemoveRelationships {
        owner_label: String,
        relationship_type: Option<String>,
        direction: Direction,
        target_label: String,
    },
    /// Read the labels of one node that are not in `__staticLabels__`.
    ReadDynamicLabels {
        label: String,
        key: NodeKey,
        version_property: Option<String>,
    },
}

/// Label changes applied to a node while saving it: first the old labels
/// are removed, then the new ones are added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicLabels {
    old_labels: Vec<String>,
    new_labels: Vec<String>,
}

impl DynamicLabels {
    pub fn new(old_labels: Vec<String>, new_labels: Vec<String>) -> Self {
        Self {
            old_labels,
            new_labels,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn old_labels(&self) -> &[String] {
        &self.old_labels
    }

    pub fn new_labels(&self) -> &[String] {
        &self.new_labels
    }

    pub fn is_empty(&self) -> bool {
        self.old_labels.is_empty() && self.new_labels.is_empty()
    }

    /// Render as ` REMOVE n:A SET n:B`, or nothing.
    pub(crate) fn decorate(&self, node: &str) -> String {
        let mut out = String::new();
        if !self.old_labels.is_empty() {
            out.push_str(&format!(" REMOVE {node}{}", label_expression(&self.old_labels)));
        }
        if !self.new_labels.is_empty() {
            out.push_str(&format!(" SET {node}{}", label_expression(&self.new_labels)));
        }
        out
    }
}

/// `:A:B` for a label list.
pub(crate) fn label_expression(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!(":{}", escape_name(l)))
        .collect()
}
