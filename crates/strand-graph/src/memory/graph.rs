//! The stored graph and the execution of generated operations against it.

use std::cmp::Ordering;

use im::OrdMap;
use serde_json::Value;
use strand_core::schema::Direction;
use strand_core::value::compare_values;
use strand_core::{DriverError, Properties, Result};
use strand_cypher::{
    DynamicLabels, NodeKey, Operation, Order, Projection, SortDirection, FROM_ID_PARAMETER_NAME,
    NAME_OF_COUNT, NAME_OF_ENTITY_LIST_PARAM, NAME_OF_ID, NAME_OF_INTERNAL_ID, NAME_OF_LABELS,
    NAME_OF_LIMIT, NAME_OF_PROPERTIES_PARAM, NAME_OF_ROOT_NODE, NAME_OF_SKIP,
    NAME_OF_STATIC_LABELS_PARAM, NAME_OF_VERSION_PARAM, TO_ID_PARAMETER_NAME,
};

use super::eval::{parameter, values_equal, Scope};
use crate::driver::{Record, ResultSummary};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl StoredNode {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    fn has_labels(&self, labels: &[String]) -> bool {
        labels.iter().all(|l| self.has_label(l))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRelationship {
    pub relationship_type: String,
    pub start: i64,
    pub end: i64,
    pub properties: Properties,
}

/// One database. Cloning is cheap; the maps share structure.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    next_node_id: i64,
    next_relationship_id: i64,
    nodes: OrdMap<i64, StoredNode>,
    relationships: OrdMap<i64, StoredRelationship>,
}

impl GraphState {
    pub fn node(&self, id: i64) -> Option<&StoredNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn nodes_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = (i64, &'a StoredNode)> + 'a {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.has_label(label))
            .map(|(id, node)| (*id, node))
    }

    pub fn relationships_of_type<'a>(
        &'a self,
        relationship_type: &'a str,
    ) -> impl Iterator<Item = &'a StoredRelationship> + 'a {
        self.relationships
            .values()
            .filter(move |r| r.relationship_type == relationship_type)
    }

    /// Apply one operation and return its rows and counters.
    pub(crate) fn execute(
        &mut self,
        operation: &Operation,
        parameters: &Properties,
    ) -> Result<(Vec<Record>, ResultSummary)> {
        let mut summary = ResultSummary::default();
        let rows = match operation {
            Operation::MatchNodes {
                labels,
                condition,
                orders,
                paged,
                projection,
            } => {
                let mut matched = Vec::new();
                for (id, node) in self.nodes.iter() {
                    if !node.has_labels(labels) {
                        continue;
                    }
                    let scope = Scope {
                        id: *id,
                        node,
                        parameters,
                    };
                    if condition.as_ref().map_or(Ok(true), |c| scope.test(c))? {
                        matched.push(project(*id, node));
                    }
                }
                match projection {
                    Projection::Count => vec![single(NAME_OF_COUNT, Value::from(matched.len()))],
                    Projection::Nodes => {
                        sort_rows(&mut matched, orders);
                        if *paged {
                            let skip = count_parameter(parameters, NAME_OF_SKIP)?;
                            let limit = count_parameter(parameters, NAME_OF_LIMIT)?;
                            matched = matched.into_iter().skip(skip).take(limit).collect();
                        }
                        matched
                            .into_iter()
                            .map(|node| single(NAME_OF_ROOT_NODE, Value::Object(node)))
                            .collect()
                    }
                }
            }
            Operation::SaveNode {
                labels,
                key,
                version_property,
                dynamic_labels,
            } => {
                let id = parameter(parameters, NAME_OF_ID)?;
                let properties = object_parameter(parameters, NAME_OF_PROPERTIES_PARAM)?;
                if id.is_null() && matches!(key, NodeKey::Property(_)) {
                    return Err(DriverError::permanent(
                        "Cannot merge the following node because of null property value",
                    )
                    .into());
                }
                let existing = self.find(labels, key, id);

                let target = match existing {
                    None => Some(self.create_node(labels.clone(), properties, &mut summary)),
                    Some(node_id) => {
                        let version_matches = version_property.as_ref().map_or(true, |version| {
                            let current = self
                                .nodes
                                .get(&node_id)
                                .and_then(|n| n.properties.get(version))
                                .unwrap_or(&Value::Null);
                            values_equal(
                                current,
                                parameters.get(NAME_OF_VERSION_PARAM).unwrap_or(&Value::Null),
                            )
                        });
                        if version_matches {
                            self.replace_properties(node_id, properties, &mut summary);
                            Some(node_id)
                        } else {
                            None
                        }
                    }
                };

                match target {
                    Some(node_id) => {
                        self.relabel(node_id, dynamic_labels, &mut summary);
                        vec![single(NAME_OF_INTERNAL_ID, Value::from(node_id))]
                    }
                    None => Vec::new(),
                }
            }
            Operation::SaveNodes {
                labels,
                id_property,
            } => {
                let entities = parameter(parameters, NAME_OF_ENTITY_LIST_PARAM)?
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                let key = NodeKey::Property(id_property.clone());
                let mut rows = Vec::with_capacity(entities.len());
                for entity in entities {
                    let id = entity.get(NAME_OF_ID).cloned().unwrap_or(Value::Null);
                    let properties = entity
                        .get(NAME_OF_PROPERTIES_PARAM)
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    let node_id = match self.find(labels, &key, &id) {
                        Some(node_id) => {
                            self.replace_properties(node_id, properties, &mut summary);
                            node_id
                        }
                        None => self.create_node(labels.clone(), properties, &mut summary),
                    };
                    let mut row = Record::new();
                    row.insert(NAME_OF_ID.to_string(), id);
                    row.insert(NAME_OF_INTERNAL_ID.to_string(), Value::from(node_id));
                    rows.push(row);
                }
                rows
            }
            Operation::DeleteNodes { labels, condition } => {
                let mut doomed = Vec::new();
                for (id, node) in self.nodes.iter() {
                    if !node.has_labels(labels) {
                        continue;
                    }
                    let scope = Scope {
                        id: *id,
                        node,
                        parameters,
                    };
                    if condition.as_ref().map_or(Ok(true), |c| scope.test(c))? {
                        doomed.push(*id);
                    }
                }
                for id in &doomed {
                    self.detach_delete(*id, &mut summary);
                }
                vec![single(NAME_OF_COUNT, Value::from(doomed.len()))]
            }
            Operation::CreateRelationship {
                relationship_type,
                direction,
                with_properties,
            } => {
                let from = id_parameter(parameters, FROM_ID_PARAMETER_NAME)?;
                let to = id_parameter(parameters, TO_ID_PARAMETER_NAME)?;
                if self.nodes.contains_key(&from) && self.nodes.contains_key(&to) {
                    let properties = if *with_properties {
                        Some(object_parameter(parameters, NAME_OF_PROPERTIES_PARAM)?)
                    } else {
                        None
                    };
                    self.merge_relationship(relationship_type, *direction, from, to, properties, &mut summary);
                }
                Vec::new()
            }
            Operation::RemoveRelationships {
                owner_label,
                relationship_type,
                direction,
                target_label,
            } => {
                let owner = id_parameter(parameters, FROM_ID_PARAMETER_NAME)?;
                if self.nodes.get(&owner).is_some_and(|n| n.has_label(owner_label)) {
                    let doomed: Vec<i64> = self
                        .relationships
                        .iter()
                        .filter(|(_, rel)| {
                            relationship_type
                                .as_ref()
                                .map_or(true, |t| &rel.relationship_type == t)
                                && self.other_end(rel, owner, *direction).is_some_and(|other| {
                                    self.nodes
                                        .get(&other)
                                        .is_some_and(|n| n.has_label(target_label))
                                })
                        })
                        .map(|(id, _)| *id)
                        .collect();
                    for id in doomed {
                        self.relationships.remove(&id);
                        summary.relationships_deleted += 1;
                    }
                }
                Vec::new()
            }
            Operation::ReadDynamicLabels {
                label,
                key,
                version_property,
            } => {
                let id = parameter(parameters, NAME_OF_ID)?;
                let static_labels = parameter(parameters, NAME_OF_STATIC_LABELS_PARAM)?
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                let found = self
                    .find(std::slice::from_ref(label), key, id)
                    .and_then(|node_id| self.nodes.get(&node_id))
                    .filter(|node| match version_property {
                        Some(version) => values_equal(
                            node.properties.get(version).unwrap_or(&Value::Null),
                            parameters.get(NAME_OF_VERSION_PARAM).unwrap_or(&Value::Null),
                        ),
                        None => true,
                    });
                match found {
                    Some(node) => {
                        let labels: Vec<Value> = node
                            .labels
                            .iter()
                            .filter(|l| !static_labels.iter().any(|s| s.as_str() == Some(l.as_str())))
                            .map(|l| Value::from(l.as_str()))
                            .collect();
                        vec![single(NAME_OF_LABELS, Value::Array(labels))]
                    }
                    None => Vec::new(),
                }
            }
        };
        Ok((rows, summary))
    }

    // ── Node helpers ─────────────────────────────────────────────

    fn find(&self, labels: &[String], key: &NodeKey, id: &Value) -> Option<i64> {
        match key {
            NodeKey::InternalId => id
                .as_i64()
                .filter(|id| self.nodes.get(id).is_some_and(|n| n.has_labels(labels))),
            NodeKey::Property(property) => self
                .nodes
                .iter()
                .find(|(_, node)| {
                    node.has_labels(labels)
                        && node
                            .properties
                            .get(property)
                            .is_some_and(|v| values_equal(v, id))
                })
                .map(|(node_id, _)| *node_id),
        }
    }

    fn create_node(&mut self, labels: Vec<String>, properties: Properties, summary: &mut ResultSummary) -> i64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        summary.nodes_created += 1;
        summary.labels_added += labels.len() as u64;
        let properties = without_nulls(properties);
        summary.properties_set += properties.len() as u64;
        self.nodes.insert(id, StoredNode { labels, properties });
        id
    }

    /// `SET n = $map`: the map replaces every property; nulls remove.
    fn replace_properties(&mut self, id: i64, properties: Properties, summary: &mut ResultSummary) {
        if let Some(node) = self.nodes.get_mut(&id) {
            let properties = without_nulls(properties);
            summary.properties_set += properties.len() as u64;
            node.properties = properties;
        }
    }

    fn relabel(&mut self, id: i64, labels: &DynamicLabels, summary: &mut ResultSummary) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        for old in labels.old_labels() {
            if let Some(pos) = node.labels.iter().position(|l| l == old) {
                node.labels.remove(pos);
                summary.labels_removed += 1;
            }
        }
        for new in labels.new_labels() {
            if !node.has_label(new) {
                node.labels.push(new.clone());
                summary.labels_added += 1;
            }
        }
    }

    fn detach_delete(&mut self, id: i64, summary: &mut ResultSummary) {
        let attached: Vec<i64> = self
            .relationships
            .iter()
            .filter(|(_, rel)| rel.start == id || rel.end == id)
            .map(|(rel_id, _)| *rel_id)
            .collect();
        for rel_id in attached {
            self.relationships.remove(&rel_id);
            summary.relationships_deleted += 1;
        }
        if self.nodes.remove(&id).is_some() {
            summary.nodes_deleted += 1;
        }
    }

    // ── Relationship helpers ─────────────────────────────────────

    /// The node at the other end of `rel` if it touches `owner` in `direction`.
    fn other_end(&self, rel: &StoredRelationship, owner: i64, direction: Direction) -> Option<i64> {
        match direction {
            Direction::Outgoing => (rel.start == owner).then_some(rel.end),
            Direction::Incoming => (rel.end == owner).then_some(rel.start),
            Direction::Undirected => {
                if rel.start == owner {
                    Some(rel.end)
                } else if rel.end == owner {
                    Some(rel.start)
                } else {
                    None
                }
            }
        }
    }

    fn merge_relationship(
        &mut self,
        relationship_type: &str,
        direction: Direction,
        from: i64,
        to: i64,
        properties: Option<Properties>,
        summary: &mut ResultSummary,
    ) {
        let existing = self
            .relationships
            .iter()
            .find(|(_, rel)| {
                rel.relationship_type == relationship_type
                    && self.other_end(rel, from, direction) == Some(to)
            })
            .map(|(id, _)| *id);

        let id = match existing {
            Some(id) => id,
            None => {
                let (start, end) = match direction {
                    Direction::Incoming => (to, from),
                    Direction::Outgoing | Direction::Undirected => (from, to),
                };
                let id = self.next_relationship_id;
                self.next_relationship_id += 1;
                self.relationships.insert(
                    id,
                    StoredRelationship {
                        relationship_type: relationship_type.to_string(),
                        start,
                        end,
                        properties: Properties::new(),
                    },
                );
                summary.relationships_created += 1;
                id
            }
        };

        if let (Some(properties), Some(rel)) = (properties, self.relationships.get_mut(&id)) {
            let properties = without_nulls(properties);
            summary.properties_set += properties.len() as u64;
            rel.properties = properties;
        }
    }
}

// ── Row helpers ──────────────────────────────────────────────────

fn project(id: i64, node: &StoredNode) -> Properties {
    let mut projected = node.properties.clone();
    projected.insert(NAME_OF_INTERNAL_ID.to_string(), Value::from(id));
    projected.insert(
        NAME_OF_LABELS.to_string(),
        Value::Array(node.labels.iter().map(|l| Value::from(l.as_str())).collect()),
    );
    projected
}

fn sort_rows(rows: &mut [Properties], orders: &[Order]) {
    if orders.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in orders {
            let key = |row: &Properties| {
                let value = row.get(&order.property).cloned().unwrap_or(Value::Null);
                match value {
                    Value::String(s) if order.ignore_case => Value::String(s.to_lowercase()),
                    other => other,
                }
            };
            let ordering = compare_values(&key(a), &key(b));
            let ordering = match order.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn single(column: &str, value: Value) -> Record {
    let mut record = Record::new();
    record.insert(column.to_string(), value);
    record
}

fn without_nulls(properties: Properties) -> Properties {
    properties.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

fn object_parameter(parameters: &Properties, name: &str) -> Result<Properties> {
    match parameter(parameters, name)? {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Properties::new()),
        other => Err(DriverError::permanent(format!("Parameter {name} must be a map, got {other}")).into()),
    }
}

fn id_parameter(parameters: &Properties, name: &str) -> Result<i64> {
    parameter(parameters, name)?
        .as_i64()
        .ok_or_else(|| DriverError::permanent(format!("Parameter {name} must be an internal id")).into())
}

fn count_parameter(parameters: &Properties, name: &str) -> Result<usize> {
    parameter(parameters, name)?
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| DriverError::permanent(format!("Parameter {name} must be a non-negative integer")).into())
}
