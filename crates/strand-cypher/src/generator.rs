//! Renders the statements the persistence engine runs.
//!
//! Only labels, relationship types and property names taken from entity
//! descriptors are interpolated into statement text, always through
//! [`escape_name`]. Every value travels as a parameter.

use serde_json::Value;
use strand_core::schema::{AssociationDescriptor, Direction, EntityDescriptor};
use strand_core::{Error, Result};

use crate::condition::{escape_name, Condition, Expression};
use crate::sort::{Order, Pageable, Sort, SortDirection};
use crate::statement::{label_expression, DynamicLabels, NodeKey, Operation, Projection, Statement};
use crate::{
    FROM_ID_PARAMETER_NAME, NAME_OF_COUNT, NAME_OF_ENTITY_LIST_PARAM, NAME_OF_ID, NAME_OF_IDS,
    NAME_OF_INTERNAL_ID, NAME_OF_LABELS, NAME_OF_LIMIT, NAME_OF_PROPERTIES_PARAM, NAME_OF_ROOT_NODE,
    NAME_OF_SKIP, NAME_OF_STATIC_LABELS_PARAM, NAME_OF_VERSION_PARAM, TO_ID_PARAMETER_NAME,
};

const START_NODE: &str = "startNode";
const END_NODE: &str = "endNode";

#[derive(Debug, Clone, Copy, Default)]
pub struct CypherGenerator;

impl CypherGenerator {
    pub fn new() -> Self {
        Self
    }

    // ── Matching ─────────────────────────────────────────────────

    /// Match one node by id. Bind the id under the returned parameter name.
    pub fn match_by_id(&self, descriptor: &EntityDescriptor) -> (Statement, &'static str) {
        let condition = id_expression(descriptor).is_equal_to(Expression::parameter(NAME_OF_ID));
        let statement = self.render_match(descriptor, Some(condition), Vec::new(), false, Projection::Nodes);
        (statement, NAME_OF_ID)
    }

    /// Match every node whose id is in a list bound under the returned name.
    pub fn match_all_by_id(&self, descriptor: &EntityDescriptor) -> (Statement, &'static str) {
        let condition = id_expression(descriptor).is_in(Expression::parameter(NAME_OF_IDS));
        let statement = self.render_match(descriptor, Some(condition), Vec::new(), false, Projection::Nodes);
        (statement, NAME_OF_IDS)
    }

    /// Match nodes of a type, optionally filtered, sorted and paged.
    ///
    /// Sort keys are field names; unknown fields are a mapping error. Paging
    /// binds `__skip__` and `__limit__` itself.
    pub fn match_all(
        &self,
        descriptor: &EntityDescriptor,
        condition: Option<Condition>,
        sort: &Sort,
        page: Option<&Pageable>,
    ) -> Result<Statement> {
        let orders = sort
            .orders()
            .iter()
            .map(|order| {
                Ok(Order {
                    property: sort_property(descriptor, &order.property)?,
                    ..order.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let statement =
            self.render_match(descriptor, condition, orders, page.is_some(), Projection::Nodes);
        Ok(match page {
            Some(page) => statement
                .bind(NAME_OF_SKIP, page.offset())
                .bind(NAME_OF_LIMIT, page.size),
            None => statement,
        })
    }

    pub fn count(&self, descriptor: &EntityDescriptor, condition: Option<Condition>) -> Statement {
        self.render_match(descriptor, condition, Vec::new(), false, Projection::Count)
    }

    fn render_match(
        &self,
        descriptor: &EntityDescriptor,
        condition: Option<Condition>,
        orders: Vec<Order>,
        paged: bool,
        projection: Projection,
    ) -> Statement {
        let n = NAME_OF_ROOT_NODE;
        let mut cypher = format!("MATCH ({n}{})", label_expression(descriptor.static_labels()));
        if let Some(condition) = &condition {
            cypher.push_str(&format!(" WHERE {}", condition.render()));
        }
        match projection {
            Projection::Nodes => cypher.push_str(&format!(
                " RETURN {n}{{.*, {NAME_OF_INTERNAL_ID}: id({n}), {NAME_OF_LABELS}: labels({n})}} AS {n}"
            )),
            Projection::Count => cypher.push_str(&format!(" RETURN count({n}) AS {NAME_OF_COUNT}")),
        }
        if !orders.is_empty() {
            let keys: Vec<String> = orders.iter().map(render_order).collect();
            cypher.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }
        if paged {
            cypher.push_str(&format!(" SKIP ${NAME_OF_SKIP} LIMIT ${NAME_OF_LIMIT}"));
        }

        Statement::planned(
            cypher,
            Operation::MatchNodes {
                labels: descriptor.static_labels().to_vec(),
                condition,
                orders,
                paged,
                projection,
            },
        )
    }

    // ── Saving ───────────────────────────────────────────────────

    /// Create or update one node.
    ///
    /// Assigned and generated ids merge on the id property. Internal ids and
    /// versioned entities use a union of create-if-absent and
    /// update-if-exists; the versioned update only matches the expected
    /// version, so a stale entity yields no row.
    pub fn save(&self, descriptor: &EntityDescriptor, dynamic_labels: &DynamicLabels) -> Statement {
        let labels = label_expression(descriptor.static_labels());
        let key = node_key(descriptor);
        let version_property = descriptor.version.as_ref().map(|v| v.property_name.clone());
        let decoration = dynamic_labels.decorate(NAME_OF_ROOT_NODE);
        let set_and_return = format!(
            "SET n = ${NAME_OF_PROPERTIES_PARAM}{decoration} RETURN id(n) AS {NAME_OF_INTERNAL_ID}"
        );

        let cypher = match (&key, &version_property) {
            (NodeKey::Property(id_property), None) => format!(
                "MERGE (n{labels} {{{}: ${NAME_OF_ID}}}) {set_and_return}",
                escape_name(id_property)
            ),
            _ => {
                let mut update_condition = format!("{} = ${NAME_OF_ID}", key.render("n"));
                if let Some(version) = &version_property {
                    update_condition.push_str(&format!(
                        " AND n.{} = ${NAME_OF_VERSION_PARAM}",
                        escape_name(version)
                    ));
                }
                format!(
                    "OPTIONAL MATCH (hlp{labels}) WHERE {} = ${NAME_OF_ID} WITH hlp WHERE hlp IS NULL \
                     CREATE (n{labels}) {set_and_return} \
                     UNION \
                     MATCH (n{labels}) WHERE {update_condition} {set_and_return}",
                    key.render("hlp")
                )
            }
        };

        Statement::planned(
            cypher,
            Operation::SaveNode {
                labels: descriptor.static_labels().to_vec(),
                key,
                version_property,
                dynamic_labels: dynamic_labels.clone(),
            },
        )
    }

    /// Merge many nodes at once from `__entities__`, a list of
    /// `{__id__, __properties__}` maps.
    pub fn save_batch(&self, descriptor: &EntityDescriptor) -> Result<Statement> {
        let id_property = match (descriptor.id_property_name(), descriptor.supports_batch_save()) {
            (Some(id_property), true) => id_property.to_string(),
            _ => {
                return Err(Error::Mapping(format!(
                    "Entities of type {} cannot be saved in batches",
                    descriptor.type_name
                )))
            }
        };

        let cypher = format!(
            "UNWIND ${NAME_OF_ENTITY_LIST_PARAM} AS entity \
             MERGE (n{} {{{}: entity.{NAME_OF_ID}}}) \
             SET n = entity.{NAME_OF_PROPERTIES_PARAM} \
             RETURN entity.{NAME_OF_ID} AS {NAME_OF_ID}, id(n) AS {NAME_OF_INTERNAL_ID}",
            label_expression(descriptor.static_labels()),
            escape_name(&id_property),
        );
        Ok(Statement::planned(
            cypher,
            Operation::SaveNodes {
                labels: descriptor.static_labels().to_vec(),
                id_property,
            },
        ))
    }

    // ── Deleting ─────────────────────────────────────────────────

    pub fn delete_by_condition(&self, descriptor: &EntityDescriptor, condition: Condition) -> Statement {
        self.render_delete(descriptor, Some(condition))
    }

    pub fn delete_all(&self, descriptor: &EntityDescriptor) -> Statement {
        self.render_delete(descriptor, None)
    }

    pub fn delete_by_id(&self, descriptor: &EntityDescriptor) -> (Statement, &'static str) {
        let condition = id_expression(descriptor).is_equal_to(Expression::parameter(NAME_OF_ID));
        (self.render_delete(descriptor, Some(condition)), NAME_OF_ID)
    }

    pub fn delete_all_by_id(&self, descriptor: &EntityDescriptor) -> (Statement, &'static str) {
        let condition = id_expression(descriptor).is_in(Expression::parameter(NAME_OF_IDS));
        (self.render_delete(descriptor, Some(condition)), NAME_OF_IDS)
    }

    fn render_delete(&self, descriptor: &EntityDescriptor, condition: Option<Condition>) -> Statement {
        let n = NAME_OF_ROOT_NODE;
        let mut cypher = format!("MATCH ({n}{})", label_expression(descriptor.static_labels()));
        if let Some(condition) = &condition {
            cypher.push_str(&format!(" WHERE {}", condition.render()));
        }
        cypher.push_str(&format!(" DETACH DELETE {n} RETURN count(*) AS {NAME_OF_COUNT}"));

        Statement::planned(
            cypher,
            Operation::DeleteNodes {
                labels: descriptor.static_labels().to_vec(),
                condition,
            },
        )
    }

    // ── Relationships ────────────────────────────────────────────

    /// Connect the owner (`fromId`) to a related node (`toId`), both by
    /// internal id. Dynamic associations pass the map key as the type.
    pub fn relationship_create(
        &self,
        owner: &EntityDescriptor,
        association: &AssociationDescriptor,
        has_properties: bool,
        dynamic_type: Option<&str>,
    ) -> Statement {
        let relationship_type = dynamic_type
            .unwrap_or(&association.relationship_type)
            .to_string();
        let pattern = relationship_pattern(
            START_NODE,
            &format!("rel:{}", escape_name(&relationship_type)),
            association.direction,
            END_NODE,
        );
        let mut cypher = format!(
            "MATCH ({START_NODE}:{}) WHERE id({START_NODE}) = ${FROM_ID_PARAMETER_NAME} \
             MATCH ({END_NODE}) WHERE id({END_NODE}) = ${TO_ID_PARAMETER_NAME} \
             MERGE {pattern}",
            escape_name(owner.primary_label()),
        );
        if has_properties {
            cypher.push_str(&format!(" SET rel = ${NAME_OF_PROPERTIES_PARAM}"));
        }

        Statement::planned(
            cypher,
            Operation::CreateRelationship {
                relationship_type,
                direction: association.direction,
                with_properties: has_properties,
            },
        )
    }

    /// Remove every relationship of the association's type between the
    /// owner (`fromId`) and nodes of the target type. Dynamic associations
    /// remove relationships of any type.
    pub fn relationship_remove(
        &self,
        owner: &EntityDescriptor,
        association: &AssociationDescriptor,
        target: &EntityDescriptor,
    ) -> Statement {
        let relationship_type =
            (!association.is_dynamic()).then(|| association.relationship_type.clone());
        let relationship = match &relationship_type {
            Some(t) => format!("rel:{}", escape_name(t)),
            None => "rel".to_string(),
        };
        let pattern = relationship_pattern(
            &format!("{START_NODE}:{}", escape_name(owner.primary_label())),
            &relationship,
            association.direction,
            &format!(":{}", escape_name(target.primary_label())),
        );
        let cypher = format!(
            "MATCH {pattern} WHERE id({START_NODE}) = ${FROM_ID_PARAMETER_NAME} DELETE rel"
        );

        Statement::planned(
            cypher,
            Operation::RemoveRelationships {
                owner_label: owner.primary_label().to_string(),
                relationship_type,
                direction: association.direction,
                target_label: target.primary_label().to_string(),
            },
        )
    }

    // ── Dynamic labels ───────────────────────────────────────────

    /// Read the persisted labels of one node that are not static labels.
    /// Binds the static labels; the caller binds the id and, when
    /// versioned, the expected version.
    pub fn dynamic_labels_of(&self, descriptor: &EntityDescriptor) -> Statement {
        let key = node_key(descriptor);
        let version_property = descriptor.version.as_ref().map(|v| v.property_name.clone());

        let mut condition = format!("{} = ${NAME_OF_ID}", key.render("n"));
        if let Some(version) = &version_property {
            condition.push_str(&format!(" AND n.{} = ${NAME_OF_VERSION_PARAM}", escape_name(version)));
        }
        let cypher = format!(
            "MATCH (n:{}) WHERE {condition} \
             RETURN [label IN labels(n) WHERE NOT label IN ${NAME_OF_STATIC_LABELS_PARAM}] AS {NAME_OF_LABELS}",
            escape_name(descriptor.primary_label()),
        );
        let static_labels: Vec<Value> = descriptor
            .static_labels()
            .iter()
            .map(|l| Value::from(l.as_str()))
            .collect();

        Statement::planned(
            cypher,
            Operation::ReadDynamicLabels {
                label: descriptor.primary_label().to_string(),
                key,
                version_property,
            },
        )
        .bind(NAME_OF_STATIC_LABELS_PARAM, static_labels)
    }
}

/// The expression identifying a node of this type: `id(n)` for internal
/// ids, the id property otherwise.
pub fn id_expression(descriptor: &EntityDescriptor) -> Expression {
    match node_key(descriptor) {
        NodeKey::InternalId => Expression::InternalId,
        NodeKey::Property(name) => Expression::Property(name),
    }
}

fn node_key(descriptor: &EntityDescriptor) -> NodeKey {
    match descriptor.id_property_name() {
        Some(name) => NodeKey::Property(name.to_string()),
        None => NodeKey::InternalId,
    }
}

/// Graph property name of a sortable field. Internal ids sort on the
/// projected `__internal_id__`.
fn sort_property(descriptor: &EntityDescriptor, field_name: &str) -> Result<String> {
    if field_name == descriptor.id.field_name {
        return Ok(descriptor
            .id_property_name()
            .unwrap_or(NAME_OF_INTERNAL_ID)
            .to_string());
    }
    descriptor
        .property(field_name)
        .map(|p| p.property_name.clone())
        .ok_or_else(|| {
            Error::Mapping(format!(
                "Cannot sort {} by unknown property {field_name}",
                descriptor.type_name
            ))
        })
}

fn render_order(order: &Order) -> String {
    let property = format!("{NAME_OF_ROOT_NODE}.{}", escape_name(&order.property));
    let key = if order.ignore_case {
        format!("toLower({property})")
    } else {
        property
    };
    match order.direction {
        SortDirection::Ascending => format!("{key} ASC"),
        SortDirection::Descending => format!("{key} DESC"),
    }
}

fn relationship_pattern(start: &str, relationship: &str, direction: Direction, end: &str) -> String {
    match direction {
        Direction::Outgoing => format!("({start})-[{relationship}]->({end})"),
        Direction::Incoming => format!("({start})<-[{relationship}]-({end})"),
        Direction::Undirected => format!("({start})-[{relationship}]-({end})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::schema::{AssociationSchema, EntitySchema, IdStrategy, MappingContext};
    use strand_core::PropertyKind;

    fn context() -> MappingContext {
        let ctx = MappingContext::new();
        ctx.register(
            EntitySchema::new("Person")
                .label("Person")
                .label("Human")
                .id("id", IdStrategy::Internal)
                .property("name", PropertyKind::String)
                .dynamic_labels("extraLabels")
                .association(AssociationSchema::outgoing("friends", "KNOWS", "Person"))
                .association(AssociationSchema::outgoing("pets", "OWNS", "Pet").dynamic()),
        )
        .unwrap();
        ctx.register(
            EntitySchema::new("Pet")
                .id("code", IdStrategy::Assigned)
                .property("name", PropertyKind::String),
        )
        .unwrap();
        ctx.register(
            EntitySchema::new("Account")
                .id("number", IdStrategy::Assigned)
                .version("version")
                .association(AssociationSchema::incoming("holder", "HOLDS", "Person").single()),
        )
        .unwrap();
        ctx
    }

    #[test]
    fn match_by_id_uses_the_id_expression() {
        let ctx = context();
        let person = ctx.descriptor("Person").unwrap();
        let (statement, param) = CypherGenerator.match_by_id(&person);
        assert_eq!(param, "__id__");
        assert_eq!(
            statement.cypher(),
            "MATCH (n:Person:Human) WHERE id(n) = $__id__ \
             RETURN n{.*, __internal_id__: id(n), __labels__: labels(n)} AS n"
        );

        let pet = ctx.descriptor("Pet").unwrap();
        let (statement, param) = CypherGenerator.match_all_by_id(&pet);
        assert_eq!(param, "__ids__");
        assert!(statement.cypher().contains("WHERE n.code IN $__ids__"));
    }

    #[test]
    fn match_all_maps_sort_fields_and_binds_paging() {
        let ctx = context();
        let pet = ctx.descriptor("Pet").unwrap();
        let page = Pageable::of(2, 10);
        let sort = Sort::by(Order::desc("name").ignoring_case()).and(Order::asc("code"));
        let statement = CypherGenerator
            .match_all(&pet, None, &sort, Some(&page))
            .unwrap();
        assert!(statement
            .cypher()
            .ends_with("ORDER BY toLower(n.name) DESC, n.code ASC SKIP $__skip__ LIMIT $__limit__"));
        assert_eq!(statement.parameter("__skip__"), Some(&Value::from(20)));
        assert_eq!(statement.parameter("__limit__"), Some(&Value::from(10)));

        let err = CypherGenerator
            .match_all(&pet, None, &Sort::by(Order::asc("colour")), None)
            .unwrap_err();
        assert!(matches!(err, Error::Mapping(_)));
    }

    #[test]
    fn assigned_ids_merge_on_the_id_property() {
        let ctx = context();
        let pet = ctx.descriptor("Pet").unwrap();
        let statement = CypherGenerator.save(&pet, &DynamicLabels::none());
        assert_eq!(
            statement.cypher(),
            "MERGE (n:Pet {code: $__id__}) SET n = $__properties__ RETURN id(n) AS __internal_id__"
        );
    }

    #[test]
    fn internal_ids_create_or_update_with_dynamic_labels() {
        let ctx = context();
        let person = ctx.descriptor("Person").unwrap();
        let labels = DynamicLabels::new(vec!["Old".into()], vec!["New".into()]);
        let statement = CypherGenerator.save(&person, &labels);
        assert_eq!(
            statement.cypher(),
            "OPTIONAL MATCH (hlp:Person:Human) WHERE id(hlp) = $__id__ WITH hlp WHERE hlp IS NULL \
             CREATE (n:Person:Human) SET n = $__properties__ REMOVE n:Old SET n:New RETURN id(n) AS __internal_id__ \
             UNION \
             MATCH (n:Person:Human) WHERE id(n) = $__id__ SET n = $__properties__ REMOVE n:Old SET n:New RETURN id(n) AS __internal_id__"
        );
    }

    #[test]
    fn versioned_updates_guard_on_the_version() {
        let ctx = context();
        let account = ctx.descriptor("Account").unwrap();
        let statement = CypherGenerator.save(&account, &DynamicLabels::none());
        assert!(statement
            .cypher()
            .contains("MATCH (n:Account) WHERE n.number = $__id__ AND n.version = $__version__"));
        assert!(matches!(
            statement.operation(),
            Some(Operation::SaveNode { version_property: Some(v), .. }) if v == "version"
        ));
    }

    #[test]
    fn batch_saves_are_limited_to_eligible_types() {
        let ctx = context();
        let pet = ctx.descriptor("Pet").unwrap();
        let statement = CypherGenerator.save_batch(&pet).unwrap();
        assert!(statement.cypher().starts_with("UNWIND $__entities__ AS entity MERGE (n:Pet {code: entity.__id__})"));

        for type_name in ["Person", "Account"] {
            let descriptor = ctx.descriptor(type_name).unwrap();
            assert!(matches!(CypherGenerator.save_batch(&descriptor), Err(Error::Mapping(_))));
        }
    }

    #[test]
    fn relationships_bind_ids_as_parameters() {
        let ctx = context();
        let person = ctx.descriptor("Person").unwrap();
        let friends = person.association("friends").unwrap();
        let statement = CypherGenerator.relationship_create(&person, friends, false, None);
        assert_eq!(
            statement.cypher(),
            "MATCH (startNode:Person) WHERE id(startNode) = $fromId \
             MATCH (endNode) WHERE id(endNode) = $toId \
             MERGE (startNode)-[rel:KNOWS]->(endNode)"
        );

        let account = ctx.descriptor("Account").unwrap();
        let holder = account.association("holder").unwrap();
        let statement = CypherGenerator.relationship_create(&account, holder, true, None);
        assert!(statement
            .cypher()
            .ends_with("MERGE (startNode)<-[rel:HOLDS]-(endNode) SET rel = $__properties__"));
    }

    #[test]
    fn dynamic_relationship_types_are_escaped() {
        let ctx = context();
        let person = ctx.descriptor("Person").unwrap();
        let pets = person.association("pets").unwrap();
        let statement =
            CypherGenerator.relationship_create(&person, pets, false, Some("LIKES`]->() DELETE n //"));
        assert!(statement
            .cypher()
            .contains("-[rel:`LIKES``]->() DELETE n //`]->"));
    }

    #[test]
    fn removal_is_scoped_to_owner_and_target_label() {
        let ctx = context();
        let person = ctx.descriptor("Person").unwrap();
        let pet = ctx.descriptor("Pet").unwrap();

        let friends = person.association("friends").unwrap();
        let statement = CypherGenerator.relationship_remove(&person, friends, &person);
        assert_eq!(
            statement.cypher(),
            "MATCH (startNode:Person)-[rel:KNOWS]->(:Person) WHERE id(startNode) = $fromId DELETE rel"
        );

        let pets = person.association("pets").unwrap();
        let statement = CypherGenerator.relationship_remove(&person, pets, &pet);
        assert!(statement.cypher().starts_with("MATCH (startNode:Person)-[rel]->(:Pet)"));
    }

    #[test]
    fn deletes_return_a_count() {
        let ctx = context();
        let pet = ctx.descriptor("Pet").unwrap();
        let (statement, _) = CypherGenerator.delete_by_id(&pet);
        assert_eq!(
            statement.cypher(),
            "MATCH (n:Pet) WHERE n.code = $__id__ DETACH DELETE n RETURN count(*) AS count"
        );
        assert_eq!(
            CypherGenerator.delete_all(&pet).cypher(),
            "MATCH (n:Pet) DETACH DELETE n RETURN count(*) AS count"
        );
    }

    #[test]
    fn dynamic_label_reads_exclude_static_labels() {
        let ctx = context();
        let person = ctx.descriptor("Person").unwrap();
        let statement = CypherGenerator.dynamic_labels_of(&person);
        assert_eq!(
            statement.parameter("__staticLabels__"),
            Some(&serde_json::json!(["Person", "Human"]))
        );
        assert!(statement
            .cypher()
            .contains("[label IN labels(n) WHERE NOT label IN $__staticLabels__] AS __labels__"));
    }
}
