//! The nested relationship processor.
//!
//! After an entity's node has been saved, every declared association is
//! brought to the state of the in-memory object graph: existing
//! relationships of the association are removed (unless the owner was new),
//! related entities are saved, relationships are created, and the walk
//! continues into the related entities. A [`ProcessState`] owned by the
//! top-level save makes the walk terminate on cyclic graphs and keeps both
//! sides of a bidirectional relationship from being written twice.

use std::collections::HashSet;
use std::sync::Arc;

use async_recursion::async_recursion;
use serde_json::Value;
use strand_core::schema::{AssociationDescriptor, AssociationKey, Cardinality, EntityDescriptor};
use strand_core::{AssociationValue, EntityIdentity, EntityRef, Error, RelatedValue, Result};
use strand_cypher::{FROM_ID_PARAMETER_NAME, NAME_OF_PROPERTIES_PARAM, TO_ID_PARAMETER_NAME};
use strand_graph::Transaction;

use crate::template::Template;

// ── Per-association context ──────────────────────────────────────

/// One association of one owner, with its value normalized.
#[derive(Debug, Clone)]
pub struct NestedRelationshipContext {
    association: Arc<AssociationDescriptor>,
    value: AssociationValue,
    related_values: Vec<RelatedValue>,
}

impl NestedRelationshipContext {
    pub fn of(association: Arc<AssociationDescriptor>, owner: &EntityRef) -> Self {
        let value = owner.association(association.field_name());
        let related_values = value.normalize();
        Self {
            association,
            value,
            related_values,
        }
    }

    pub fn association(&self) -> &AssociationDescriptor {
        &self.association
    }

    pub fn value(&self) -> &AssociationValue {
        &self.value
    }

    pub fn related_values(&self) -> &[RelatedValue] {
        &self.related_values
    }

    /// Unset, single `None`, and empty collections are all empty.
    pub fn is_empty(&self) -> bool {
        self.related_values.is_empty()
    }

    pub fn has_relationship_properties(&self) -> bool {
        self.association.has_properties
    }

    /// Reject values whose shape the association cannot persist: a
    /// relationship-type map outside a dynamic association, relationship
    /// properties without declared support, and several targets on a
    /// single-valued association.
    pub fn check_shape(&self) -> Result<()> {
        let association = &self.association;
        let problem = match &self.value {
            AssociationValue::Dynamic(_) if !association.is_dynamic() => {
                Some("holds a map of relationship types but is not dynamic".to_string())
            }
            AssociationValue::WithProperties(_) if !association.has_properties => {
                Some("holds relationship properties but does not declare any".to_string())
            }
            _ if association.cardinality == Cardinality::Single && self.related_values.len() > 1 => {
                Some(format!("is single-valued but holds {} values", self.related_values.len()))
            }
            _ => None,
        };
        match problem {
            Some(problem) => Err(Error::Mapping(format!("{} {problem}", association.key))),
            None => Ok(()),
        }
    }
}

// ── Traversal state ──────────────────────────────────────────────

/// What a [`ProcessState`] has already seen of an association and its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedState {
    None,
    /// The association (looked up through its obverse) was processed.
    AllRelationships,
    /// Every related value was already reached.
    AllValues,
    Both,
}

/// Associations and entity instances handled during one top-level save.
#[derive(Debug, Default)]
pub struct ProcessState {
    associations: HashSet<AssociationKey>,
    values: HashSet<EntityIdentity>,
}

impl ProcessState {
    /// A fresh state with the root entity already marked.
    pub fn new(root: &EntityRef) -> Self {
        let mut state = Self::default();
        state.values.insert(root.identity());
        state
    }

    /// Classify an association about to be processed.
    ///
    /// `obverse` is the obverse of that association: if the other side of
    /// the relationship was already written, this side must not write it
    /// again.
    pub fn state_of(
        &self,
        obverse: Option<&AssociationKey>,
        values: &[RelatedValue],
    ) -> ProcessedState {
        let relationships = obverse.is_some_and(|key| self.associations.contains(key));
        let all_values = values
            .iter()
            .all(|v| self.values.contains(&v.target.identity()));
        match (relationships, all_values) {
            (true, true) => ProcessedState::Both,
            (true, false) => ProcessedState::AllRelationships,
            (false, true) => ProcessedState::AllValues,
            (false, false) => ProcessedState::None,
        }
    }

    pub fn mark_processed(&mut self, association: &AssociationKey, values: &[RelatedValue]) {
        self.associations.insert(association.clone());
        self.values
            .extend(values.iter().map(|v| v.target.identity()));
    }

    pub fn has_processed_value(&self, entity: &EntityRef) -> bool {
        self.values.contains(&entity.identity())
    }

    pub fn has_processed_association(&self, association: &AssociationKey) -> bool {
        self.associations.contains(association)
    }
}

// ── Processor ────────────────────────────────────────────────────

impl Template {
    /// Bring every association of a saved owner to its in-memory state.
    ///
    /// `owner_was_new` must reflect the owner before this traversal saved
    /// it; relationships of new owners are not removed first.
    #[async_recursion]
    pub(crate) async fn process_relations(
        &self,
        tx: &mut dyn Transaction,
        descriptor: &EntityDescriptor,
        owner: &EntityRef,
        owner_id: i64,
        owner_was_new: bool,
        state: &mut ProcessState,
    ) -> Result<()> {
        for association in &descriptor.associations {
            self.process_association(tx, descriptor, association, owner, owner_id, owner_was_new, state)
                .await
                .map_err(|e| e.within_association(&association.path()))?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_association(
        &self,
        tx: &mut dyn Transaction,
        descriptor: &EntityDescriptor,
        association: &Arc<AssociationDescriptor>,
        owner: &EntityRef,
        owner_id: i64,
        owner_was_new: bool,
        state: &mut ProcessState,
    ) -> Result<()> {
        let context = NestedRelationshipContext::of(Arc::clone(association), owner);
        context.check_shape()?;
        let target = self.context.descriptor(&association.target)?;

        let processed = state.state_of(association.obverse.as_ref(), context.related_values());
        if processed == ProcessedState::Both {
            tracing::trace!(association = %association.key, "Association already processed from the other side");
            return Ok(());
        }

        if !owner_was_new {
            let remove = self
                .generator
                .relationship_remove(descriptor, association, &target)
                .bind(FROM_ID_PARAMETER_NAME, owner_id);
            self.run(tx, &remove).await?;
        }

        if context.is_empty() {
            return Ok(());
        }
        state.mark_processed(&association.key, context.related_values());

        for related in context.related_values() {
            let related_type = related.target.type_name();
            if related_type != association.target {
                return Err(Error::Mapping(format!(
                    "{} holds an instance of {related_type}, expected {}",
                    association.key, association.target
                )));
            }

            let (related_id, related_was_new) = self.save_node(tx, &target, &related.target).await?;

            let mut create = self
                .generator
                .relationship_create(
                    descriptor,
                    association,
                    context.has_relationship_properties(),
                    related.relationship_type.as_deref(),
                )
                .bind(FROM_ID_PARAMETER_NAME, owner_id)
                .bind(TO_ID_PARAMETER_NAME, related_id);
            if context.has_relationship_properties() {
                let properties = related.properties.clone().unwrap_or_default();
                create.set_parameter(NAME_OF_PROPERTIES_PARAM, Value::Object(properties));
            }
            self.run(tx, &create).await?;

            if processed != ProcessedState::AllValues {
                self.process_relations(tx, &target, &related.target, related_id, related_was_new, state)
                    .await?;
            }
        }
        Ok(())
    }
}
