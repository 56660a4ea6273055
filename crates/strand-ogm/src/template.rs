//! The persistence orchestrator.
//!
//! Every public operation resolves the target database once, begins one
//! transaction, and commits on success or rolls back on any error. The
//! `*_in` variants run inside a transaction owned by the caller.

use std::sync::Arc;

use serde_json::Value;
use strand_core::config::MappingSettings;
use strand_core::schema::{EntityDescriptor, IdStrategy};
use strand_core::value::display_value;
use strand_core::{EntityRef, Error, MappingContext, Result, StrandConfig};
use strand_cypher::{
    id_expression, CypherGenerator, DynamicLabels, Example, Expression, Pageable, Predicate, Sort,
    Statement, NAME_OF_COUNT, NAME_OF_ENTITY_LIST_PARAM, NAME_OF_ID, NAME_OF_INTERNAL_ID,
    NAME_OF_LABELS, NAME_OF_PROPERTIES_PARAM, NAME_OF_VERSION_PARAM,
};
use strand_graph::{Driver, GraphClient, GraphConfig, Record, ResultSummary, Transaction};

use crate::callbacks::EntityCallbacks;
use crate::database::{self, DatabaseSelection, DatabaseSelectionProvider, StaticDatabaseSelection};
use crate::nested::ProcessState;
use crate::query::{hydrate_row, ExecutableQuery, Page, PreparedQuery};

/// Saves, loads and deletes entities through a [`Driver`].
#[derive(Clone)]
pub struct Template {
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) context: Arc<MappingContext>,
    pub(crate) generator: CypherGenerator,
    pub(crate) callbacks: EntityCallbacks,
    pub(crate) database_selection: Arc<dyn DatabaseSelectionProvider>,
    pub(crate) settings: MappingSettings,
}

impl Template {
    pub fn new(driver: Arc<dyn Driver>, context: Arc<MappingContext>) -> Self {
        Self {
            driver,
            context,
            generator: CypherGenerator::new(),
            callbacks: EntityCallbacks::new(),
            database_selection: database::default_provider(),
            settings: MappingSettings::default(),
        }
    }

    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &StrandConfig, context: Arc<MappingContext>) -> Result<Self> {
        let client = GraphClient::connect(&GraphConfig::from(config.neo4j.clone())).await?;
        let selection = DatabaseSelection::by_name(config.database().unwrap_or_default());
        Ok(Self::new(Arc::new(client), context)
            .with_settings(config.mapping.clone())
            .with_database_selection(StaticDatabaseSelection::new(selection)))
    }

    pub fn with_callbacks(mut self, callbacks: EntityCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_database_selection(mut self, provider: impl DatabaseSelectionProvider + 'static) -> Self {
        self.database_selection = Arc::new(provider);
        self
    }

    pub fn with_settings(mut self, settings: MappingSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn context(&self) -> &Arc<MappingContext> {
        &self.context
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    // ── Transactions ─────────────────────────────────────────────

    /// Begin a transaction on the currently selected database.
    ///
    /// While it is open, use the `*_in` variants with it. The other
    /// operations begin transactions of their own; on drivers that serialize
    /// transactions per database, such as `MemoryDriver`, they wait for this
    /// one and fail once the driver's lock timeout elapses.
    pub async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let selection = self.database_selection.database_selection();
        tracing::debug!(database = selection.name().unwrap_or("<default>"), "Beginning transaction");
        self.driver.begin(selection.name()).await
    }

    async fn finish<T>(tx: Box<dyn Transaction>, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rolling back transaction");
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    pub(crate) async fn run(&self, tx: &mut dyn Transaction, statement: &Statement) -> Result<ResultSummary> {
        self.log_statement(statement);
        let summary = tx.run(statement).await?;
        tracing::debug!(
            nodes_created = summary.nodes_created,
            nodes_deleted = summary.nodes_deleted,
            relationships_created = summary.relationships_created,
            relationships_deleted = summary.relationships_deleted,
            properties_set = summary.properties_set,
            "Statement completed"
        );
        Ok(summary)
    }

    pub(crate) async fn fetch(&self, tx: &mut dyn Transaction, statement: &Statement) -> Result<Vec<Record>> {
        self.log_statement(statement);
        tx.fetch(statement).await
    }

    fn log_statement(&self, statement: &Statement) {
        if self.settings.log_statements {
            tracing::debug!(cypher = %statement.cypher(), parameters = ?statement.parameters(), "Executing statement");
        }
    }

    pub(crate) async fn fetch_statement(&self, statement: &Statement) -> Result<Vec<Record>> {
        let mut tx = self.begin().await?;
        let result = self.fetch(tx.as_mut(), statement).await;
        Self::finish(tx, result).await
    }

    pub(crate) async fn run_statement(&self, statement: &Statement) -> Result<ResultSummary> {
        let mut tx = self.begin().await?;
        let result = self.run(tx.as_mut(), statement).await;
        Self::finish(tx, result).await
    }

    // ── Saving ───────────────────────────────────────────────────

    /// Save an entity and everything reachable from it.
    ///
    /// Ids and versions are written back onto every saved instance, and
    /// restored if the transaction rolls back.
    pub async fn save(&self, entity: &EntityRef) -> Result<EntityRef> {
        let mut tx = self.begin().await?;
        let result = self.save_in(tx.as_mut(), entity).await;
        Self::finish(tx, result).await
    }

    pub async fn save_in(&self, tx: &mut dyn Transaction, entity: &EntityRef) -> Result<EntityRef> {
        let descriptor = self.context.descriptor_for(entity)?;
        let mut state = ProcessState::new(entity);
        let (internal_id, was_new) = self.save_node(tx, &descriptor, entity).await?;
        self.process_relations(tx, &descriptor, entity, internal_id, was_new, &mut state)
            .await?;
        Ok(entity.clone())
    }

    /// Save several entities in one transaction.
    ///
    /// Entities of one type that supports it are written with a single
    /// batched statement; their associations are processed afterwards.
    pub async fn save_all(&self, entities: &[EntityRef]) -> Result<Vec<EntityRef>> {
        let mut tx = self.begin().await?;
        let result = self.save_all_in(tx.as_mut(), entities).await;
        Self::finish(tx, result).await
    }

    pub async fn save_all_in(&self, tx: &mut dyn Transaction, entities: &[EntityRef]) -> Result<Vec<EntityRef>> {
        let Some(first) = entities.first() else {
            return Ok(Vec::new());
        };
        let type_name = first.type_name();
        let descriptor = self.context.descriptor(&type_name)?;
        let same_type = entities.iter().all(|e| e.type_name() == type_name);

        if !(self.settings.batch_saves && same_type && descriptor.supports_batch_save()) {
            tracing::debug!(count = entities.len(), "Saving entities using single statements");
            let mut saved = Vec::with_capacity(entities.len());
            for entity in entities {
                saved.push(self.save_in(tx, entity).await?);
            }
            return Ok(saved);
        }

        let mut was_new = Vec::with_capacity(entities.len());
        let mut bound = Vec::with_capacity(entities.len());
        for entity in entities {
            was_new.push(descriptor.is_new(entity));
            self.assign_id(tx, &descriptor, entity)?;
            self.callbacks.before_bind(entity)?;
            let mut row = serde_json::Map::new();
            row.insert(NAME_OF_ID.to_string(), descriptor.id_value(entity).unwrap_or(Value::Null));
            row.insert(
                NAME_OF_PROPERTIES_PARAM.to_string(),
                Value::Object(descriptor.bind_properties(entity)),
            );
            bound.push(Value::Object(row));
        }

        let statement = self
            .generator
            .save_batch(&descriptor)?
            .bind(NAME_OF_ENTITY_LIST_PARAM, bound);
        let rows = self.fetch(tx, &statement).await?;
        if rows.len() != entities.len() {
            return Err(Error::IncorrectResultSize {
                expected: entities.len(),
                actual: rows.len(),
            });
        }
        tracing::debug!(label = %descriptor.primary_label(), count = rows.len(), "Saved entities in one batch");

        for ((entity, row), was_new) in entities.iter().zip(&rows).zip(was_new) {
            let internal_id = internal_id_of(row, &statement)?;
            let mut state = ProcessState::new(entity);
            self.process_relations(tx, &descriptor, entity, internal_id, was_new, &mut state)
                .await?;
        }
        Ok(entities.to_vec())
    }

    /// Write one node: assign its id, run callbacks, replace its dynamic
    /// labels and properties, and write back the internal id and version.
    ///
    /// Returns the internal id and whether the entity was new before the
    /// call.
    pub(crate) async fn save_node(
        &self,
        tx: &mut dyn Transaction,
        descriptor: &EntityDescriptor,
        entity: &EntityRef,
    ) -> Result<(i64, bool)> {
        let was_new = descriptor.is_new(entity);
        self.assign_id(tx, descriptor, entity)?;
        self.callbacks.before_bind(entity)?;

        let id = descriptor.id_value(entity).unwrap_or(Value::Null);
        let old_version = descriptor.version_value(entity);
        let next_version = old_version.map_or(0, |v| v + 1);
        let dynamic_labels = self
            .dynamic_labels(tx, descriptor, entity, &id, old_version)
            .await?;

        let mut properties = descriptor.bind_properties(entity);
        if let Some(version) = &descriptor.version {
            properties.insert(version.property_name.clone(), Value::from(next_version));
        }
        let mut statement = self
            .generator
            .save(descriptor, &dynamic_labels)
            .bind(NAME_OF_ID, id.clone())
            .bind(NAME_OF_PROPERTIES_PARAM, Value::Object(properties));
        if descriptor.has_version() {
            statement.set_parameter(NAME_OF_VERSION_PARAM, old_version.map_or(Value::Null, Value::from));
        }

        let rows = self.fetch(tx, &statement).await?;
        let Some(row) = rows.first() else {
            if descriptor.has_version() {
                return Err(Error::OptimisticLocking {
                    label: descriptor.primary_label().to_string(),
                    id: display_value(&id),
                });
            }
            return Err(Error::NoResult {
                expected: 1,
                query: statement.cypher().to_string(),
            });
        };
        let internal_id = internal_id_of(row, &statement)?;

        if descriptor.is_using_internal_ids() {
            write_back(tx, entity, &descriptor.id.field_name, Value::from(internal_id));
        }
        if let Some(version) = &descriptor.version {
            write_back(tx, entity, &version.field_name, Value::from(next_version));
        }
        tracing::debug!(label = %descriptor.primary_label(), id = internal_id, was_new, "Saved node");
        Ok((internal_id, was_new))
    }

    fn assign_id(&self, tx: &mut dyn Transaction, descriptor: &EntityDescriptor, entity: &EntityRef) -> Result<()> {
        if descriptor.id_value(entity).is_some() {
            return Ok(());
        }
        match &descriptor.id.strategy {
            IdStrategy::Internal => Ok(()),
            IdStrategy::Assigned => Err(Error::Mapping(format!(
                "{} uses assigned ids but {} is not set",
                descriptor.type_name, descriptor.id.field_name
            ))),
            IdStrategy::Generated(generator) => {
                let id = generator.generate_id(descriptor.primary_label(), entity);
                write_back(tx, entity, &descriptor.id.field_name, id);
                Ok(())
            }
        }
    }

    async fn dynamic_labels(
        &self,
        tx: &mut dyn Transaction,
        descriptor: &EntityDescriptor,
        entity: &EntityRef,
        id: &Value,
        version: Option<i64>,
    ) -> Result<DynamicLabels> {
        let Some(field) = &descriptor.dynamic_labels else {
            return Ok(DynamicLabels::none());
        };
        let new_labels = entity.labels_in(field);
        if id.is_null() {
            return Ok(DynamicLabels::new(Vec::new(), new_labels));
        }

        let mut statement = self
            .generator
            .dynamic_labels_of(descriptor)
            .bind(NAME_OF_ID, id.clone());
        if descriptor.has_version() {
            statement.set_parameter(NAME_OF_VERSION_PARAM, version.map_or(Value::Null, Value::from));
        }
        let rows = self.fetch(tx, &statement).await?;
        let old_labels = rows
            .first()
            .and_then(|row| row.get(NAME_OF_LABELS))
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(DynamicLabels::new(old_labels, new_labels))
    }

    // ── Finding ──────────────────────────────────────────────────

    pub async fn find_by_id(&self, type_name: &str, id: impl Into<Value>) -> Result<Option<EntityRef>> {
        let mut tx = self.begin().await?;
        let result = self.find_by_id_in(tx.as_mut(), type_name, id.into()).await;
        Self::finish(tx, result).await
    }

    pub async fn find_by_id_in(
        &self,
        tx: &mut dyn Transaction,
        type_name: &str,
        id: Value,
    ) -> Result<Option<EntityRef>> {
        let descriptor = self.context.descriptor(type_name)?;
        let (statement, parameter) = self.generator.match_by_id(&descriptor);
        let mut found = self
            .fetch_entities(tx, &descriptor, &statement.bind(parameter, id))
            .await?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            actual => Err(Error::IncorrectResultSize { expected: 1, actual }),
        }
    }

    pub async fn find_all_by_id(&self, type_name: &str, ids: Vec<Value>) -> Result<Vec<EntityRef>> {
        let mut tx = self.begin().await?;
        let result = self.find_all_by_id_in(tx.as_mut(), type_name, ids).await;
        Self::finish(tx, result).await
    }

    pub async fn find_all_by_id_in(
        &self,
        tx: &mut dyn Transaction,
        type_name: &str,
        ids: Vec<Value>,
    ) -> Result<Vec<EntityRef>> {
        let descriptor = self.context.descriptor(type_name)?;
        let (statement, parameter) = self.generator.match_all_by_id(&descriptor);
        self.fetch_entities(tx, &descriptor, &statement.bind(parameter, ids))
            .await
    }

    pub async fn find_all(&self, type_name: &str) -> Result<Vec<EntityRef>> {
        self.find_all_sorted(type_name, &Sort::unsorted()).await
    }

    pub async fn find_all_sorted(&self, type_name: &str, sort: &Sort) -> Result<Vec<EntityRef>> {
        let mut tx = self.begin().await?;
        let result = self.find_all_in(tx.as_mut(), type_name, sort).await;
        Self::finish(tx, result).await
    }

    pub async fn find_all_in(
        &self,
        tx: &mut dyn Transaction,
        type_name: &str,
        sort: &Sort,
    ) -> Result<Vec<EntityRef>> {
        let descriptor = self.context.descriptor(type_name)?;
        let statement = self.generator.match_all(&descriptor, None, sort, None)?;
        self.fetch_entities(tx, &descriptor, &statement).await
    }

    /// One page of entities, ordered by the page's sort, plus the total count.
    pub async fn find_page(&self, type_name: &str, pageable: &Pageable) -> Result<Page<EntityRef>> {
        let mut tx = self.begin().await?;
        let result = self.find_page_in(tx.as_mut(), type_name, pageable).await;
        Self::finish(tx, result).await
    }

    pub async fn find_page_in(
        &self,
        tx: &mut dyn Transaction,
        type_name: &str,
        pageable: &Pageable,
    ) -> Result<Page<EntityRef>> {
        let descriptor = self.context.descriptor(type_name)?;
        let statement = self
            .generator
            .match_all(&descriptor, None, &pageable.sort, Some(pageable))?;
        let content = self.fetch_entities(tx, &descriptor, &statement).await?;
        let total = self
            .fetch_count(tx, &self.generator.count(&descriptor, None))
            .await?;
        Ok(Page::new(content, pageable.clone(), total))
    }

    pub async fn find_all_by_example(&self, example: &Example) -> Result<Vec<EntityRef>> {
        let mut tx = self.begin().await?;
        let result = self.find_all_by_example_in(tx.as_mut(), example, &Sort::unsorted()).await;
        Self::finish(tx, result).await
    }

    pub async fn find_all_by_example_in(
        &self,
        tx: &mut dyn Transaction,
        example: &Example,
        sort: &Sort,
    ) -> Result<Vec<EntityRef>> {
        let descriptor = self.context.descriptor_for(example.probe())?;
        let (condition, parameters) = Predicate::create(&self.context, example)?.into_parts();
        let statement = self
            .generator
            .match_all(&descriptor, condition, sort, None)?
            .bind_all(parameters);
        self.fetch_entities(tx, &descriptor, &statement).await
    }

    /// The single entity matching the example.
    ///
    /// More than one match is an [`Error::IncorrectResultSize`].
    pub async fn find_one_by_example(&self, example: &Example) -> Result<Option<EntityRef>> {
        let mut found = self.find_all_by_example(example).await?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            actual => Err(Error::IncorrectResultSize { expected: 1, actual }),
        }
    }

    async fn fetch_entities(
        &self,
        tx: &mut dyn Transaction,
        descriptor: &EntityDescriptor,
        statement: &Statement,
    ) -> Result<Vec<EntityRef>> {
        let rows = self.fetch(tx, statement).await?;
        rows.iter().map(|row| hydrate_row(descriptor, row)).collect()
    }

    // ── Counting ─────────────────────────────────────────────────

    pub async fn count(&self, type_name: &str) -> Result<u64> {
        let descriptor = self.context.descriptor(type_name)?;
        let statement = self.generator.count(&descriptor, None);
        let mut tx = self.begin().await?;
        let result = self.fetch_count(tx.as_mut(), &statement).await;
        Self::finish(tx, result).await
    }

    pub async fn count_by_example(&self, example: &Example) -> Result<u64> {
        let descriptor = self.context.descriptor_for(example.probe())?;
        let (condition, parameters) = Predicate::create(&self.context, example)?.into_parts();
        let statement = self.generator.count(&descriptor, condition).bind_all(parameters);
        let mut tx = self.begin().await?;
        let result = self.fetch_count(tx.as_mut(), &statement).await;
        Self::finish(tx, result).await
    }

    pub async fn exists_by_id(&self, type_name: &str, id: impl Into<Value>) -> Result<bool> {
        let descriptor = self.context.descriptor(type_name)?;
        let condition = id_expression(&descriptor).is_equal_to(Expression::parameter(NAME_OF_ID));
        let statement = self
            .generator
            .count(&descriptor, Some(condition))
            .bind(NAME_OF_ID, id.into());
        let mut tx = self.begin().await?;
        let result = self.fetch_count(tx.as_mut(), &statement).await;
        Ok(Self::finish(tx, result).await? > 0)
    }

    async fn fetch_count(&self, tx: &mut dyn Transaction, statement: &Statement) -> Result<u64> {
        let rows = self.fetch(tx, statement).await?;
        rows.first()
            .and_then(|row| row.get(NAME_OF_COUNT))
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::NoResult {
                expected: 1,
                query: statement.cypher().to_string(),
            })
    }

    // ── Deleting ─────────────────────────────────────────────────

    /// Delete one node and its relationships. Returns the number deleted.
    pub async fn delete_by_id(&self, type_name: &str, id: impl Into<Value>) -> Result<u64> {
        let mut tx = self.begin().await?;
        let result = self.delete_by_id_in(tx.as_mut(), type_name, id.into()).await;
        Self::finish(tx, result).await
    }

    pub async fn delete_by_id_in(&self, tx: &mut dyn Transaction, type_name: &str, id: Value) -> Result<u64> {
        let descriptor = self.context.descriptor(type_name)?;
        let (statement, parameter) = self.generator.delete_by_id(&descriptor);
        let deleted = self.fetch_count(tx, &statement.bind(parameter, id)).await?;
        tracing::debug!(label = %descriptor.primary_label(), deleted, "Deleted by id");
        Ok(deleted)
    }

    /// Delete one node only if it still carries `version`.
    pub async fn delete_by_id_with_version(
        &self,
        type_name: &str,
        id: impl Into<Value>,
        version: i64,
    ) -> Result<()> {
        let mut tx = self.begin().await?;
        let result = self
            .delete_by_id_with_version_in(tx.as_mut(), type_name, id.into(), version)
            .await;
        Self::finish(tx, result).await
    }

    pub async fn delete_by_id_with_version_in(
        &self,
        tx: &mut dyn Transaction,
        type_name: &str,
        id: Value,
        version: i64,
    ) -> Result<()> {
        let descriptor = self.context.descriptor(type_name)?;
        let Some(version_property) = &descriptor.version else {
            return Err(Error::Mapping(format!("{type_name} is not versioned")));
        };
        let condition = id_expression(&descriptor)
            .is_equal_to(Expression::parameter(NAME_OF_ID))
            .and(
                Expression::property(&version_property.property_name)
                    .is_equal_to(Expression::parameter(NAME_OF_VERSION_PARAM)),
            );
        let statement = self
            .generator
            .delete_by_condition(&descriptor, condition)
            .bind(NAME_OF_ID, id.clone())
            .bind(NAME_OF_VERSION_PARAM, version);
        if self.fetch_count(tx, &statement).await? == 0 {
            return Err(Error::OptimisticLocking {
                label: descriptor.primary_label().to_string(),
                id: display_value(&id),
            });
        }
        Ok(())
    }

    pub async fn delete_all_by_id(&self, type_name: &str, ids: Vec<Value>) -> Result<u64> {
        let descriptor = self.context.descriptor(type_name)?;
        let (statement, parameter) = self.generator.delete_all_by_id(&descriptor);
        let statement = statement.bind(parameter, ids);
        let mut tx = self.begin().await?;
        let result = self.fetch_count(tx.as_mut(), &statement).await;
        Self::finish(tx, result).await
    }

    pub async fn delete_all(&self, type_name: &str) -> Result<u64> {
        let descriptor = self.context.descriptor(type_name)?;
        let statement = self.generator.delete_all(&descriptor);
        let mut tx = self.begin().await?;
        let result = self.fetch_count(tx.as_mut(), &statement).await;
        Self::finish(tx, result).await
    }

    /// Delete the node of a loaded entity. Versioned entities are checked
    /// against their current version.
    pub async fn delete(&self, entity: &EntityRef) -> Result<()> {
        let descriptor = self.context.descriptor_for(entity)?;
        let Some(id) = descriptor.id_value(entity) else {
            return Err(Error::Mapping(format!(
                "Cannot delete an unsaved {}",
                descriptor.type_name
            )));
        };
        match descriptor.version_value(entity) {
            Some(version) => {
                self.delete_by_id_with_version(&descriptor.type_name, id, version)
                    .await
            }
            None => self.delete_by_id(&descriptor.type_name, id).await.map(|_| ()),
        }
    }

    // ── Prepared queries ─────────────────────────────────────────

    /// Bind a prepared query to this template. Nothing runs until a
    /// terminal accessor is awaited.
    pub fn to_executable_query<T>(&self, query: PreparedQuery<T>) -> ExecutableQuery<'_, T> {
        ExecutableQuery::new(self, query)
    }

    /// A prepared query returning every node of a type that matches the example.
    pub fn prepare_find_by_example(&self, example: &Example) -> Result<PreparedQuery<EntityRef>> {
        let descriptor = self.context.descriptor_for(example.probe())?;
        let (condition, parameters) = Predicate::create(&self.context, example)?.into_parts();
        let statement = self
            .generator
            .match_all(&descriptor, condition, &Sort::unsorted(), None)?
            .bind_all(parameters);
        Ok(PreparedQuery::for_entities(descriptor, statement))
    }
}

/// Set a field on a saved instance and restore its previous value if the
/// transaction does not commit.
fn write_back(tx: &mut dyn Transaction, entity: &EntityRef, field: &str, value: Value) {
    let previous = entity.get(field);
    entity.set(field, value);
    let entity = entity.clone();
    let field = field.to_string();
    tx.on_rollback(Box::new(move || match previous {
        Some(value) => entity.set(&field, value),
        None => entity.unset(&field),
    }));
}

fn internal_id_of(row: &Record, statement: &Statement) -> Result<i64> {
    row.get(NAME_OF_INTERNAL_ID)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::NoResult {
            expected: 1,
            query: statement.cypher().to_string(),
        })
}
