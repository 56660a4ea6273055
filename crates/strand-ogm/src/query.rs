//! Prepared and executable queries.
//!
//! A [`PreparedQuery`] is a statement plus the knowledge of how to turn
//! rows into values. [`Template::to_executable_query`] binds it to a
//! template; nothing runs until one of the terminal accessors is awaited.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strand_core::schema::EntityDescriptor;
use strand_core::{EntityRef, Error, Result};
use strand_cypher::{Pageable, Statement, NAME_OF_INTERNAL_ID, NAME_OF_LABELS, NAME_OF_ROOT_NODE};
use strand_graph::{Record, ResultSummary};

use crate::template::Template;

/// Maps one result row to a value.
pub type RowMapper<T> = Arc<dyn Fn(&Record) -> Result<T> + Send + Sync>;

/// How many rows a query is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    /// Executed for its side effects only.
    None,
    Single,
    #[default]
    Many,
}

pub struct PreparedQuery<T> {
    statement: Statement,
    mapper: RowMapper<T>,
    shape: ResultShape,
}

impl PreparedQuery<Record> {
    /// A query returning raw rows.
    pub fn new(statement: Statement) -> Self {
        Self::with_mapper(statement, |row: &Record| Ok(row.clone()))
    }
}

impl PreparedQuery<EntityRef> {
    /// A query whose `n` column holds nodes of the described type.
    pub fn for_entities(descriptor: Arc<EntityDescriptor>, statement: Statement) -> Self {
        Self::with_mapper(statement, move |row: &Record| hydrate_row(&descriptor, row))
    }
}

impl<T> PreparedQuery<T> {
    pub fn with_mapper<F>(statement: Statement, mapper: F) -> Self
    where
        F: Fn(&Record) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            statement,
            mapper: Arc::new(mapper),
            shape: ResultShape::default(),
        }
    }

    pub fn expecting(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    pub(crate) fn map_rows(&self, rows: &[Record]) -> Result<Vec<T>> {
        rows.iter().map(|row| (self.mapper)(row)).collect()
    }
}

impl<T> Clone for PreparedQuery<T> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            mapper: Arc::clone(&self.mapper),
            shape: self.shape,
        }
    }
}

impl<T> fmt::Debug for PreparedQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("statement", &self.statement.cypher())
            .field("shape", &self.shape)
            .finish()
    }
}

/// A prepared query bound to a template. Each accessor runs the statement
/// in its own transaction.
pub struct ExecutableQuery<'t, T> {
    template: &'t Template,
    query: PreparedQuery<T>,
}

impl<'t, T> ExecutableQuery<'t, T> {
    pub(crate) fn new(template: &'t Template, query: PreparedQuery<T>) -> Self {
        Self { template, query }
    }

    pub fn statement(&self) -> &Statement {
        self.query.statement()
    }

    /// Every value, checked against the query's [`ResultShape`]: a
    /// `Single` query producing several rows is an
    /// [`Error::IncorrectResultSize`], and a `None` query is only run.
    pub async fn all(self) -> Result<Vec<T>> {
        let statement = self.query.statement();
        match self.query.shape() {
            ResultShape::None => {
                self.template.run_statement(statement).await?;
                Ok(Vec::new())
            }
            ResultShape::Single => {
                let rows = self.template.fetch_statement(statement).await?;
                if rows.len() > 1 {
                    return Err(Error::IncorrectResultSize {
                        expected: 1,
                        actual: rows.len(),
                    });
                }
                self.query.map_rows(&rows)
            }
            ResultShape::Many => {
                let rows = self.template.fetch_statement(statement).await?;
                self.query.map_rows(&rows)
            }
        }
    }

    /// The only result, `None` when there is none.
    ///
    /// More than one row is an [`Error::IncorrectResultSize`].
    pub async fn one(self) -> Result<Option<T>> {
        let mut values = self.all().await?;
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.pop()),
            actual => Err(Error::IncorrectResultSize {
                expected: 1,
                actual,
            }),
        }
    }

    pub async fn first(self) -> Result<Option<T>> {
        Ok(self.all().await?.into_iter().next())
    }

    /// Like [`one`](Self::one), but an empty result is an [`Error::NoResult`].
    pub async fn required_one(self) -> Result<T> {
        let query = self.query.statement().cypher().to_string();
        self.one()
            .await?
            .ok_or(Error::NoResult { expected: 1, query })
    }

    /// Run for side effects only.
    pub async fn run(self) -> Result<ResultSummary> {
        self.template.run_statement(self.query.statement()).await
    }
}

/// One page of results and the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: Pageable, total: u64) -> Self {
        Self {
            content,
            pageable,
            total,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.pageable.size == 0 {
            return 1;
        }
        self.total.div_ceil(self.pageable.size)
    }

    pub fn has_next(&self) -> bool {
        self.pageable.page + 1 < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total: self.total,
        }
    }
}

/// Build an entity from a node projection row.
///
/// The `n` column carries the node's properties plus its internal id and
/// labels. Labels beyond the static ones go to the dynamic-labels field.
pub(crate) fn hydrate_row(descriptor: &EntityDescriptor, row: &Record) -> Result<EntityRef> {
    let node = row
        .get(NAME_OF_ROOT_NODE)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Error::Mapping(format!(
                "Expected a node column `{NAME_OF_ROOT_NODE}` when reading {}",
                descriptor.type_name
            ))
        })?;

    let entity = EntityRef::new(descriptor.type_name.clone());
    descriptor.hydrate(&entity, node);
    if descriptor.is_using_internal_ids() {
        if let Some(id) = node.get(NAME_OF_INTERNAL_ID) {
            entity.set(&descriptor.id.field_name, id.clone());
        }
    }
    if let Some(field) = &descriptor.dynamic_labels {
        let labels: Vec<Value> = node
            .get(NAME_OF_LABELS)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|label| {
                label
                    .as_str()
                    .is_some_and(|l| !descriptor.static_labels().iter().any(|s| s == l))
            })
            .cloned()
            .collect();
        entity.set(field, Value::Array(labels));
    }
    Ok(entity)
}
