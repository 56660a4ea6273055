//! Synchronous access for callers without an async runtime.
//!
//! [`BlockingTemplate`] owns a current-thread runtime and drives the async
//! [`Template`] on it. It must not be used from inside another runtime.

use serde_json::Value;
use strand_core::{DriverError, EntityRef, Result};
use strand_cypher::{Example, Pageable, Sort};
use strand_graph::ResultSummary;
use tokio::runtime::{Builder, Runtime};

use crate::query::{ExecutableQuery, Page, PreparedQuery};
use crate::template::Template;

pub struct BlockingTemplate {
    template: Template,
    runtime: Runtime,
}

impl BlockingTemplate {
    pub fn new(template: Template) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DriverError::permanent(format!("Failed to start runtime: {e}")))?;
        Ok(Self { template, runtime })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn save(&self, entity: &EntityRef) -> Result<EntityRef> {
        self.runtime.block_on(self.template.save(entity))
    }

    pub fn save_all(&self, entities: &[EntityRef]) -> Result<Vec<EntityRef>> {
        self.runtime.block_on(self.template.save_all(entities))
    }

    pub fn find_by_id(&self, type_name: &str, id: impl Into<Value>) -> Result<Option<EntityRef>> {
        self.runtime.block_on(self.template.find_by_id(type_name, id))
    }

    pub fn find_all_by_id(&self, type_name: &str, ids: Vec<Value>) -> Result<Vec<EntityRef>> {
        self.runtime.block_on(self.template.find_all_by_id(type_name, ids))
    }

    pub fn find_all(&self, type_name: &str) -> Result<Vec<EntityRef>> {
        self.runtime.block_on(self.template.find_all(type_name))
    }

    pub fn find_all_sorted(&self, type_name: &str, sort: &Sort) -> Result<Vec<EntityRef>> {
        self.runtime.block_on(self.template.find_all_sorted(type_name, sort))
    }

    pub fn find_page(&self, type_name: &str, pageable: &Pageable) -> Result<Page<EntityRef>> {
        self.runtime.block_on(self.template.find_page(type_name, pageable))
    }

    pub fn find_all_by_example(&self, example: &Example) -> Result<Vec<EntityRef>> {
        self.runtime.block_on(self.template.find_all_by_example(example))
    }

    pub fn find_one_by_example(&self, example: &Example) -> Result<Option<EntityRef>> {
        self.runtime.block_on(self.template.find_one_by_example(example))
    }

    pub fn count(&self, type_name: &str) -> Result<u64> {
        self.runtime.block_on(self.template.count(type_name))
    }

    pub fn count_by_example(&self, example: &Example) -> Result<u64> {
        self.runtime.block_on(self.template.count_by_example(example))
    }

    pub fn exists_by_id(&self, type_name: &str, id: impl Into<Value>) -> Result<bool> {
        self.runtime.block_on(self.template.exists_by_id(type_name, id))
    }

    pub fn delete_by_id(&self, type_name: &str, id: impl Into<Value>) -> Result<u64> {
        self.runtime.block_on(self.template.delete_by_id(type_name, id))
    }

    pub fn delete_by_id_with_version(&self, type_name: &str, id: impl Into<Value>, version: i64) -> Result<()> {
        self.runtime
            .block_on(self.template.delete_by_id_with_version(type_name, id, version))
    }

    pub fn delete_all_by_id(&self, type_name: &str, ids: Vec<Value>) -> Result<u64> {
        self.runtime.block_on(self.template.delete_all_by_id(type_name, ids))
    }

    pub fn delete_all(&self, type_name: &str) -> Result<u64> {
        self.runtime.block_on(self.template.delete_all(type_name))
    }

    pub fn delete(&self, entity: &EntityRef) -> Result<()> {
        self.runtime.block_on(self.template.delete(entity))
    }

    pub fn to_executable_query<T>(&self, query: PreparedQuery<T>) -> BlockingQuery<'_, T> {
        BlockingQuery {
            runtime: &self.runtime,
            query: self.template.to_executable_query(query),
        }
    }
}

/// The synchronous counterpart of [`ExecutableQuery`].
pub struct BlockingQuery<'t, T> {
    runtime: &'t Runtime,
    query: ExecutableQuery<'t, T>,
}

impl<'t, T> BlockingQuery<'t, T> {
    pub fn all(self) -> Result<Vec<T>> {
        self.runtime.block_on(self.query.all())
    }

    pub fn one(self) -> Result<Option<T>> {
        self.runtime.block_on(self.query.one())
    }

    pub fn first(self) -> Result<Option<T>> {
        self.runtime.block_on(self.query.first())
    }

    pub fn required_one(self) -> Result<T> {
        self.runtime.block_on(self.query.required_one())
    }

    pub fn run(self) -> Result<ResultSummary> {
        self.runtime.block_on(self.query.run())
    }
}
