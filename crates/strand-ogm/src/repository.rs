//! Typed access to one entity type.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use strand_core::schema::{EntityDescriptor, GraphEntity};
use strand_core::{EntityRef, Result};
use strand_cypher::{Example, ExampleMatcher, Pageable, Sort};

use crate::query::Page;
use crate::template::Template;

/// A [`Template`] bound to `T`.
///
/// Values convert to and from entities through serde, so only scalar fields
/// (ids, properties, versions and dynamic labels) round-trip. Use the
/// template directly to save object graphs with associations.
pub struct Repository<T> {
    template: Template,
    descriptor: Arc<EntityDescriptor>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Repository<T>
where
    T: GraphEntity + Serialize + DeserializeOwned,
{
    /// Registers `T` with the template's mapping context if needed.
    pub fn new(template: Template) -> Result<Self> {
        let descriptor = template.context().descriptor_of::<T>()?;
        Ok(Self {
            template,
            descriptor,
            _entity: PhantomData,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    fn to_entity(value: &T) -> Result<EntityRef> {
        EntityRef::from_serde(T::TYPE_NAME, value)
    }

    fn to_values(entities: Vec<EntityRef>) -> Result<Vec<T>> {
        entities.iter().map(|e| e.to_typed::<T>()).collect()
    }

    /// Save and return the value with its id and version filled in.
    pub async fn save(&self, value: &T) -> Result<T> {
        let entity = Self::to_entity(value)?;
        self.template.save(&entity).await?.to_typed()
    }

    pub async fn save_all(&self, values: &[T]) -> Result<Vec<T>> {
        let entities = values
            .iter()
            .map(Self::to_entity)
            .collect::<Result<Vec<_>>>()?;
        Self::to_values(self.template.save_all(&entities).await?)
    }

    pub async fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<T>> {
        self.template
            .find_by_id(T::TYPE_NAME, id)
            .await?
            .map(|e| e.to_typed())
            .transpose()
    }

    pub async fn find_all_by_id(&self, ids: Vec<Value>) -> Result<Vec<T>> {
        Self::to_values(self.template.find_all_by_id(T::TYPE_NAME, ids).await?)
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        Self::to_values(self.template.find_all(T::TYPE_NAME).await?)
    }

    pub async fn find_all_sorted(&self, sort: &Sort) -> Result<Vec<T>> {
        Self::to_values(self.template.find_all_sorted(T::TYPE_NAME, sort).await?)
    }

    pub async fn find_page(&self, pageable: &Pageable) -> Result<Page<T>> {
        let page = self.template.find_page(T::TYPE_NAME, pageable).await?;
        let content = Self::to_values(page.content)?;
        Ok(Page::new(content, page.pageable, page.total))
    }

    pub async fn find_all_by_example(&self, probe: &T, matcher: ExampleMatcher) -> Result<Vec<T>> {
        let example = Example::with_matcher(Self::to_entity(probe)?, matcher);
        Self::to_values(self.template.find_all_by_example(&example).await?)
    }

    pub async fn find_one_by_example(&self, probe: &T, matcher: ExampleMatcher) -> Result<Option<T>> {
        let example = Example::with_matcher(Self::to_entity(probe)?, matcher);
        self.template
            .find_one_by_example(&example)
            .await?
            .map(|e| e.to_typed())
            .transpose()
    }

    pub async fn count(&self) -> Result<u64> {
        self.template.count(T::TYPE_NAME).await
    }

    pub async fn count_by_example(&self, probe: &T, matcher: ExampleMatcher) -> Result<u64> {
        let example = Example::with_matcher(Self::to_entity(probe)?, matcher);
        self.template.count_by_example(&example).await
    }

    pub async fn exists_by_id(&self, id: impl Into<Value>) -> Result<bool> {
        self.template.exists_by_id(T::TYPE_NAME, id).await
    }

    pub async fn delete_by_id(&self, id: impl Into<Value>) -> Result<u64> {
        self.template.delete_by_id(T::TYPE_NAME, id).await
    }

    pub async fn delete_all_by_id(&self, ids: Vec<Value>) -> Result<u64> {
        self.template.delete_all_by_id(T::TYPE_NAME, ids).await
    }

    pub async fn delete_all(&self) -> Result<u64> {
        self.template.delete_all(T::TYPE_NAME).await
    }

    pub async fn delete(&self, value: &T) -> Result<()> {
        self.template.delete(&Self::to_entity(value)?).await
    }
}
