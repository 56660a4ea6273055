//! Hooks that run before an entity is bound to a save statement.

use std::sync::Arc;

use strand_core::{EntityRef, Error, Result};

/// Runs before every entity, root or related, is bound to a statement.
///
/// The callback may modify the entity; what it leaves behind is what gets
/// written.
pub trait BeforeBindCallback: Send + Sync {
    fn on_before_bind(&self, entity: &EntityRef) -> anyhow::Result<()>;
}

impl<F> BeforeBindCallback for F
where
    F: Fn(&EntityRef) -> anyhow::Result<()> + Send + Sync,
{
    fn on_before_bind(&self, entity: &EntityRef) -> anyhow::Result<()> {
        self(entity)
    }
}

/// The registered callbacks, invoked in registration order.
#[derive(Clone, Default)]
pub struct EntityCallbacks {
    before_bind: Vec<Arc<dyn BeforeBindCallback>>,
}

impl EntityCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: impl BeforeBindCallback + 'static) {
        self.before_bind.push(Arc::new(callback));
    }

    pub fn len(&self) -> usize {
        self.before_bind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.before_bind.is_empty()
    }

    pub(crate) fn before_bind(&self, entity: &EntityRef) -> Result<()> {
        for callback in &self.before_bind {
            callback
                .on_before_bind(entity)
                .map_err(|source| Error::Callback { source })?;
        }
        Ok(())
    }
}
