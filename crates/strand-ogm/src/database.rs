//! Selection of the target database for one persistence call.

use std::sync::Arc;

/// The database a call should run against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabaseSelection {
    /// Whatever the server or driver considers the default.
    #[default]
    Default,
    Named(String),
}

impl DatabaseSelection {
    pub fn by_name(name: &str) -> Self {
        if name.is_empty() {
            DatabaseSelection::Default
        } else {
            DatabaseSelection::Named(name.to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DatabaseSelection::Default => None,
            DatabaseSelection::Named(name) => Some(name),
        }
    }
}

/// Resolves the database once at the start of every public call.
pub trait DatabaseSelectionProvider: Send + Sync {
    fn database_selection(&self) -> DatabaseSelection;
}

impl<F> DatabaseSelectionProvider for F
where
    F: Fn() -> DatabaseSelection + Send + Sync,
{
    fn database_selection(&self) -> DatabaseSelection {
        self()
    }
}

/// Always selects the same database.
#[derive(Debug, Clone, Default)]
pub struct StaticDatabaseSelection(DatabaseSelection);

impl StaticDatabaseSelection {
    pub fn new(selection: DatabaseSelection) -> Self {
        Self(selection)
    }
}

impl DatabaseSelectionProvider for StaticDatabaseSelection {
    fn database_selection(&self) -> DatabaseSelection {
        self.0.clone()
    }
}

pub(crate) fn default_provider() -> Arc<dyn DatabaseSelectionProvider> {
    Arc::new(StaticDatabaseSelection::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_select_the_default() {
        assert_eq!(DatabaseSelection::by_name(""), DatabaseSelection::Default);
        assert_eq!(DatabaseSelection::by_name("movies").name(), Some("movies"));
        assert_eq!(DatabaseSelection::Default.name(), None);
    }

    #[test]
    fn closures_are_providers() {
        let provider = || DatabaseSelection::by_name("tenant-a");
        assert_eq!(provider.database_selection().name(), Some("tenant-a"));
        assert_eq!(
            StaticDatabaseSelection::default().database_selection(),
            DatabaseSelection::Default
        );
    }
}
