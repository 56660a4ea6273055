use std::fmt;

use thiserror::Error;

/// Top-level error type for Strand.
#[derive(Error, Debug)]
pub enum Error {
    /// Schema or mapping misconfiguration. Detected eagerly, never retried.
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// A versioned save or delete matched no node with the expected version.
    #[error("An entity with the required version does not exist: {label} with id {id}")]
    OptimisticLocking { label: String, id: String },

    #[error("Incorrect result size: expected {expected}, actual {actual}")]
    IncorrectResultSize { expected: usize, actual: usize },

    #[error("Expected {expected} result(s) but got none for query: {query}")]
    NoResult { expected: usize, query: String },

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Failure while persisting an association, with the path that led to it.
    #[error("Failed to persist association {path}: {source}")]
    Association {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Entity callback failed: {source}")]
    Callback {
        #[source]
        source: anyhow::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Wrap this error with the association it occurred under.
    ///
    /// Nested wrapping produces a single path, outermost association first.
    pub fn within_association(self, segment: &str) -> Self {
        match self {
            Error::Association { path, source } => Error::Association {
                path: format!("{segment} -> {path}"),
                source,
            },
            other => Error::Association {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping association wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Association { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failed operation may succeed when retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::Driver(DriverError {
                kind: DriverErrorKind::Transient,
                ..
            })
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of errors reported by the database driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Deadlocks, leader switches, unavailable servers.
    Transient,
    /// Constraint violations, syntax errors and anything else not worth retrying.
    Permanent,
    /// Authentication and authorization failures.
    AccessDenied,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverErrorKind::Transient => "transient",
            DriverErrorKind::Permanent => "permanent",
            DriverErrorKind::AccessDenied => "access denied",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Permanent, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::AccessDenied, message)
    }
}
