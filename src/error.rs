use crate::model::{AuditAction, Guid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a catalog client
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Temporary failure worth retrying (index not ready, throttling, connection reset)
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl CatalogError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, CatalogError::InvalidRequest(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "not_found",
            CatalogError::InvalidRequest(_) => "invalid_request",
            CatalogError::Conflict(_) => "conflict",
            CatalogError::Transient(_) => "transient",
            CatalogError::Unexpected(_) => "unexpected",
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failures raised by the harness itself rather than the catalog
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("audit trail exhausted after {scanned} entries while expecting {expected}")]
    AuditExhausted { expected: String, scanned: usize },
    #[error("expected {expected} but found {found} audit entry ({event_key})")]
    UnexpectedAudit {
        expected: String,
        found: AuditAction,
        event_key: String,
    },
    #[error("category {guid} is part of a cycle")]
    HierarchyCycle { guid: Guid },
    #[error("category {guid} references unknown parent {parent}")]
    UnknownParent { guid: Guid, parent: Guid },
    #[error("step '{0}' is declared more than once")]
    DuplicateStep(String),
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
    #[error("step '{step}' cannot depend on finalizer '{finalizer}'")]
    FinalizerDependency { step: String, finalizer: String },
    #[error("steps form a dependency cycle: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
