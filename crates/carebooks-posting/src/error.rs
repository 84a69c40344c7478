use carebooks_core::{AccountRole, DocumentKind, LedgerError, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PostingError {
    #[error("accounting configuration missing: no {0} account is mapped")]
    ConfigurationMissing(AccountRole),

    #[error("{kind} {id} not found")]
    EntityNotFound { kind: DocumentKind, id: Uuid },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("journal invariant violated: {0}")]
    Ledger(#[from] LedgerError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl PostingError {
    pub fn not_found(kind: DocumentKind, id: Uuid) -> Self {
        Self::EntityNotFound { kind, id }
    }

    /// Stable machine-readable name for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::Ledger(_) => "ledger_invariant",
            Self::Persistence(_) => "persistence_failure",
        }
    }
}

pub type PostingResult<T> = Result<T, PostingError>;
