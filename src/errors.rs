use std::sync::Arc;

use thiserror::Error;

/// Error type that captures the failure taxonomy of the ledger core.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Requested document is absent. Often legitimate, e.g. reading a period
    /// before its first use.
    #[error("not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    /// The store rejected a read or write. Reads of not-yet-created documents
    /// are treated as not-found by the fetch helpers.
    #[error("permission denied: {collection}/{id}")]
    PermissionDenied { collection: String, id: String },
    #[error("durable write failed: {0}")]
    WriteFailed(String),
    /// Boundary bookkeeping produced an impossible state. Indicates a bug and
    /// must fail loudly rather than be silently corrected.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid request: {0}")]
    Invalid(String),
    /// A failure observed through a deduplicated in-flight recalculation that
    /// more than one caller may be awaiting.
    #[error("{0}")]
    Shared(Arc<LedgerError>),
}

impl LedgerError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn permission_denied(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::PermissionDenied {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Peels `Shared` wrappers off an error observed through a deduplicated
    /// recalculation.
    pub fn root(&self) -> &LedgerError {
        let mut err = self;
        while let Self::Shared(inner) = err {
            err = inner.as_ref();
        }
        err
    }
}
