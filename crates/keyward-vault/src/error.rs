//! Store error types.
//!
//! Every public operation on [`CredentialStore`](crate::CredentialStore)
//! returns [`StoreError`]. The taxonomy is small: two
//! non-retryable data errors, an expected not-found condition, and an opaque
//! backend status that callers may inspect or retry at their discretion.

use crate::backend::{self, BackendError};

/// Unified error type for the credential store façade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A caller-supplied value cannot be turned into the backend's
    /// representation. The caller must fix the input.
    #[error("cannot encode {field} for the backend: {reason}")]
    Encoding { field: &'static str, reason: String },

    /// The backend returned a record whose mandatory fields are missing or
    /// whose secret bytes are not valid UTF-8.
    #[error("stored record could not be decoded: {reason}")]
    Decoding { reason: String },

    /// No record matches the supplied filter.
    #[error("no credential matches the supplied filter")]
    NotFound,

    /// The backend reported a non-success status (permission denied,
    /// unavailable, conflict on insert, ...).
    #[error("backend error (status {status}): {message}")]
    Backend { status: i32, message: String },
}

impl StoreError {
    /// The raw backend status, if this error came from the backend.
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure was a duplicate identity on insert or rename.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(backend::ERR_SEC_DUPLICATE_ITEM)
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Input and data errors never are; backend statuses are, except for
    /// the ones that describe a malformed request or a conflicting identity.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Encoding { .. } | Self::Decoding { .. } | Self::NotFound => false,
            Self::Backend { status, .. } => !matches!(
                *status,
                backend::ERR_SEC_DUPLICATE_ITEM
                    | backend::ERR_SEC_PARAM
                    | backend::ERR_SEC_NO_SUCH_ATTR
            ),
        }
    }
}

impl From<BackendError> for StoreError {
    /// Fold any backend failure into the opaque status channel.
    ///
    /// Call sites that distinguish "not found" match on
    /// [`BackendError::ItemNotFound`] before converting.
    fn from(err: BackendError) -> Self {
        Self::Backend {
            status: err.code(),
            message: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
