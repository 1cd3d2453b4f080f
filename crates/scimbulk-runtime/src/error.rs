//! Error types for bulk resolution.
//!
//! Two levels exist. A [`BulkError`] rejects the whole request before any
//! operation executes. An [`OperationError`] is recorded against a single
//! operation and rendered into its entry of the bulk response.

use scimbulk_core::ScimError;
use thiserror::Error;

use crate::store::StoreError;

/// Batch-level failures. Nothing executes when one of these is returned.
#[derive(Debug, Error)]
pub enum BulkError {
    /// Malformed request or operation descriptor.
    #[error("invalid bulk request{}: {reason}", at_index(.index))]
    InvalidBatchShape { index: Option<usize>, reason: String },

    /// Two POST operations share a `bulkId`.
    #[error("bulkId '{bulk_id}' is used by operations {first} and {second}")]
    DuplicateTemporaryId {
        bulk_id: String,
        first: usize,
        second: usize,
    },

    /// More operations than the endpoint accepts.
    #[error("bulk request has {actual} operations, maximum is {max}")]
    TooManyOperations { max: usize, actual: usize },

    /// Request body larger than the endpoint accepts.
    #[error("bulk request payload is {actual} bytes, maximum is {max}")]
    PayloadTooLarge { max: usize, actual: usize },

    /// Request body is not a decodable bulk request.
    #[error("bulk request is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn at_index(index: &Option<usize>) -> String {
    index
        .map(|i| format!(" (operation {})", i))
        .unwrap_or_default()
}

impl BulkError {
    pub(crate) fn shape(index: usize, reason: impl Into<String>) -> Self {
        BulkError::InvalidBatchShape {
            index: Some(index),
            reason: reason.into(),
        }
    }

    /// HTTP status for the whole response.
    pub fn status(&self) -> u16 {
        match self {
            BulkError::InvalidBatchShape { .. } | BulkError::Json(_) => 400,
            BulkError::DuplicateTemporaryId { .. } => 409,
            BulkError::TooManyOperations { .. } | BulkError::PayloadTooLarge { .. } => 413,
        }
    }

    /// SCIM error body returned instead of a bulk response.
    pub fn to_scim_error(&self) -> ScimError {
        let scim_type = match self {
            BulkError::InvalidBatchShape { .. } => Some("invalidValue"),
            BulkError::DuplicateTemporaryId { .. } => Some("uniqueness"),
            BulkError::Json(_) => Some("invalidSyntax"),
            BulkError::TooManyOperations { .. } | BulkError::PayloadTooLarge { .. } => None,
        };
        ScimError::new(self.status(), scim_type, self.to_string())
    }
}

/// Failures local to one operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// The operation references a `bulkId` no POST in the batch declares.
    #[error("bulkId '{bulk_id}' does not match any POST operation in this request")]
    DanglingReference { bulk_id: String },

    /// The operation takes part in a reference cycle.
    #[error("circular bulkId reference among: {}", .cycle.join(", "))]
    CircularReference { cycle: Vec<String> },

    /// A dependency failed, so this operation was never attempted.
    #[error("operation depends on bulkId '{bulk_id}', which could not be resolved")]
    DependencyFailed { bulk_id: String },

    /// Not attempted because the `failOnErrors` threshold was reached.
    #[error("operation was not attempted: failOnErrors threshold of {threshold} reached")]
    Aborted { threshold: u32 },

    /// Reported by the resource store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OperationError {
    /// Status code for the operation's response entry.
    pub fn status(&self) -> u16 {
        match self {
            OperationError::DanglingReference { .. } | OperationError::CircularReference { .. } => {
                409
            }
            OperationError::DependencyFailed { .. } => 424,
            OperationError::Aborted { .. } => 412,
            OperationError::Store(e) => e.status,
        }
    }

    /// Error body for the operation's response entry.
    pub fn to_scim_error(&self) -> ScimError {
        match self {
            OperationError::Store(e) => {
                ScimError::new(e.status, e.scim_type.as_deref(), e.detail.clone())
            }
            OperationError::DanglingReference { .. } | OperationError::CircularReference { .. } => {
                ScimError::new(self.status(), Some("invalidValue"), self.to_string())
            }
            _ => ScimError::new(self.status(), None, self.to_string()),
        }
    }
}
