//! Bulk endpoint limits and scheduling behaviour.

use serde::{Deserialize, Serialize};

/// Configuration for bulk request handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Maximum number of operations accepted in one request.
    #[serde(default = "default_max_operations")]
    pub max_operations: usize,

    /// Maximum size of a raw request body, in bytes.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,

    /// Error threshold applied when a request does not carry `failOnErrors`.
    /// `None` means every operation is attempted.
    #[serde(default)]
    pub fail_on_errors: Option<u32>,

    /// How many independent operations may be in flight against the store at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Reject POST operations that carry no `bulkId`.
    #[serde(default)]
    pub require_bulk_id_on_create: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_payload_size: default_max_payload_size(),
            fail_on_errors: None,
            max_concurrency: default_max_concurrency(),
            require_bulk_id_on_create: false,
        }
    }
}

fn default_max_operations() -> usize {
    1000
}

fn default_max_payload_size() -> usize {
    1_048_576
}

fn default_max_concurrency() -> usize {
    1
}
