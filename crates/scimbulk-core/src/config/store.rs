//! In-memory resource store configuration.

use serde::{Deserialize, Serialize};

/// Settings for the bundled in-memory resource store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL used to build resource locations.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://localhost/scim/v2".to_string()
}
