//! Mapping from temporary id to final identifier and location.

use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one temporary id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Resolution {
    /// The creating operation succeeded.
    Resolved { id: String, location: String },
    /// The resource was never created: it failed, was skipped, or was aborted.
    Unresolved,
}

/// Read-only view of every temporary id declared by a batch.
///
/// Each entry is written exactly once while the batch is scheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolverMap {
    entries: BTreeMap<String, Resolution>,
}

impl ResolverMap {
    /// Look up a temporary id. `None` means the batch never declared it.
    pub fn get(&self, bulk_id: &str) -> Option<&Resolution> {
        self.entries.get(bulk_id)
    }

    /// Final identifier of a temporary id, if it resolved.
    pub fn resolved_id(&self, bulk_id: &str) -> Option<&str> {
        match self.entries.get(bulk_id) {
            Some(Resolution::Resolved { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// Final location of a temporary id, if it resolved.
    pub fn location(&self, bulk_id: &str) -> Option<&str> {
        match self.entries.get(bulk_id) {
            Some(Resolution::Resolved { location, .. }) => Some(location),
            _ => None,
        }
    }

    pub fn is_resolved(&self, bulk_id: &str) -> bool {
        self.resolved_id(bulk_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolution)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn contains(&self, bulk_id: &str) -> bool {
        self.entries.contains_key(bulk_id)
    }

    pub(crate) fn record(&mut self, bulk_id: String, resolution: Resolution) {
        let previous = self.entries.insert(bulk_id, resolution);
        debug_assert!(previous.is_none(), "temporary id recorded twice");
    }
}
