//! Operation records.
//!
//! An [`OperationRecord`] is the normalized form of one bulk request entry.
//! Normalization is where the batch shape is checked: a descriptor that
//! cannot become a record rejects the whole request.

use scimbulk_core::{BulkConfig, BulkOperationRequest, Method};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{BulkError, OperationError};

/// Lifecycle of a record. Only `Pending -> Resolved` and `Pending -> Failed` occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Resolved,
    Failed,
}

/// Identifier and location of a resource the store acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub id: String,
    pub location: String,
    pub version: Option<String>,
}

/// Final result of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(ResolvedResource),
    Failed(OperationError),
}

/// Target of an operation: a collection (`/Users`) or one resource (`/Users/{id}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    resource_type: String,
    id: Option<String>,
}

impl ResourcePath {
    /// Parse an absolute path with one or two non-empty segments.
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix('/')?;
        let mut segments = rest.split('/');
        let resource_type = segments.next().filter(|s| !s.is_empty())?;
        let id = match segments.next() {
            Some("") => return None,
            Some(id) => Some(id.to_string()),
            None => None,
        };
        if segments.next().is_some() {
            return None;
        }
        Some(Self {
            resource_type: resource_type.to_string(),
            id,
        })
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Temporary id referenced by the resource segment (`/Groups/bulkId:grp1`).
    pub fn bulk_reference(&self) -> Option<&str> {
        self.id.as_deref().and_then(scimbulk_core::bulk_reference)
    }

    /// Same collection, different resource id.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            id: Some(id.into()),
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "/{}/{}", self.resource_type, id),
            None => write!(f, "/{}", self.resource_type),
        }
    }
}

/// Normalized view of one requested operation.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// Position in the original request.
    pub index: usize,
    pub method: Method,
    pub path: ResourcePath,
    pub bulk_id: Option<String>,
    pub version: Option<String>,
    pub payload: Option<Value>,
    /// Temporary ids this operation references; filled in by the scanner
    /// and fixed once the graph is built.
    pub(crate) depends_on: BTreeSet<String>,
    state: OperationState,
    outcome: Option<Outcome>,
}

impl OperationRecord {
    /// Normalize one descriptor, checking its shape.
    pub fn from_request(
        index: usize,
        op: &BulkOperationRequest,
        config: &BulkConfig,
    ) -> Result<Self, BulkError> {
        if op.method.is_empty() {
            return Err(BulkError::shape(index, "operation has no method"));
        }
        let method: Method = op
            .method
            .parse()
            .map_err(|e: String| BulkError::shape(index, e))?;

        let path = ResourcePath::parse(&op.path)
            .ok_or_else(|| BulkError::shape(index, format!("invalid path '{}'", op.path)))?;

        match (method, path.id()) {
            (Method::Create, Some(_)) => {
                return Err(BulkError::shape(
                    index,
                    format!("POST path '{}' must name a resource collection", path),
                ));
            }
            (Method::Update | Method::Modify | Method::Delete, None) => {
                return Err(BulkError::shape(
                    index,
                    format!("{} path '{}' must name a single resource", method, path),
                ));
            }
            _ => {}
        }

        match &op.data {
            None if method.requires_data() => {
                return Err(BulkError::shape(
                    index,
                    format!("data is required for {}", method),
                ));
            }
            Some(data) if !data.is_object() => {
                return Err(BulkError::shape(index, "data must be a JSON object"));
            }
            _ => {}
        }

        if let Some(bulk_id) = &op.bulk_id {
            if bulk_id.trim().is_empty() {
                return Err(BulkError::shape(index, "bulkId must not be empty"));
            }
        } else if method == Method::Create && config.require_bulk_id_on_create {
            return Err(BulkError::shape(index, "bulkId is required for POST"));
        }

        Ok(Self {
            index,
            method,
            path,
            bulk_id: op.bulk_id.clone(),
            version: op.version.clone(),
            payload: op.data.clone(),
            depends_on: BTreeSet::new(),
            state: OperationState::Pending,
            outcome: None,
        })
    }

    /// The `bulkId` other operations may reference: set only on creates.
    pub fn temporary_id(&self) -> Option<&str> {
        match self.method {
            Method::Create => self.bulk_id.as_deref(),
            _ => None,
        }
    }

    /// Temporary ids this operation references.
    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.state == OperationState::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.state == OperationState::Failed
    }

    /// The error recorded against this operation, if it failed.
    pub fn error(&self) -> Option<&OperationError> {
        match &self.outcome {
            Some(Outcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// The resource the store reported, if this operation resolved.
    pub fn resolved(&self) -> Option<&ResolvedResource> {
        match &self.outcome {
            Some(Outcome::Resolved(r)) => Some(r),
            _ => None,
        }
    }

    pub(crate) fn resolve(&mut self, resource: ResolvedResource) {
        self.settle(Outcome::Resolved(resource));
    }

    pub(crate) fn fail(&mut self, error: OperationError) {
        self.settle(Outcome::Failed(error));
    }

    /// Settle the record once. Later outcomes are ignored: the first
    /// recorded failure or success stands.
    fn settle(&mut self, outcome: Outcome) {
        if !self.is_pending() {
            tracing::debug!(
                index = self.index,
                state = ?self.state,
                "Ignoring outcome for already settled operation"
            );
            return;
        }
        self.state = match outcome {
            Outcome::Resolved(_) => OperationState::Resolved,
            Outcome::Failed(_) => OperationState::Failed,
        };
        self.outcome = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(op: BulkOperationRequest) -> Result<OperationRecord, BulkError> {
        OperationRecord::from_request(0, &op, &BulkConfig::default())
    }

    fn shape_reason(result: Result<OperationRecord, BulkError>) -> String {
        match result {
            Err(BulkError::InvalidBatchShape { reason, .. }) => reason,
            other => panic!("expected shape error, got {:?}", other),
        }
    }

    #[test]
    fn parses_paths() {
        let collection = ResourcePath::parse("/Users").unwrap();
        assert_eq!(collection.resource_type(), "Users");
        assert!(collection.id().is_none());

        let resource = ResourcePath::parse("/Groups/bulkId:grp1").unwrap();
        assert_eq!(resource.id(), Some("bulkId:grp1"));
        assert_eq!(resource.bulk_reference(), Some("grp1"));
        assert_eq!(resource.with_id("e9e30dba").to_string(), "/Groups/e9e30dba");

        assert!(ResourcePath::parse("Users").is_none());
        assert!(ResourcePath::parse("/").is_none());
        assert!(ResourcePath::parse("/Users/").is_none());
        assert!(ResourcePath::parse("/Users/a/b").is_none());
    }

    #[test]
    fn normalizes_create() {
        let rec = record(BulkOperationRequest::create("/Users", "usr1", json!({"userName": "alice"}))).unwrap();
        assert_eq!(rec.method, Method::Create);
        assert_eq!(rec.temporary_id(), Some("usr1"));
        assert!(rec.is_pending());
        assert!(rec.outcome().is_none());
    }

    #[test]
    fn bulk_id_on_non_create_is_not_an_anchor() {
        let op = BulkOperationRequest::delete("/Users/123").with_bulk_id("d1");
        let rec = record(op).unwrap();
        assert_eq!(rec.bulk_id.as_deref(), Some("d1"));
        assert!(rec.temporary_id().is_none());
    }

    #[test]
    fn rejects_unknown_method() {
        let mut op = BulkOperationRequest::delete("/Users/123");
        op.method = "GET".to_string();
        assert!(shape_reason(record(op)).contains("GET"));
    }

    #[test]
    fn rejects_missing_method() {
        let mut op = BulkOperationRequest::delete("/Users/123");
        op.method.clear();
        assert_eq!(shape_reason(record(op)), "operation has no method");
    }

    #[test]
    fn rejects_mismatched_paths() {
        let op = BulkOperationRequest::create("/Users/123", "u", json!({}));
        assert!(shape_reason(record(op)).contains("collection"));

        let op = BulkOperationRequest::replace("/Users", json!({}));
        assert!(shape_reason(record(op)).contains("single resource"));
    }

    #[test]
    fn rejects_missing_or_non_object_data() {
        let op = BulkOperationRequest::new(Method::Modify, "/Groups/1");
        assert!(shape_reason(record(op)).contains("data is required"));

        let op = BulkOperationRequest::replace("/Groups/1", json!(["x"]));
        assert!(shape_reason(record(op)).contains("JSON object"));
    }

    #[test]
    fn rejects_empty_bulk_id() {
        let op = BulkOperationRequest::create("/Users", "  ", json!({}));
        assert!(shape_reason(record(op)).contains("bulkId"));
    }

    #[test]
    fn bulk_id_requirement_is_configurable() {
        let op = BulkOperationRequest::new(Method::Create, "/Users").with_data(json!({}));
        assert!(record(op.clone()).is_ok());

        let config = BulkConfig {
            require_bulk_id_on_create: true,
            ..Default::default()
        };
        assert!(OperationRecord::from_request(0, &op, &config).is_err());
    }

    #[test]
    fn state_never_reverses() {
        let mut rec = record(BulkOperationRequest::create("/Users", "usr1", json!({}))).unwrap();
        rec.fail(OperationError::DanglingReference {
            bulk_id: "x".to_string(),
        });
        rec.resolve(ResolvedResource {
            id: "1".to_string(),
            location: "/Users/1".to_string(),
            version: None,
        });

        assert_eq!(rec.state(), OperationState::Failed);
        assert!(rec.resolved().is_none());
        assert!(matches!(
            rec.error(),
            Some(OperationError::DanglingReference { .. })
        ));
    }
}
