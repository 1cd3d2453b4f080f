use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Configuration types shared across all scimbulk crates
pub mod config;

pub use config::{
    AttributePath, BulkConfig, ConfigError, LoggingConfig, ReferenceSchema, ResolverConfig,
    StoreConfig,
};

/// Schema URN carried by every bulk request.
pub const BULK_REQUEST_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:BulkRequest";
/// Schema URN carried by every bulk response.
pub const BULK_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:BulkResponse";
/// Schema URN of a SCIM error body.
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";
/// Schema URN of a PATCH request body.
pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";
/// Prefix marking a value as a reference to another operation's `bulkId`.
pub const BULK_ID_PREFIX: &str = "bulkId:";

/// Return the temporary id carried by a `bulkId:<token>` reference, if `value` is one.
///
/// The token may be empty; callers decide whether that is an error.
pub fn bulk_reference(value: &str) -> Option<&str> {
    value.strip_prefix(BULK_ID_PREFIX)
}

/// Operation method of a bulk request entry.
///
/// Serialized as the HTTP verb the protocol uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// POST: create a resource in a collection.
    #[serde(rename = "POST")]
    Create,
    /// PUT: replace a resource.
    #[serde(rename = "PUT")]
    Update,
    /// PATCH: partially modify a resource.
    #[serde(rename = "PATCH")]
    Modify,
    /// DELETE: remove a resource.
    #[serde(rename = "DELETE")]
    Delete,
}

impl Method {
    /// HTTP verb for this method.
    pub fn as_http(&self) -> &'static str {
        match self {
            Method::Create => "POST",
            Method::Update => "PUT",
            Method::Modify => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Status code reported when the operation succeeds.
    pub fn success_status(&self) -> u16 {
        match self {
            Method::Create => 201,
            Method::Update | Method::Modify => 200,
            Method::Delete => 204,
        }
    }

    /// Whether the operation must carry a `data` body.
    pub fn requires_data(&self) -> bool {
        !matches!(self, Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_http())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(Method::Create),
            "PUT" => Ok(Method::Update),
            "PATCH" => Ok(Method::Modify),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported bulk method '{}'", other)),
        }
    }
}

/// A bulk request as received on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    #[serde(default)]
    pub schemas: Vec<String>,
    /// Number of errors tolerated before remaining operations are abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on_errors: Option<u32>,
    #[serde(rename = "Operations", alias = "operations", default)]
    pub operations: Vec<BulkOperationRequest>,
}

impl BulkRequest {
    /// Build a request with the bulk request schema set.
    pub fn new(operations: Vec<BulkOperationRequest>) -> Self {
        Self {
            schemas: vec![BULK_REQUEST_SCHEMA.to_string()],
            fail_on_errors: None,
            operations,
        }
    }

    pub fn with_fail_on_errors(mut self, threshold: u32) -> Self {
        self.fail_on_errors = Some(threshold);
        self
    }

    /// Decode a request from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// One operation of a bulk request.
///
/// `method` is kept as text, and may be missing, so a bad verb can be
/// reported against the operation's position instead of failing the whole
/// decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_id: Option<String>,
    /// Entity tag the target must currently carry (`If-Match`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl BulkOperationRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method: method.as_http().to_string(),
            path: path.into(),
            bulk_id: None,
            version: None,
            data: None,
        }
    }

    /// POST into a collection, anchored by `bulk_id`.
    pub fn create(path: impl Into<String>, bulk_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(Method::Create, path)
            .with_bulk_id(bulk_id)
            .with_data(data)
    }

    pub fn replace(path: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(Method::Update, path).with_data(data)
    }

    pub fn modify(path: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(Method::Modify, path).with_data(data)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_bulk_id(mut self, bulk_id: impl Into<String>) -> Self {
        self.bulk_id = Some(bulk_id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A bulk response as sent on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<BulkOperationResponse>,
}

impl BulkResponse {
    pub fn new(operations: Vec<BulkOperationResponse>) -> Self {
        Self {
            schemas: vec![BULK_RESPONSE_SCHEMA.to_string()],
            operations,
        }
    }
}

/// Result of one operation, echoed in request order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResponse {
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// HTTP status code, as a string.
    pub status: String,
    /// Error body, present when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ScimError>,
}

impl BulkOperationResponse {
    pub fn is_success(&self) -> bool {
        self.status.starts_with('2')
    }
}

/// SCIM error message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScimError {
    pub schemas: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ScimError {
    pub fn new(status: u16, scim_type: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            schemas: vec![ERROR_SCHEMA.to_string()],
            status: status.to_string(),
            scim_type: scim_type.map(str::to_string),
            detail: Some(detail.into()),
        }
    }
}
