//! Resource store boundary.
//!
//! The resolver never persists anything itself. Once an operation's
//! references are satisfied it hands the substituted request to a
//! [`ResourceStore`], which creates, replaces, patches or deletes the
//! resource and reports the permanent identifier and location.

use async_trait::async_trait;
use scimbulk_core::{AttributePath, Method, StoreConfig};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

/// What the store reports for a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    /// Permanent identifier of the affected resource.
    pub id: String,
    /// Absolute location of the affected resource.
    pub location: String,
    /// Entity tag after the operation, when the store versions resources.
    pub version: Option<String>,
}

/// Error reported by the store. Passed through verbatim in the bulk response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("resource store returned {status}: {detail}")]
pub struct StoreError {
    pub status: u16,
    pub scim_type: Option<String>,
    pub detail: String,
}

impl StoreError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            scim_type: None,
            detail: detail.into(),
        }
    }

    pub fn with_scim_type(mut self, scim_type: impl Into<String>) -> Self {
        self.scim_type = Some(scim_type.into());
        self
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Execute one operation. Called at most once per bulk operation.
    ///
    /// `path` and `payload` already have every `bulkId:` reference replaced.
    /// `version` is the entity tag the target must currently carry, if any.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        version: Option<&str>,
    ) -> Result<StoreOutcome, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredResource {
    body: Value,
    version: u64,
}

impl StoredResource {
    fn etag(&self) -> String {
        format!("W/\"{}\"", self.version)
    }
}

/// Process-local store keyed by resource type and id.
///
/// Backs the CLI and tests. Ids are random UUIDs and every write bumps a
/// weak entity tag.
pub struct InMemoryResourceStore {
    base_url: String,
    resources: RwLock<HashMap<(String, String), StoredResource>>,
}

impl InMemoryResourceStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Current body of a stored resource.
    pub fn get(&self, resource_type: &str, id: &str) -> Option<Value> {
        let resources = self.resources.read().ok()?;
        resources
            .get(&(resource_type.to_string(), id.to_string()))
            .map(|r| r.body.clone())
    }

    /// Store a resource under a known id, replacing any previous one.
    pub fn insert(&self, resource_type: &str, id: &str, body: Value) {
        if let Ok(mut resources) = self.resources.write() {
            resources.insert(
                (resource_type.to_string(), id.to_string()),
                StoredResource {
                    body: with_id(Some(&body), id),
                    version: 1,
                },
            );
        }
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn location(&self, resource_type: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource_type, id)
    }
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        version: Option<&str>,
    ) -> Result<StoreOutcome, StoreError> {
        let mut segments = path.trim_start_matches('/').splitn(2, '/');
        let resource_type = segments.next().unwrap_or_default().to_string();
        let target = segments.next().map(str::to_string);

        let mut resources = self
            .resources
            .write()
            .map_err(|_| StoreError::new(500, "resource store lock poisoned"))?;

        let id = match (method, target) {
            (Method::Create, _) => {
                let id = Uuid::new_v4().to_string();
                let stored = StoredResource {
                    body: with_id(payload, &id),
                    version: 1,
                };
                let outcome = StoreOutcome {
                    location: self.location(&resource_type, &id),
                    version: Some(stored.etag()),
                    id: id.clone(),
                };
                resources.insert((resource_type, id), stored);
                return Ok(outcome);
            }
            (_, Some(id)) => id,
            (_, None) => return Err(StoreError::new(400, "operation requires a resource id")),
        };

        let key = (resource_type, id);
        let existing = resources
            .get(&key)
            .ok_or_else(|| StoreError::new(404, format!("Resource {} not found", key.1)))?;
        if let Some(expected) = version {
            if expected != existing.etag() {
                return Err(StoreError::new(
                    412,
                    format!("version mismatch for {}: expected {}", key.1, expected),
                ));
            }
        }

        let location = self.location(&key.0, &key.1);
        if method == Method::Delete {
            resources.remove(&key);
            return Ok(StoreOutcome {
                id: key.1,
                location,
                version: None,
            });
        }

        let existing = resources
            .get_mut(&key)
            .ok_or_else(|| StoreError::new(404, format!("Resource {} not found", key.1)))?;
        match (method, payload) {
            (Method::Modify, Some(patch)) => {
                let mut patched = existing.body.clone();
                apply_patch(&mut patched, patch)?;
                existing.body = patched;
            }
            (Method::Modify, None) => {}
            _ => existing.body = with_id(payload, &key.1),
        }
        existing.version += 1;

        Ok(StoreOutcome {
            version: Some(existing.etag()),
            id: key.1,
            location,
        })
    }
}

fn with_id(payload: Option<&Value>, id: &str) -> Value {
    let mut body = payload.cloned().unwrap_or_else(|| Value::Object(Map::new()));
    if let Value::Object(map) = &mut body {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    body
}

/// Apply a PatchOp body to a stored resource.
///
/// Paths may be schema-qualified (`urn:...:User:manager`), name a
/// sub-attribute (`name.givenName`) or carry a single `eq` value filter
/// (`members[value eq "x"]`, `emails[type eq "work"].value`). Any other
/// path is rejected with `invalidPath` or `invalidFilter`.
fn apply_patch(body: &mut Value, patch: &Value) -> Result<(), StoreError> {
    let Value::Object(target) = body else {
        return Err(StoreError::new(500, "stored resource is not an object"));
    };
    let operations = patch
        .get("Operations")
        .or_else(|| patch.get("operations"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            StoreError::new(400, "PATCH body has no Operations").with_scim_type("invalidSyntax")
        })?;

    for op in operations {
        let kind = op
            .get("op")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let value = op.get("value");

        match op.get("path").and_then(Value::as_str) {
            Some(path) => apply_at_path(target, &kind, path, value)?,
            None => match (kind.as_str(), value) {
                ("add" | "replace", Some(Value::Object(values))) => {
                    for (key, value) in values {
                        let key = existing_key(target, key);
                        if kind == "add" {
                            add_value(target, key, value.clone());
                        } else {
                            target.insert(key, value.clone());
                        }
                    }
                }
                _ => return Err(unsupported(&kind)),
            },
        }
    }
    Ok(())
}

fn apply_at_path(
    target: &mut Map<String, Value>,
    kind: &str,
    raw: &str,
    value: Option<&Value>,
) -> Result<(), StoreError> {
    let mut path = PatchPath::parse(raw)?;
    // a whole schema extension is addressed by its URN alone
    if path.filter.is_none() && target.keys().any(|k| k.eq_ignore_ascii_case(raw)) {
        path.segments = vec![raw.to_string()];
    }

    let Some((last, parents)) = path.segments.split_last() else {
        return Err(invalid_path(raw));
    };
    let Some(container) = descend(target, parents, kind != "remove")? else {
        return Ok(());
    };
    let key = existing_key(container, last);
    let value = || {
        value.cloned().ok_or_else(|| {
            StoreError::new(400, format!("'{}' operation on '{}' has no value", kind, raw))
                .with_scim_type("invalidValue")
        })
    };

    match (kind, &path.filter) {
        ("remove", None) => {
            container.remove(&key);
        }
        ("remove", Some(filter)) => {
            let Some(Value::Array(items)) = container.get_mut(&key) else {
                return Ok(());
            };
            match &path.sub_attribute {
                None => items.retain(|item| !filter.matches(item)),
                Some(sub) => {
                    for item in items.iter_mut().filter(|item| filter.matches(item)) {
                        if let Value::Object(fields) = item {
                            let sub = existing_key(fields, sub);
                            fields.remove(&sub);
                        }
                    }
                }
            }
            if items.is_empty() {
                container.remove(&key);
            }
        }
        ("add", None) => add_value(container, key, value()?),
        ("replace", None) => {
            container.insert(key, value()?);
        }
        ("add" | "replace", Some(filter)) => {
            let value = value()?;
            let matched: Vec<&mut Value> = match container.get_mut(&key) {
                Some(Value::Array(items)) => items.iter_mut().filter(|item| filter.matches(item)).collect(),
                _ => Vec::new(),
            };
            if matched.is_empty() {
                return Err(StoreError::new(400, format!("no value of '{}' matches the filter", raw))
                    .with_scim_type("noTarget"));
            }
            for item in matched {
                let Value::Object(fields) = item else {
                    continue;
                };
                match (&path.sub_attribute, &value) {
                    (Some(sub), value) => {
                        let sub = existing_key(fields, sub);
                        fields.insert(sub, value.clone());
                    }
                    (None, Value::Object(values)) => {
                        for (sub, value) in values {
                            let sub = existing_key(fields, sub);
                            fields.insert(sub, value.clone());
                        }
                    }
                    (None, _) => {
                        return Err(StoreError::new(400, format!("value for '{}' must be an object", raw))
                            .with_scim_type("invalidValue"));
                    }
                }
            }
        }
        _ => return Err(unsupported(kind)),
    }
    Ok(())
}

/// A parsed PATCH `path`.
#[derive(Debug)]
struct PatchPath {
    /// Attribute segments. A schema URN stays the first segment.
    segments: Vec<String>,
    /// Filter on the values of the last segment.
    filter: Option<ValueFilter>,
    /// Sub-attribute of the filtered values.
    sub_attribute: Option<String>,
}

impl PatchPath {
    fn parse(path: &str) -> Result<Self, StoreError> {
        let (attribute, filter, rest) = match path.split_once('[') {
            None => (path, None, ""),
            Some((attribute, tail)) => {
                let (filter, rest) = tail.split_once(']').ok_or_else(|| invalid_path(path))?;
                (attribute, Some(ValueFilter::parse(filter)?), rest)
            }
        };

        let sub_attribute = match rest {
            "" => None,
            _ => match rest.strip_prefix('.') {
                Some(sub) if !sub.is_empty() && !sub.contains(['.', '[', ']']) => Some(sub.to_string()),
                _ => return Err(invalid_path(path)),
            },
        };

        let segments = AttributePath::parse(attribute).segments().to_vec();
        if attribute.contains(']') || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid_path(path));
        }
        Ok(Self {
            segments,
            filter,
            sub_attribute,
        })
    }
}

/// `attribute eq <json value>`, the only filter the store evaluates.
#[derive(Debug)]
struct ValueFilter {
    attribute: String,
    value: Value,
}

impl ValueFilter {
    fn parse(filter: &str) -> Result<Self, StoreError> {
        let invalid = || {
            StoreError::new(400, format!("unsupported filter '{}'", filter)).with_scim_type("invalidFilter")
        };
        let mut parts = filter.trim().splitn(3, char::is_whitespace);
        let (Some(attribute), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if attribute.is_empty() || !op.eq_ignore_ascii_case("eq") {
            return Err(invalid());
        }
        let value = serde_json::from_str(value.trim()).map_err(|_| invalid())?;
        Ok(Self {
            attribute: attribute.to_string(),
            value,
        })
    }

    fn matches(&self, item: &Value) -> bool {
        item.as_object()
            .and_then(|fields| fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(&self.attribute)))
            .is_some_and(|(_, v)| v == &self.value)
    }
}

/// Walk down complex attributes, creating them when `create` is set.
/// Returns `None` when a segment is missing and nothing may be created.
fn descend<'m>(
    mut map: &'m mut Map<String, Value>,
    segments: &[String],
    create: bool,
) -> Result<Option<&'m mut Map<String, Value>>, StoreError> {
    for segment in segments {
        let key = existing_key(map, segment);
        if !map.contains_key(&key) {
            if !create {
                return Ok(None);
            }
            map.insert(key.clone(), Value::Object(Map::new()));
        }
        map = match map.get_mut(&key) {
            Some(Value::Object(child)) => child,
            _ => {
                return Err(StoreError::new(400, format!("'{}' is not a complex attribute", segment))
                    .with_scim_type("invalidPath"));
            }
        };
    }
    Ok(Some(map))
}

/// Add semantics: arrays are appended to, complex values merged, anything
/// else set.
fn add_value(map: &mut Map<String, Value>, key: String, value: Value) {
    let leftover = match (map.get_mut(&key), value) {
        (Some(Value::Array(existing)), Value::Array(items)) => {
            existing.extend(items);
            None
        }
        (Some(Value::Object(existing)), Value::Object(values)) => {
            existing.extend(values);
            None
        }
        (_, value) => Some(value),
    };
    if let Some(value) = leftover {
        map.insert(key, value);
    }
}

/// The key as already spelled in `map`, attribute names being case-insensitive.
fn existing_key(map: &Map<String, Value>, name: &str) -> String {
    map.keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

fn invalid_path(path: &str) -> StoreError {
    StoreError::new(400, format!("unsupported patch path '{}'", path)).with_scim_type("invalidPath")
}

fn unsupported(kind: &str) -> StoreError {
    StoreError::new(400, format!("unsupported patch operation '{}'", kind)).with_scim_type("invalidValue")
}
