//! Reference-typed attribute declarations.
//!
//! The schema layer declares which attributes of a resource type hold
//! references to other resources. Only values found at these paths are
//! treated as `bulkId:` references; a string that merely looks like one
//! anywhere else in a payload is left alone.
//!
//! ```yaml
//! references:
//!   Groups: [members.value]
//!   Users:
//!     - urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value
//!   "*": []
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ConfigError;

/// Key whose paths apply to every resource type.
pub const ANY_RESOURCE_TYPE: &str = "*";

/// Declared reference attributes, keyed by resource type (`Users`, `Groups`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSchema {
    attributes: BTreeMap<String, Vec<String>>,
}

impl Default for ReferenceSchema {
    fn default() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("Groups".to_string(), vec!["members.value".to_string()]);
        attributes.insert(
            "Users".to_string(),
            vec![
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value"
                    .to_string(),
            ],
        );
        Self { attributes }
    }
}

impl ReferenceSchema {
    /// A schema with no declared references.
    pub fn empty() -> Self {
        Self {
            attributes: BTreeMap::new(),
        }
    }

    /// Declare `path` as a reference attribute of `resource_type`.
    pub fn with_reference(mut self, resource_type: impl Into<String>, path: impl Into<String>) -> Self {
        self.attributes
            .entry(resource_type.into())
            .or_default()
            .push(path.into());
        self
    }

    /// Reference attribute paths declared for `resource_type`, including the
    /// paths declared for every type. Resource type names compare
    /// case-insensitively.
    pub fn paths_for(&self, resource_type: &str) -> Vec<AttributePath> {
        self.attributes
            .iter()
            .filter(|(key, _)| key.as_str() == ANY_RESOURCE_TYPE || key.eq_ignore_ascii_case(resource_type))
            .flat_map(|(_, paths)| paths.iter())
            .map(|p| AttributePath::parse(p))
            .collect()
    }

    /// Check every declared path is well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (resource_type, paths) in &self.attributes {
            for path in paths {
                if AttributePath::parse(path).segments().iter().any(|s| s.is_empty()) {
                    return Err(ConfigError::Config(format!(
                        "invalid reference attribute '{}' for resource type '{}'",
                        path, resource_type
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A parsed attribute path such as `members.value`.
///
/// A fully qualified path keeps its schema URN as the first segment, so
/// `urn:...:2.0:User:manager.value` becomes `[urn:...:2.0:User, manager, value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    pub fn parse(path: &str) -> Self {
        let (urn, attribute) = match path.rsplit_once(':') {
            Some((urn, attribute)) => (Some(urn), attribute),
            None => (None, path),
        };

        let mut segments: Vec<String> = urn.map(str::to_string).into_iter().collect();
        segments.extend(attribute.split('.').map(str::to_string));
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// If `prefix` leads this path, return the remaining segments.
    /// Segments compare case-insensitively.
    pub fn strip_prefix(&self, prefix: &AttributePath) -> Option<&[String]> {
        if prefix.segments.len() > self.segments.len() {
            return None;
        }
        let matches = prefix
            .segments
            .iter()
            .zip(&self.segments)
            .all(|(a, b)| a.eq_ignore_ascii_case(b));
        matches.then(|| &self.segments[prefix.segments.len()..])
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segments.split_first() {
            Some((first, rest)) if first.contains(':') => {
                write!(f, "{}:{}", first, rest.join("."))
            }
            _ => f.write_str(&self.segments.join(".")),
        }
    }
}
