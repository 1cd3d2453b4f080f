//! Reference scanning and substitution.
//!
//! A value counts as a reference only when it sits at an attribute path the
//! schema layer declared as reference-typed for the operation's resource
//! type, and carries the `bulkId:` prefix. The resource segment of the
//! operation path (`/Groups/bulkId:grp1`) is also a reference.
//!
//! Scanning and substitution share one traversal: the scanner first finds
//! JSON pointers to every declared reference position in the payload, then
//! either reads or rewrites the strings found there.

use scimbulk_core::{bulk_reference, AttributePath, Method, ReferenceSchema};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::BulkError;
use crate::record::{OperationRecord, ResourcePath};
use crate::resolver_map::ResolverMap;

/// Path and payload with every resolvable reference replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Substituted {
    pub path: ResourcePath,
    pub payload: Option<Value>,
}

/// Finds and rewrites `bulkId:` references in operation records.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceScanner<'a> {
    schema: &'a ReferenceSchema,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(schema: &'a ReferenceSchema) -> Self {
        Self { schema }
    }

    /// Temporary ids referenced by `record`, including its own if it refers
    /// to itself. An empty `bulkId:` token rejects the batch.
    pub fn scan(&self, record: &OperationRecord) -> Result<BTreeSet<String>, BulkError> {
        let mut references = BTreeSet::new();

        if let Some(token) = record.path.bulk_reference() {
            insert_token(record.index, token, &mut references)?;
        }

        if let Some(payload) = &record.payload {
            for pointer in self.reference_pointers(record) {
                let token = payload
                    .pointer(&pointer)
                    .and_then(Value::as_str)
                    .and_then(bulk_reference);
                if let Some(token) = token {
                    insert_token(record.index, token, &mut references)?;
                }
            }
        }

        Ok(references)
    }

    /// Replace every reference whose temporary id is resolved in `resolved`.
    /// Unresolved references are left untouched.
    pub fn substitute(&self, record: &OperationRecord, resolved: &ResolverMap) -> Substituted {
        let path = match record
            .path
            .bulk_reference()
            .and_then(|token| resolved.resolved_id(token))
        {
            Some(id) => record.path.with_id(id),
            None => record.path.clone(),
        };

        let payload = record.payload.as_ref().map(|original| {
            let mut payload = original.clone();
            for pointer in self.reference_pointers(record) {
                let Some(slot) = payload.pointer_mut(&pointer) else {
                    continue;
                };
                let replacement = slot
                    .as_str()
                    .and_then(bulk_reference)
                    .and_then(|token| resolved.resolved_id(token))
                    .map(str::to_string);
                if let Some(id) = replacement {
                    *slot = Value::String(id);
                }
            }
            payload
        });

        Substituted { path, payload }
    }

    /// JSON pointers to every string at a declared reference position.
    fn reference_pointers(&self, record: &OperationRecord) -> Vec<String> {
        let Some(payload) = &record.payload else {
            return Vec::new();
        };
        let declared = self.schema.paths_for(record.path.resource_type());
        if declared.is_empty() {
            return Vec::new();
        }

        let mut pointers = Vec::new();
        match record.method {
            Method::Modify => patch_pointers(payload, &declared, &mut pointers),
            _ => {
                for path in &declared {
                    collect_pointers(payload, path.segments(), String::new(), &mut pointers);
                }
            }
        }
        pointers.sort();
        pointers.dedup();
        pointers
    }
}

fn insert_token(index: usize, token: &str, references: &mut BTreeSet<String>) -> Result<(), BulkError> {
    if token.is_empty() {
        return Err(BulkError::shape(index, "bulkId reference has an empty token"));
    }
    references.insert(token.to_string());
    Ok(())
}

/// Walk a PatchOp body. Each operation's `value` is scanned relative to
/// its `path`; an operation without a path is scanned like a resource body.
fn patch_pointers(payload: &Value, declared: &[AttributePath], out: &mut Vec<String>) {
    let Some((ops_key, Value::Array(operations))) = find_key(payload, "Operations") else {
        return;
    };

    for (i, op) in operations.iter().enumerate() {
        let Some((value_key, value)) = find_key(op, "value") else {
            continue;
        };
        let base = format!("/{}/{}/{}", escape(ops_key), i, escape(value_key));

        match find_key(op, "path").and_then(|(_, p)| p.as_str()) {
            Some(path) => {
                let target = patch_target(path);
                for attribute in declared {
                    if let Some(rest) = attribute.strip_prefix(&target) {
                        collect_pointers(value, rest, base.clone(), out);
                    }
                }
            }
            None => {
                for attribute in declared {
                    collect_pointers(value, attribute.segments(), base.clone(), out);
                }
            }
        }
    }
}

/// Attribute targeted by a PATCH path, with value filters removed:
/// `members[value eq "x"].display` targets `members.display`.
fn patch_target(path: &str) -> AttributePath {
    let mut plain = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => plain.push(c),
            _ => {}
        }
    }
    AttributePath::parse(&plain)
}

fn collect_pointers(value: &Value, segments: &[String], pointer: String, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_pointers(item, segments, format!("{}/{}", pointer, i), out);
            }
        }
        Value::Object(map) => {
            if let Some((head, rest)) = segments.split_first() {
                for (key, child) in map.iter().filter(|(k, _)| k.eq_ignore_ascii_case(head)) {
                    collect_pointers(child, rest, format!("{}/{}", pointer, escape(key)), out);
                }
            }
        }
        Value::String(_) if segments.is_empty() => out.push(pointer),
        _ => {}
    }
}

/// Case-insensitive member lookup, returning the key as spelled in the payload.
fn find_key<'v>(value: &'v Value, name: &str) -> Option<(&'v str, &'v Value)> {
    value
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(k, v)| (k.as_str(), v))
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
