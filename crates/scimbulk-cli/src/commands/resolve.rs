//! `scimbulk resolve` command implementation.
//!
//! Runs a bulk request end to end against a fresh in-memory store and prints
//! the bulk response as JSON on stdout. A rejected request prints the SCIM
//! error body instead and exits non-zero.

use anyhow::Result;
use scimbulk_core::ResolverConfig;
use scimbulk_runtime::{BulkResolver, InMemoryResourceStore};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use super::read_request;

pub async fn run(
    config: ResolverConfig,
    file: &Path,
    concurrency: Option<usize>,
    show_map: bool,
) -> Result<()> {
    let body = read_request(file)?;

    let store = Arc::new(InMemoryResourceStore::new(&config.store));
    let mut resolver = BulkResolver::new(config, store);
    if let Some(n) = concurrency {
        resolver = resolver.with_max_concurrency(n);
    }

    match resolver.resolve_slice(&body).await {
        Ok(report) => {
            let output = if show_map {
                json!({
                    "response": report.response(),
                    "resolverMap": report.resolver_map(),
                })
            } else {
                serde_json::to_value(report.response())?
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_scim_error())?);
            anyhow::bail!("Bulk request rejected with status {}: {}", e.status(), e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn resolves_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "schemas": ["urn:ietf:params:scim:api:messages:2.0:BulkRequest"],
                "Operations": [
                    {{ "method": "POST", "path": "/Users", "bulkId": "u1", "data": {{ "userName": "alice" }} }}
                ]
            }}"#
        )
        .unwrap();

        run(ResolverConfig::default(), file.path(), Some(2), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_request_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "Operations": [] }}"#).unwrap();

        let err = run(ResolverConfig::default(), file.path(), None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
    }
}
