//! Bulk resolver: the entry point tying the pipeline together.
//!
//! `plan` normalizes, scans, builds the graph and validates it without
//! touching the store. `resolve` plans, schedules against the store and
//! aggregates the response.

use scimbulk_core::{BulkRequest, ResolverConfig, BULK_REQUEST_SCHEMA};
use std::sync::Arc;

use crate::aggregator::{aggregate, ResolutionReport};
use crate::context::ResolutionContext;
use crate::error::BulkError;
use crate::graph::DependencyGraph;
use crate::record::OperationRecord;
use crate::scanner::ReferenceScanner;
use crate::scheduler::Scheduler;
use crate::store::ResourceStore;
use crate::validator;

/// Resolves bulk requests against a resource store.
///
/// Holds only immutable configuration and the store handle, so one resolver
/// can serve concurrent requests.
pub struct BulkResolver {
    config: ResolverConfig,
    store: Arc<dyn ResourceStore>,
}

impl BulkResolver {
    pub fn new(config: ResolverConfig, store: Arc<dyn ResourceStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Override the number of operations dispatched to the store at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.bulk.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Check a request and build its resolution context without executing
    /// anything. Batch-level problems are returned as errors; per-operation
    /// problems (dangling and circular references) are recorded on the
    /// context's records.
    pub fn plan(&self, request: &BulkRequest) -> Result<ResolutionContext, BulkError> {
        if !request.schemas.iter().any(|s| s == BULK_REQUEST_SCHEMA) {
            return Err(BulkError::InvalidBatchShape {
                index: None,
                reason: format!("schemas must contain '{}'", BULK_REQUEST_SCHEMA),
            });
        }

        let max = self.config.bulk.max_operations;
        if request.operations.len() > max {
            return Err(BulkError::TooManyOperations {
                max,
                actual: request.operations.len(),
            });
        }

        if request.fail_on_errors == Some(0) {
            return Err(BulkError::InvalidBatchShape {
                index: None,
                reason: "failOnErrors must be at least 1".to_string(),
            });
        }

        let mut records = request
            .operations
            .iter()
            .enumerate()
            .map(|(i, op)| OperationRecord::from_request(i, op, &self.config.bulk))
            .collect::<Result<Vec<_>, _>>()?;

        let scanner = ReferenceScanner::new(&self.config.references);
        for record in records.iter_mut() {
            record.depends_on = scanner.scan(record)?;
        }

        let graph = DependencyGraph::build(&mut records)?;
        let cycles = validator::validate(&graph, &mut records);

        let fail_on_errors = request.fail_on_errors.or(self.config.bulk.fail_on_errors);

        tracing::debug!(
            operations = records.len(),
            cycles = cycles.len(),
            fail_on_errors = ?fail_on_errors,
            "Bulk request planned"
        );

        Ok(ResolutionContext::new(records, graph, cycles, fail_on_errors))
    }

    /// Resolve a decoded bulk request.
    pub async fn resolve(&self, request: &BulkRequest) -> Result<ResolutionReport, BulkError> {
        let mut ctx = self.plan(request)?;

        let scanner = ReferenceScanner::new(&self.config.references);
        let scheduler = Scheduler::new(self.store.as_ref(), scanner, self.config.bulk.max_concurrency);
        scheduler.run(&mut ctx).await;

        let report = aggregate(ctx);
        tracing::info!(
            operations = report.records().len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Bulk request resolved"
        );
        Ok(report)
    }

    /// Decode and resolve a raw request body.
    pub async fn resolve_slice(&self, body: &[u8]) -> Result<ResolutionReport, BulkError> {
        let max = self.config.bulk.max_payload_size;
        if body.len() > max {
            return Err(BulkError::PayloadTooLarge {
                max,
                actual: body.len(),
            });
        }
        let request = BulkRequest::from_slice(body)?;
        self.resolve(&request).await
    }
}
