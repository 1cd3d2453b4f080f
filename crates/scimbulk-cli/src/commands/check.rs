//! `scimbulk check` command implementation.
//!
//! Plans a bulk request without executing it:
//! - Decoding and shape validation
//! - Duplicate and dangling bulkId detection
//! - Reference cycle detection
//! - Planned execution order

use anyhow::Result;
use scimbulk_core::{BulkRequest, ResolverConfig};
use scimbulk_runtime::{BulkError, BulkResolver, InMemoryResourceStore, OperationRecord, ResolutionContext};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use super::read_request;

// ============================================================================
// Check Result Types
// ============================================================================

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The operation will fail, the rest of the batch still runs.
    Warning,
    /// The whole request would be rejected.
    Error,
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: String,
    pub message: String,
    /// Operation index the finding is about, if any.
    pub operation: Option<usize>,
}

impl CheckFinding {
    fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category: category.into(),
            message: message.into(),
            operation: None,
        }
    }

    fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category: category.into(),
            message: message.into(),
            operation: None,
        }
    }

    fn at(mut self, operation: usize) -> Self {
        self.operation = Some(operation);
        self
    }
}

/// Results from checking one request.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
    /// Request indices in the order they would reach the store.
    pub planned_order: Vec<usize>,
}

impl CheckResults {
    /// Returns true if the request would be rejected as a whole.
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn print_summary(&self, request: Option<&BulkRequest>) {
        let mut findings: Vec<_> = self.findings.iter().collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.operation.cmp(&b.operation)));

        if !findings.is_empty() {
            println!("\nFindings ({}):", findings.len());
            println!("{}", "─".repeat(60));
            for finding in &findings {
                print_finding(finding);
            }
        }

        if let Some(request) = request {
            if !self.has_errors() {
                println!("\nPlanned execution order:");
                println!("{}", "─".repeat(60));
                for (step, &index) in self.planned_order.iter().enumerate() {
                    let op = &request.operations[index];
                    let bulk_id = op
                        .bulk_id
                        .as_deref()
                        .map(|b| format!(" (bulkId {})", b))
                        .unwrap_or_default();
                    println!("  {:>3}. #{} {} {}{}", step + 1, index, op.method, op.path, bulk_id);
                }
            }
        }

        println!();
        println!("{}", "═".repeat(60));
        if self.has_errors() {
            println!("❌ Request would be rejected: {} error(s)", self.count(Severity::Error));
        } else if self.count(Severity::Warning) > 0 {
            println!(
                "⚠️  {} operation(s) will fail, {} will run",
                self.count(Severity::Warning),
                self.planned_order.len()
            );
        } else {
            println!("✅ All {} operation(s) can run", self.planned_order.len());
        }
    }
}

fn print_finding(finding: &CheckFinding) {
    let icon = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
    };
    let location = finding
        .operation
        .map(|i| format!(" [Operations[{}]]", i))
        .unwrap_or_default();

    println!("  {} [{}]{}: {}", icon, finding.category, location, finding.message);
}

// ============================================================================
// Main Check Runner
// ============================================================================

/// Check a request body quietly and return the findings.
pub fn check_body(config: ResolverConfig, body: &[u8]) -> (CheckResults, Option<BulkRequest>) {
    let mut results = CheckResults::default();

    let max = config.bulk.max_payload_size;
    if body.len() > max {
        results.findings.push(batch_finding(&BulkError::PayloadTooLarge {
            max,
            actual: body.len(),
        }));
        return (results, None);
    }

    let request = match BulkRequest::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            results.findings.push(batch_finding(&BulkError::from(e)));
            return (results, None);
        }
    };

    let store = Arc::new(InMemoryResourceStore::new(&config.store));
    let resolver = BulkResolver::new(config, store);
    match resolver.plan(&request) {
        Ok(ctx) => {
            results.planned_order = ctx.planned_order();
            results.findings.extend(operation_findings(&ctx));
        }
        Err(e) => results.findings.push(batch_finding(&e)),
    }
    (results, Some(request))
}

/// Run the check and print a report. Fails when the request would be rejected.
pub fn run(config: ResolverConfig, file: &Path) -> Result<()> {
    println!("🔍 Checking bulk request {}...", file.display());

    let body = read_request(file)?;
    let (results, request) = check_body(config, &body);
    results.print_summary(request.as_ref());

    if results.has_errors() {
        anyhow::bail!(
            "Bulk request check failed with {} error(s)",
            results.count(Severity::Error)
        );
    }
    Ok(())
}

fn batch_finding(error: &BulkError) -> CheckFinding {
    let category = match error {
        BulkError::InvalidBatchShape { .. } => "shape",
        BulkError::DuplicateTemporaryId { .. } => "bulkId",
        BulkError::TooManyOperations { .. } | BulkError::PayloadTooLarge { .. } => "limits",
        BulkError::Json(_) => "json",
    };
    let finding = CheckFinding::error(category, error.to_string());
    match error {
        BulkError::InvalidBatchShape { index: Some(i), .. } => finding.at(*i),
        BulkError::DuplicateTemporaryId { second, .. } => finding.at(*second),
        _ => finding,
    }
}

/// Operations that will fail: already failed by validation, or downstream of
/// one that did.
fn operation_findings(ctx: &ResolutionContext) -> Vec<CheckFinding> {
    let planned: BTreeSet<usize> = ctx.planned_order().into_iter().collect();

    ctx.records()
        .iter()
        .filter(|record| !planned.contains(&record.index))
        .map(|record| match record.error() {
            Some(e) => CheckFinding::warning("reference", e.to_string()).at(record.index),
            None => CheckFinding::warning("dependency", blocked_message(ctx, record)).at(record.index),
        })
        .collect()
}

fn blocked_message(ctx: &ResolutionContext, record: &OperationRecord) -> String {
    let blocked_by: Vec<_> = record
        .depends_on()
        .iter()
        .filter(|bulk_id| {
            ctx.graph()
                .node_for(bulk_id)
                .is_some_and(|node| ctx.records()[node].is_failed())
        })
        .map(String::as_str)
        .collect();
    if blocked_by.is_empty() {
        "depends on an operation that cannot run".to_string()
    } else {
        format!("depends on bulkId {} which cannot be resolved", blocked_by.join(", "))
    }
}
