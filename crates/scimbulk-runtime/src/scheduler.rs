//! Resolution scheduler.
//!
//! Kahn's algorithm over the validated graph with a min-heap on request
//! index, so independent operations keep their submission order. Ready
//! operations are dispatched to the store in waves of up to
//! `max_concurrency`; an operation only becomes ready once every operation
//! it depends on has settled.

use futures::future::join_all;
use scimbulk_core::Method;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::context::ResolutionContext;
use crate::error::OperationError;
use crate::graph::NodeId;
use crate::record::ResolvedResource;
use crate::resolver_map::Resolution;
use crate::scanner::ReferenceScanner;
use crate::store::ResourceStore;

/// A substituted operation about to be sent to the store.
struct Dispatch {
    node: NodeId,
    method: Method,
    path: String,
    payload: Option<Value>,
    version: Option<String>,
}

pub struct Scheduler<'a> {
    store: &'a dyn ResourceStore,
    scanner: ReferenceScanner<'a>,
    max_concurrency: usize,
}

impl<'a> Scheduler<'a> {
    pub fn new(store: &'a dyn ResourceStore, scanner: ReferenceScanner<'a>, max_concurrency: usize) -> Self {
        Self {
            store,
            scanner,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Settle every record in `ctx` and fill its resolver map.
    ///
    /// Each record is sent to the store at most once. Failures propagate to
    /// dependents only. Once the failure count reaches the context's
    /// `failOnErrors` threshold no further store calls are made and every
    /// record still pending is aborted.
    pub async fn run(&self, ctx: &mut ResolutionContext) {
        let len = ctx.records.len();
        let threshold = ctx.fail_on_errors;

        let mut remaining: Vec<usize> = (0..len)
            .map(|node| {
                if ctx.records[node].is_pending() {
                    ctx.graph.dependencies(node).len()
                } else {
                    0
                }
            })
            .collect();
        let mut ready: BinaryHeap<Reverse<NodeId>> = (0..len)
            .filter(|&node| remaining[node] == 0)
            .map(Reverse)
            .collect();
        let mut errors = 0u32;
        let mut halted = false;

        while !halted && !ready.is_empty() {
            // Reaching the threshold mid-collection still dispatches the
            // records collected so far.
            let mut wave = Vec::new();
            while wave.len() < self.max_concurrency {
                let Some(Reverse(node)) = ready.pop() else {
                    break;
                };
                if let Some(dispatch) = self.prepare(ctx, node) {
                    wave.push(dispatch);
                    continue;
                }
                self.finish(ctx, node, &mut remaining, &mut ready);
                if ctx.records[node].is_failed() {
                    errors += 1;
                    if reached(threshold, errors) {
                        halted = true;
                        break;
                    }
                }
            }
            if wave.is_empty() {
                continue;
            }

            tracing::debug!(size = wave.len(), "Dispatching operations to resource store");
            let results = join_all(wave.iter().map(|d| {
                self.store
                    .execute(d.method, &d.path, d.payload.as_ref(), d.version.as_deref())
            }))
            .await;

            for (dispatch, result) in wave.into_iter().zip(results) {
                let node = dispatch.node;
                ctx.execution_order.push(node);
                match result {
                    Ok(outcome) => {
                        tracing::debug!(index = node, location = %outcome.location, "Operation resolved");
                        ctx.records[node].resolve(ResolvedResource {
                            id: outcome.id,
                            location: outcome.location,
                            version: outcome.version,
                        });
                    }
                    Err(e) => {
                        tracing::debug!(index = node, status = e.status, error = %e.detail, "Operation failed at resource store");
                        errors += 1;
                        ctx.records[node].fail(OperationError::Store(e));
                    }
                }
                self.finish(ctx, node, &mut remaining, &mut ready);
            }
            halted |= reached(threshold, errors);
        }

        if let Some(threshold) = threshold.filter(|&t| errors >= t) {
            tracing::info!(threshold, errors, "failOnErrors threshold reached, aborting remaining operations");
            for record in ctx.records.iter_mut().filter(|r| r.is_pending()) {
                record.fail(OperationError::Aborted { threshold });
            }
        }

        for record in &ctx.records {
            if let Some(bulk_id) = record.temporary_id() {
                if !ctx.resolver_map.contains(bulk_id) {
                    ctx.resolver_map
                        .record(bulk_id.to_string(), Resolution::Unresolved);
                }
            }
        }
    }

    /// Substitute references for a ready record, or settle it without a
    /// store call if it already failed or a dependency did not resolve.
    fn prepare(&self, ctx: &mut ResolutionContext, node: NodeId) -> Option<Dispatch> {
        let record = &ctx.records[node];
        if !record.is_pending() {
            return None;
        }

        let unresolved = record
            .depends_on
            .iter()
            .find(|bulk_id| !ctx.resolver_map.is_resolved(bulk_id))
            .cloned();
        if let Some(bulk_id) = unresolved {
            tracing::debug!(index = node, bulk_id = %bulk_id, "Dependency failed, skipping operation");
            ctx.records[node].fail(OperationError::DependencyFailed { bulk_id });
            return None;
        }

        let substituted = self.scanner.substitute(record, &ctx.resolver_map);
        Some(Dispatch {
            node,
            method: record.method,
            path: substituted.path.to_string(),
            payload: substituted.payload,
            version: record.version.clone(),
        })
    }

    /// Publish a settled record's temporary id and release its dependents.
    fn finish(
        &self,
        ctx: &mut ResolutionContext,
        node: NodeId,
        remaining: &mut [usize],
        ready: &mut BinaryHeap<Reverse<NodeId>>,
    ) {
        let record = &ctx.records[node];
        if let Some(bulk_id) = record.temporary_id() {
            let resolution = match record.resolved() {
                Some(resource) => Resolution::Resolved {
                    id: resource.id.clone(),
                    location: resource.location.clone(),
                },
                None => Resolution::Unresolved,
            };
            ctx.resolver_map.record(bulk_id.to_string(), resolution);
        }

        for &next in ctx.graph.dependents(node) {
            if !ctx.records[next].is_pending() || remaining[next] == 0 {
                continue;
            }
            remaining[next] -= 1;
            if remaining[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
}

fn reached(threshold: Option<u32>, errors: u32) -> bool {
    threshold.is_some_and(|t| errors >= t)
}
