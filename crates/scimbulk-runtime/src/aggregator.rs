//! Result aggregation.

use scimbulk_core::{BulkOperationResponse, BulkResponse, ScimError};

use crate::context::ResolutionContext;
use crate::graph::NodeId;
use crate::record::{OperationRecord, Outcome};
use crate::resolver_map::ResolverMap;

/// Everything a finished resolution pass produced.
#[derive(Debug)]
pub struct ResolutionReport {
    response: BulkResponse,
    resolver_map: ResolverMap,
    execution_order: Vec<NodeId>,
    records: Vec<OperationRecord>,
    cycles: Vec<Vec<NodeId>>,
}

impl ResolutionReport {
    /// The bulk response, one entry per requested operation in request order.
    pub fn response(&self) -> &BulkResponse {
        &self.response
    }

    pub fn resolver_map(&self) -> &ResolverMap {
        &self.resolver_map
    }

    /// Request indices in the order their store calls were issued.
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn cycles(&self) -> &[Vec<NodeId>] {
        &self.cycles
    }

    pub fn succeeded(&self) -> usize {
        self.response.operations.iter().filter(|op| op.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.response.operations.len() - self.succeeded()
    }

    pub fn into_parts(self) -> (BulkResponse, ResolverMap) {
        (self.response, self.resolver_map)
    }
}

/// Build the bulk response from a scheduled context.
pub fn aggregate(ctx: ResolutionContext) -> ResolutionReport {
    let operations = ctx.records.iter().map(entry).collect();

    ResolutionReport {
        response: BulkResponse::new(operations),
        resolver_map: ctx.resolver_map,
        execution_order: ctx.execution_order,
        records: ctx.records,
        cycles: ctx.cycles,
    }
}

fn entry(record: &OperationRecord) -> BulkOperationResponse {
    let mut entry = BulkOperationResponse {
        method: record.method,
        bulk_id: record.bulk_id.clone(),
        version: None,
        location: None,
        status: String::new(),
        response: None,
    };

    match record.outcome() {
        Some(Outcome::Resolved(resource)) => {
            entry.status = record.method.success_status().to_string();
            entry.location = Some(resource.location.clone());
            entry.version = resource.version.clone();
        }
        Some(Outcome::Failed(error)) => {
            entry.status = error.status().to_string();
            entry.response = Some(error.to_scim_error());
        }
        None => {
            // Only reachable if the scheduler was never run.
            tracing::warn!(index = record.index, "Operation left pending after scheduling");
            entry.status = "500".to_string();
            entry.response = Some(ScimError::new(500, None, "operation was never scheduled"));
        }
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use crate::graph::DependencyGraph;
    use crate::record::ResolvedResource;
    use scimbulk_core::{BulkConfig, BulkOperationRequest, Method};
    use serde_json::json;

    fn context(ops: Vec<BulkOperationRequest>) -> ResolutionContext {
        let mut records: Vec<OperationRecord> = ops
            .iter()
            .enumerate()
            .map(|(i, op)| OperationRecord::from_request(i, op, &BulkConfig::default()).unwrap())
            .collect();
        let graph = DependencyGraph::build(&mut records).unwrap();
        ResolutionContext::new(records, graph, Vec::new(), None)
    }

    #[test]
    fn renders_one_entry_per_operation_in_request_order() {
        let mut ctx = context(vec![
            BulkOperationRequest::create("/Users", "usr1", json!({"userName": "alice"})),
            BulkOperationRequest::delete("/Users/b7c14771").with_bulk_id("del"),
        ]);
        ctx.records[0].resolve(ResolvedResource {
            id: "92b725cd".to_string(),
            location: "https://example.com/v2/Users/92b725cd".to_string(),
            version: Some("W/\"1\"".to_string()),
        });
        ctx.records[1].fail(OperationError::Aborted { threshold: 1 });

        let report = aggregate(ctx);
        let ops = &report.response().operations;
        assert_eq!(ops.len(), 2);

        assert_eq!(ops[0].method, Method::Create);
        assert_eq!(ops[0].bulk_id.as_deref(), Some("usr1"));
        assert_eq!(ops[0].status, "201");
        assert_eq!(ops[0].location.as_deref(), Some("https://example.com/v2/Users/92b725cd"));
        assert_eq!(ops[0].version.as_deref(), Some("W/\"1\""));
        assert!(ops[0].response.is_none());

        assert_eq!(ops[1].bulk_id.as_deref(), Some("del"));
        assert_eq!(ops[1].status, "412");
        assert!(ops[1].location.is_none());
        assert_eq!(ops[1].response.as_ref().map(|r| r.status.as_str()), Some("412"));

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn unscheduled_record_renders_as_server_error() {
        let ctx = context(vec![BulkOperationRequest::delete("/Users/1")]);
        let report = aggregate(ctx);
        assert_eq!(report.response().operations[0].status, "500");
    }
}
