//! Request-scoped resolution state.

use std::collections::BTreeSet;

use crate::graph::{DependencyGraph, NodeId};
use crate::record::OperationRecord;
use crate::resolver_map::ResolverMap;

/// Everything one bulk request's resolution pass works on.
///
/// Created by [`crate::BulkResolver::plan`], advanced by the scheduler and
/// consumed by the aggregator. Nothing in here outlives the request.
#[derive(Debug)]
pub struct ResolutionContext {
    pub(crate) records: Vec<OperationRecord>,
    pub(crate) graph: DependencyGraph,
    pub(crate) cycles: Vec<Vec<NodeId>>,
    pub(crate) fail_on_errors: Option<u32>,
    pub(crate) resolver_map: ResolverMap,
    pub(crate) execution_order: Vec<NodeId>,
}

impl ResolutionContext {
    pub(crate) fn new(
        records: Vec<OperationRecord>,
        graph: DependencyGraph,
        cycles: Vec<Vec<NodeId>>,
        fail_on_errors: Option<u32>,
    ) -> Self {
        Self {
            records,
            graph,
            cycles,
            fail_on_errors,
            resolver_map: ResolverMap::default(),
            execution_order: Vec::new(),
        }
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Reference cycles found by validation, by request index.
    pub fn cycles(&self) -> &[Vec<NodeId>] {
        &self.cycles
    }

    /// Effective `failOnErrors` threshold.
    pub fn fail_on_errors(&self) -> Option<u32> {
        self.fail_on_errors
    }

    /// Order in which operations reach the store if every store call
    /// succeeds and no threshold is hit. Operations already failed by
    /// validation, and everything downstream of them, are left out.
    pub fn planned_order(&self) -> Vec<NodeId> {
        let live = |node: NodeId| !self.records[node].is_failed();
        let mut planned = BTreeSet::new();

        self.graph
            .stable_topological_order(live)
            .into_iter()
            .filter(|&node| {
                let runnable = self
                    .graph
                    .dependencies(node)
                    .iter()
                    .all(|d| planned.contains(d));
                if runnable {
                    planned.insert(node);
                }
                runnable
            })
            .collect()
    }
}
