//! Dependency graph over operation records.
//!
//! Nodes live in an arena: a node id is the record's position in the
//! request. An edge `a -> b` means `a` must settle before `b` may run,
//! because `b` references the temporary id `a` creates.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{BulkError, OperationError};
use crate::record::OperationRecord;

/// Position of a record in the request.
pub type NodeId = usize;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependents: Vec<Vec<NodeId>>,
    dependencies: Vec<Vec<NodeId>>,
    index: HashMap<String, NodeId>,
}

impl DependencyGraph {
    /// Build the graph from records whose `depends_on` sets are filled.
    ///
    /// Duplicate temporary ids reject the batch. A record referencing a
    /// temporary id no create declares is failed with
    /// [`OperationError::DanglingReference`] and gets no incoming edges;
    /// edges out of it remain so its dependents fail forward.
    pub fn build(records: &mut [OperationRecord]) -> Result<Self, BulkError> {
        let mut index: HashMap<String, NodeId> = HashMap::new();
        for (node, record) in records.iter().enumerate() {
            let Some(bulk_id) = record.temporary_id() else {
                continue;
            };
            if let Some(&first) = index.get(bulk_id) {
                return Err(BulkError::DuplicateTemporaryId {
                    bulk_id: bulk_id.to_string(),
                    first,
                    second: node,
                });
            }
            index.insert(bulk_id.to_string(), node);
        }

        for record in records.iter_mut() {
            let missing = record
                .depends_on
                .iter()
                .find(|bulk_id| !index.contains_key(bulk_id.as_str()))
                .cloned();
            if let Some(bulk_id) = missing {
                tracing::debug!(index = record.index, bulk_id = %bulk_id, "Dangling bulkId reference");
                record.fail(OperationError::DanglingReference { bulk_id });
            }
        }

        let mut dependents = vec![Vec::new(); records.len()];
        let mut dependencies = vec![Vec::new(); records.len()];
        for (node, record) in records.iter().enumerate() {
            if record.is_failed() {
                continue;
            }
            for bulk_id in &record.depends_on {
                if let Some(&from) = index.get(bulk_id) {
                    dependents[from].push(node);
                    dependencies[node].push(from);
                }
            }
        }

        Ok(Self {
            dependents,
            dependencies,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    /// Node of the create operation declaring `bulk_id`.
    pub fn node_for(&self, bulk_id: &str) -> Option<NodeId> {
        self.index.get(bulk_id).copied()
    }

    /// Nodes that must wait for `node`.
    pub fn dependents(&self, node: NodeId) -> &[NodeId] {
        &self.dependents[node]
    }

    /// Nodes `node` waits for.
    pub fn dependencies(&self, node: NodeId) -> &[NodeId] {
        &self.dependencies[node]
    }

    pub fn has_self_loop(&self, node: NodeId) -> bool {
        self.dependents[node].contains(&node)
    }

    /// Topological order of the subgraph induced by `live` nodes.
    ///
    /// Among nodes with no path between them, the lower request index comes
    /// first. Nodes on a cycle never become ready and are left out.
    pub fn stable_topological_order(&self, live: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
        let mut remaining: Vec<usize> = (0..self.len())
            .map(|node| {
                self.dependencies[node]
                    .iter()
                    .filter(|&&d| live(d))
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeId>> = (0..self.len())
            .filter(|&node| live(node) && remaining[node] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &next in &self.dependents[node] {
                if !live(next) {
                    continue;
                }
                remaining[next] -= 1;
                if remaining[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        order
    }
}
