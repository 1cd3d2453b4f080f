//! Cycle detection.
//!
//! Runs an iterative Tarjan traversal over nodes that have not already
//! failed. Every strongly connected component with more than one node, and
//! every node with a self loop, is a cycle. Only the participants fail;
//! nodes downstream of a cycle are left pending and fail forward when
//! scheduled.

use crate::error::OperationError;
use crate::graph::{DependencyGraph, NodeId};
use crate::record::OperationRecord;

/// Fail every cycle participant with [`OperationError::CircularReference`].
///
/// Returns the cycles found, each sorted by request index.
pub fn validate(graph: &DependencyGraph, records: &mut [OperationRecord]) -> Vec<Vec<NodeId>> {
    let cycles = find_cycles(graph, |node| !records[node].is_failed());

    for cycle in &cycles {
        let members: Vec<String> = cycle
            .iter()
            .filter_map(|&node| records[node].temporary_id().map(str::to_string))
            .collect();
        tracing::debug!(cycle = ?members, "Circular bulkId reference");

        for &node in cycle {
            records[node].fail(OperationError::CircularReference {
                cycle: members.clone(),
            });
        }
    }
    cycles
}

/// Cycles among `live` nodes.
pub fn find_cycles(graph: &DependencyGraph, live: impl Fn(NodeId) -> bool) -> Vec<Vec<NodeId>> {
    let mut tarjan = Tarjan::new(graph.len());

    for root in 0..graph.len() {
        if live(root) && tarjan.order[root].is_none() {
            tarjan.run(graph, root, &live);
        }
    }

    tarjan
        .components
        .into_iter()
        .filter(|c| c.len() > 1 || graph.has_self_loop(c[0]))
        .map(|mut c| {
            c.sort_unstable();
            c
        })
        .collect()
}

struct Tarjan {
    order: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<NodeId>,
    next: usize,
    components: Vec<Vec<NodeId>>,
}

impl Tarjan {
    fn new(len: usize) -> Self {
        Self {
            order: vec![None; len],
            lowlink: vec![0; len],
            on_stack: vec![false; len],
            stack: Vec::new(),
            next: 0,
            components: Vec::new(),
        }
    }

    fn visit(&mut self, node: NodeId) {
        self.order[node] = Some(self.next);
        self.lowlink[node] = self.next;
        self.next += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    fn run(&mut self, graph: &DependencyGraph, root: NodeId, live: &impl Fn(NodeId) -> bool) {
        // (node, position of the next outgoing edge to explore)
        let mut frames: Vec<(NodeId, usize)> = vec![(root, 0)];
        self.visit(root);

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            let edges = graph.dependents(node);

            if frame.1 < edges.len() {
                let next = edges[frame.1];
                frame.1 += 1;
                if !live(next) {
                    continue;
                }
                match self.order[next] {
                    None => {
                        self.visit(next);
                        frames.push((next, 0));
                    }
                    Some(order) if self.on_stack[next] => {
                        self.lowlink[node] = self.lowlink[node].min(order);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if Some(self.lowlink[node]) == self.order[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}
