//! Acyclicity check and deterministic ordering
//!
//! Builds a petgraph view of the derived edges. Node weights are
//! declaration indices, so ordering ties resolve to manifest order.

use crate::definition::Edge;
use crate::error::ManifestError;
use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Verify `edges` form a DAG over `ids` and return a topological order
///
/// `ids` must be in declaration order and every edge endpoint must be
/// one of them.
///
/// # Errors
/// Returns [`ManifestError::CycleDetected`] naming a stage on the cycle
pub(crate) fn topological_order<V>(
    ids: &IndexMap<String, V>,
    edges: &[Edge],
) -> Result<Vec<String>, ManifestError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(ids.len(), edges.len());
    let index: HashMap<&str, NodeIndex> = ids
        .keys()
        .enumerate()
        .map(|(i, id)| (id.as_str(), graph.add_node(i)))
        .collect();

    for edge in edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            continue;
        };
        graph.add_edge(from, to, ());
    }

    if let Err(cycle) = toposort(&graph, None) {
        let stage = ids
            .get_index(graph[cycle.node_id()])
            .map(|(id, _)| id.clone())
            .unwrap_or_default();
        return Err(ManifestError::CycleDetected { stage });
    }

    // Kahn's algorithm with a min-heap on declaration index
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .map(|n| Reverse(graph[n]))
        .collect();

    let mut order = Vec::with_capacity(ids.len());
    while let Some(Reverse(decl)) = ready.pop() {
        order.push(ids.get_index(decl).map(|(id, _)| id.clone()).unwrap_or_default());
        for child in graph.neighbors_directed(NodeIndex::new(decl), Direction::Outgoing) {
            let degree = &mut in_degree[child.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(graph[child]));
            }
        }
    }

    Ok(order)
}
