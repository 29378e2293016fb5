//! Graph view over a triple set.
//!
//! Builds a directed `petgraph` graph whose nodes are the distinct normalized
//! entity labels and whose edges are the unique (head, relation, tail)
//! identities. Connectivity analysis treats edges as undirected (weakly
//! connected components); see [`components`].

pub mod components;

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::triple::{Triple, TripleKey, normalize};

/// Directed graph induced by a triple set.
///
/// Rebuilt from scratch each refinement iteration rather than mutated in
/// place: component indices are not stable across mutations, and the build
/// is linear in the number of triples.
pub struct TripleGraph {
    graph: DiGraph<String, String>,
    node_index: HashMap<String, NodeIndex>,
}

impl TripleGraph {
    /// Build a graph from a triple multiset, deduplicating edges on triple
    /// identity.
    pub fn build(triples: &[Triple]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_index: HashMap<String, NodeIndex> = HashMap::new();
        let mut seen_edges: HashSet<TripleKey> = HashSet::new();

        for triple in triples {
            let key = triple.key();
            if !seen_edges.insert(key.clone()) {
                continue;
            }
            let head = Self::ensure_node(&mut graph, &mut node_index, key.head);
            let tail = Self::ensure_node(&mut graph, &mut node_index, key.tail);
            graph.add_edge(head, tail, key.relation);
        }

        Self { graph, node_index }
    }

    fn ensure_node(
        graph: &mut DiGraph<String, String>,
        node_index: &mut HashMap<String, NodeIndex>,
        label: String,
    ) -> NodeIndex {
        *node_index
            .entry(label.clone())
            .or_insert_with(|| graph.add_node(label))
    }

    /// Number of distinct entities.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of unique edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up the node index for a normalized entity label.
    pub fn node(&self, label: &str) -> Option<NodeIndex> {
        self.node_index.get(&normalize(label)).copied()
    }

    /// Total degree (in + out) of a node.
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Normalized label of a node.
    pub fn label(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    /// Borrow the underlying petgraph graph.
    pub fn inner(&self) -> &DiGraph<String, String> {
        &self.graph
    }

    /// Summary statistics for the metadata record.
    pub fn stats(&self) -> GraphStats {
        let nodes = self.node_count();
        let edges = self.edge_count();
        let component_count = components::components(self).len();
        GraphStats {
            nodes,
            edges,
            disconnected_components: component_count,
            is_connected: component_count <= 1,
            // Mean total degree: each edge contributes to two endpoints.
            avg_degree: if nodes == 0 {
                0.0
            } else {
                2.0 * edges as f64 / nodes as f64
            },
        }
    }
}

/// Structural summary of a triple graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Distinct entities.
    pub nodes: usize,
    /// Unique edges.
    pub edges: usize,
    /// Weakly connected component count.
    pub disconnected_components: usize,
    /// Whether the graph has at most one component.
    pub is_connected: bool,
    /// Mean total degree (in + out) per node.
    pub avg_degree: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_dedups_edges_on_identity() {
        let triples = vec![
            Triple::new("Alice", "knows", "Bob"),
            Triple::new("ALICE", "Knows", "bob"),
            Triple::new("Alice", "likes", "Bob"),
        ];
        let g = TripleGraph::build(&triples);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn stats_on_empty_graph() {
        let g = TripleGraph::build(&[]);
        let stats = g.stats();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.edges, 0);
        assert_eq!(stats.disconnected_components, 0);
        assert!(stats.is_connected);
        assert_eq!(stats.avg_degree, 0.0);
    }

    #[test]
    fn avg_degree_counts_both_endpoints() {
        let triples = vec![
            Triple::new("a", "r", "b"),
            Triple::new("b", "r", "c"),
        ];
        let g = TripleGraph::build(&triples);
        let stats = g.stats();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 2);
        assert!((stats.avg_degree - 4.0 / 3.0).abs() < 1e-9);
    }
}
