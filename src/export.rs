//! Export types for serialized graph views of a triple set.
//!
//! These provide label-resolved, JSON- and Graphviz-friendly renderings of
//! the final triples. The canonical per-record result is serialized
//! directly from [`crate::pipeline::ExtractionResult`]; the shapes here are
//! for downstream graph tooling.

use serde::{Deserialize, Serialize};

use crate::graph::TripleGraph;
use crate::triple::{Triple, normalize};

/// Exported node with its degree in the final graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExport {
    /// Normalized entity label.
    pub id: String,
    /// Total degree (in + out).
    pub degree: usize,
}

/// Exported edge with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub inference: crate::triple::Inference,
    pub iteration_source: usize,
}

/// A nodes/edges document for graph tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

/// Build a nodes/edges export from a final triple set.
///
/// Nodes are sorted by label; edges keep triple order.
pub fn to_graph_export(triples: &[Triple]) -> GraphExport {
    let graph = TripleGraph::build(triples);

    let mut nodes: Vec<NodeExport> = graph
        .inner()
        .node_indices()
        .map(|idx| NodeExport {
            id: graph.label(idx).to_string(),
            degree: graph.degree(idx),
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let edges = triples
        .iter()
        .map(|t| EdgeExport {
            source: normalize(&t.head),
            target: normalize(&t.tail),
            relation: normalize(&t.relation),
            inference: t.inference,
            iteration_source: t.iteration_source,
        })
        .collect();

    GraphExport { nodes, edges }
}

/// Render a triple set as a Graphviz DOT digraph.
///
/// Contextual edges are dashed so bridging triples stand out in rendered
/// output.
pub fn to_dot(triples: &[Triple], name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("digraph {} {{\n", dot_escape(name)));
    out.push_str("  rankdir=LR;\n  node [shape=box];\n");

    let export = to_graph_export(triples);
    for node in &export.nodes {
        out.push_str(&format!("  {};\n", dot_escape(&node.id)));
    }
    for edge in &export.edges {
        let style = match edge.inference {
            crate::triple::Inference::Explicit => "solid",
            crate::triple::Inference::Contextual => "dashed",
        };
        out.push_str(&format!(
            "  {} -> {} [label={}, style={}];\n",
            dot_escape(&edge.source),
            dot_escape(&edge.target),
            dot_escape(&edge.relation),
            style
        ));
    }
    out.push_str("}\n");
    out
}

fn dot_escape(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
