//! Weakly connected component decomposition and LM-readable rendering.
//!
//! Components are returned in descending size order, ties broken by the
//! lexicographically smallest member label, so the decomposition is stable
//! under equivalent graphs (same nodes, same edges up to order).

use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use super::TripleGraph;

/// Maximum representative entities rendered per component in the bridging
/// prompt. Keeps the prompt within the LM's context on large graphs.
pub const REPRESENTATIVE_CAP: usize = 10;

/// A maximal set of entities mutually reachable via undirected traversal.
///
/// The index is stable for a given graph snapshot only; it carries no
/// meaning across snapshots.
#[derive(Debug, Clone)]
pub struct Component {
    /// Position in the size-ordered decomposition of this snapshot.
    pub index: usize,
    /// Member labels, sorted lexicographically.
    pub members: Vec<String>,
}

impl Component {
    /// Number of member entities.
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Decompose the graph into weakly connected components.
///
/// Edges are treated as undirected. Returns components sorted by size
/// descending, ties by smallest member label.
pub fn components(graph: &TripleGraph) -> Vec<Component> {
    let inner = graph.inner();
    let mut union = UnionFind::new(inner.node_count());
    for edge in inner.edge_references() {
        union.union(edge.source().index(), edge.target().index());
    }

    let mut grouped: std::collections::HashMap<usize, Vec<String>> =
        std::collections::HashMap::new();
    for idx in inner.node_indices() {
        grouped
            .entry(union.find(idx.index()))
            .or_default()
            .push(inner[idx].clone());
    }

    let mut result: Vec<Component> = grouped
        .into_values()
        .map(|mut members| {
            members.sort();
            Component { index: 0, members }
        })
        .collect();

    result.sort_by(|a, b| {
        b.size()
            .cmp(&a.size())
            .then_with(|| a.members[0].cmp(&b.members[0]))
    });
    for (i, comp) in result.iter_mut().enumerate() {
        comp.index = i;
    }
    result
}

/// Render a stable, LM-readable description of the decomposition.
///
/// One line per component: index, size, and up to [`REPRESENTATIVE_CAP`]
/// representative entities chosen by descending degree, ties broken
/// lexicographically.
pub fn format_components(graph: &TripleGraph, components: &[Component]) -> String {
    let mut lines = Vec::with_capacity(components.len());
    for comp in components {
        let mut ranked: Vec<(&str, usize)> = comp
            .members
            .iter()
            .map(|label| {
                let degree = graph.node(label).map(|idx| graph.degree(idx)).unwrap_or(0);
                (label.as_str(), degree)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let shown: Vec<&str> = ranked
            .iter()
            .take(REPRESENTATIVE_CAP)
            .map(|(label, _)| *label)
            .collect();
        let overflow = comp.size().saturating_sub(shown.len());

        let mut line = format!(
            "Component {} ({} entities): {}",
            comp.index,
            comp.size(),
            shown.join(", ")
        );
        if overflow > 0 {
            line.push_str(&format!(" (+{overflow} more)"));
        }
        lines.push(line);
    }
    lines.join("\n")
}
