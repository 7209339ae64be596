//! Edge-labeled directed multigraphs, the data queries run over.

use std::collections::BTreeSet;

/// A graph vertex. Vertex ids are caller-owned small integers.
pub type Vertex = u32;

/// A directed edge with a string label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: Vertex,
    pub label: String,
    pub to: Vertex,
}

/// A directed multigraph with string edge labels.
///
/// Vertices are tracked explicitly so isolated vertices can take part in
/// queries (an ε-accepting query can report `(v, v)` for an edgeless `v`).
///
/// Vertex ids are owned by the caller and are never remapped or merged by
/// the engine. Evaluating queries over two independently built graphs whose
/// vertex ids collide is undefined: combine such graphs only after renaming
/// the ids apart.
#[derive(Debug, Clone, Default)]
pub struct LabeledGraph {
    vertices: BTreeSet<Vertex>,
    edges: Vec<Edge>,
}

impl LabeledGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from `(from, label, to)` triples.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = (Vertex, &'a str, Vertex)>) -> Self {
        let mut graph = Self::new();
        for (from, label, to) in edges {
            graph.add_edge(from, label, to);
        }
        graph
    }

    /// Adds a vertex. Idempotent.
    pub fn add_vertex(&mut self, v: Vertex) {
        self.vertices.insert(v);
    }

    /// Adds a directed labeled edge, inserting its endpoints as vertices.
    /// Parallel edges (same endpoints, same or different labels) are kept.
    pub fn add_edge(&mut self, from: Vertex, label: impl Into<String>, to: Vertex) {
        self.vertices.insert(from);
        self.vertices.insert(to);
        self.edges.push(Edge {
            from,
            label: label.into(),
            to,
        });
    }

    /// The vertex set, in increasing order.
    pub fn vertices(&self) -> &BTreeSet<Vertex> {
        &self.vertices
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The set of distinct edge labels.
    pub fn labels(&self) -> BTreeSet<&str> {
        self.edges.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_build() {
        let mut g = LabeledGraph::new();
        g.add_edge(0, "a", 1);
        g.add_edge(1, "b", 2);
        g.add_vertex(7);

        assert_eq!(g.num_vertices(), 4);
        assert_eq!(g.num_edges(), 2);
        assert_eq!(g.labels().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_parallel_edges() {
        let g = LabeledGraph::from_edges([(0, "a", 0), (0, "a", 0), (0, "b", 0)]);
        assert_eq!(g.num_vertices(), 1);
        assert_eq!(g.num_edges(), 3);
    }
}
