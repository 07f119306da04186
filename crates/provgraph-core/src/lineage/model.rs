use std::collections::HashSet;

use serde::Serialize;

use crate::model::{Direction, Edge, Vertex};
use crate::predicate::Predicate;

/// How far a lineage walk goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// Number of hops from the root.
    Depth(u32),
    /// Stop at vertices matching the predicate. They are never expanded.
    Prune(Predicate),
}

/// Input to [`super::traverse`].
#[derive(Debug, Clone)]
pub struct LineageRequest {
    /// Resolves the root vertex.
    pub source: Predicate,
    pub bound: Bound,
    pub direction: Direction,
    /// Whether vertices that stop a pruned walk are part of the result.
    pub include_terminating: bool,
}

impl LineageRequest {
    pub fn depth(source: Predicate, depth: u32, direction: Direction) -> Self {
        Self {
            source,
            bound: Bound::Depth(depth),
            direction,
            include_terminating: true,
        }
    }

    pub fn pruned(
        source: Predicate,
        stop: Predicate,
        direction: Direction,
        include_terminating: bool,
    ) -> Self {
        Self {
            source,
            bound: Bound::Prune(stop),
            direction,
            include_terminating,
        }
    }
}

/// A set of vertices and edges. Supports union, intersection and difference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    pub vertices: HashSet<Vertex>,
    pub edges: HashSet<Edge>,
}

impl Subgraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> bool {
        self.vertices.insert(vertex)
    }

    pub fn add_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    pub fn contains_vertex(&self, vertex: &Vertex) -> bool {
        self.vertices.contains(vertex)
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    pub fn union(&self, other: &Subgraph) -> Subgraph {
        Subgraph {
            vertices: self.vertices.union(&other.vertices).cloned().collect(),
            edges: self.edges.union(&other.edges).cloned().collect(),
        }
    }

    pub fn intersection(&self, other: &Subgraph) -> Subgraph {
        Subgraph {
            vertices: self.vertices.intersection(&other.vertices).cloned().collect(),
            edges: self.edges.intersection(&other.edges).cloned().collect(),
        }
    }

    /// Everything in `self` that is not in `other`.
    pub fn difference(&self, other: &Subgraph) -> Subgraph {
        Subgraph {
            vertices: self.vertices.difference(&other.vertices).cloned().collect(),
            edges: self.edges.difference(&other.edges).cloned().collect(),
        }
    }

    /// Vertices one edge away from `vertex` inside this subgraph, sorted by id.
    /// `Descendants` follows edges out of `vertex`, `Ancestors` follows edges into it.
    pub fn neighbours(&self, vertex: &Vertex, direction: Direction) -> Vec<&Vertex> {
        let mut found: Vec<&Vertex> = self
            .edges
            .iter()
            .filter(|e| match direction {
                Direction::Descendants => e.source() == vertex,
                Direction::Ancestors => e.destination() == vertex,
            })
            .map(|e| e.far_end(direction))
            .collect();
        found.sort_by_cached_key(|v| v.id());
        found.dedup();
        found
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    /// Vertices sorted by id, for stable output.
    pub fn sorted_vertices(&self) -> Vec<&Vertex> {
        let mut vertices: Vec<&Vertex> = self.vertices.iter().collect();
        vertices.sort_by_cached_key(|v| v.id());
        vertices
    }

    /// Edges sorted by id, for stable output.
    pub fn sorted_edges(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().collect();
        edges.sort_by_cached_key(|e| e.id());
        edges
    }
}

/// Result of a lineage walk: the subgraph plus the root and direction it was walked from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageGraph {
    pub root: Vertex,
    pub direction: Direction,
    pub graph: Subgraph,
}

impl LineageGraph {
    pub fn vertices(&self) -> &HashSet<Vertex> {
        &self.graph.vertices
    }

    pub fn edges(&self) -> &HashSet<Edge> {
        &self.graph.edges
    }

    pub fn union(&self, other: &LineageGraph) -> Subgraph {
        self.graph.union(&other.graph)
    }

    pub fn intersection(&self, other: &LineageGraph) -> Subgraph {
        self.graph.intersection(&other.graph)
    }
}

/// Result of a path query between two resolved vertices. An empty graph means no path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathGraph {
    pub from: Vertex,
    pub to: Vertex,
    pub graph: Subgraph,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pids: &[&str]) -> Subgraph {
        let mut g = Subgraph::new();
        let vertices: Vec<Vertex> =
            pids.iter().map(|p| Vertex::process().with("pid", *p)).collect();
        for v in &vertices {
            g.add_vertex(v.clone());
        }
        for w in vertices.windows(2) {
            g.add_edge(Edge::was_triggered_by(w[0].clone(), w[1].clone()).unwrap());
        }
        g
    }

    #[test]
    fn test_intersection_with_self_is_identity() {
        let g = sample(&["1", "2", "3"]);
        assert_eq!(g.intersection(&g), g);
    }

    #[test]
    fn test_union_is_set_union() {
        let g1 = sample(&["1", "2", "3"]);
        let g2 = sample(&["3", "4"]);
        let u = g1.union(&g2);
        assert_eq!(u.vertices.len(), 4);
        assert_eq!(u.edges.len(), 3);
        for v in g1.vertices.iter().chain(g2.vertices.iter()) {
            assert!(u.contains_vertex(v));
        }
    }

    #[test]
    fn test_difference_removes_shared_elements() {
        let g1 = sample(&["1", "2", "3"]);
        let g2 = sample(&["2", "3"]);
        let rest = g1.difference(&g2);
        assert_eq!(rest.vertices, HashSet::from([Vertex::process().with("pid", "1")]));
        assert_eq!(rest.edges.len(), 1);
        assert!(g2.difference(&g1).is_empty());
        assert_eq!(g1.difference(&Subgraph::new()), g1);
    }

    #[test]
    fn test_neighbours_follow_direction() {
        let g = sample(&["1", "2", "3"]);
        let middle = Vertex::process().with("pid", "2");
        let down = g.neighbours(&middle, Direction::Descendants);
        let up = g.neighbours(&middle, Direction::Ancestors);
        assert_eq!(down, vec![&Vertex::process().with("pid", "3")]);
        assert_eq!(up, vec![&Vertex::process().with("pid", "1")]);
        assert!(g.neighbours(&Vertex::process().with("pid", "9"), Direction::Ancestors).is_empty());
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let g1 = sample(&["1", "2"]);
        let g2 = sample(&["3", "4"]);
        assert!(g1.intersection(&g2).is_empty());
    }
}
