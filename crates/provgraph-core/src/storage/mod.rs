//! Storage contracts: [`Sink`] for the write side, [`QueryStore`] for lookups and lineage.

pub mod memory;

use std::collections::HashSet;

use crate::error::CoreError;
use crate::lineage::{self, LineageGraph, LineageRequest, Subgraph};
use crate::model::{Direction, Edge, Vertex};
use crate::predicate::Predicate;

pub use memory::MemoryStore;

/// Consumer at the end of the filter chain.
pub trait Sink: Send {
    fn initialize(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Returns `true` if the vertex was new to this sink.
    fn put_vertex(&mut self, vertex: &Vertex) -> Result<bool, CoreError>;

    /// Returns `true` if the edge was new to this sink.
    fn put_edge(&mut self, edge: &Edge) -> Result<bool, CoreError>;

    /// Make pending writes visible to readers.
    fn commit(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Called exactly once when the sink is detached.
    fn shutdown(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Read side of a graph store. Only committed elements are visible.
pub trait QueryStore {
    fn get_vertices(&self, predicate: &Predicate) -> Result<HashSet<Vertex>, CoreError>;

    fn get_edges(&self, predicate: &Predicate) -> Result<HashSet<Edge>, CoreError>;

    /// Edges whose source, destination and own annotations match the three predicates.
    fn get_edges_matching(
        &self,
        source: &Predicate,
        destination: &Predicate,
        edge: &Predicate,
    ) -> Result<HashSet<Edge>, CoreError> {
        Ok(self
            .get_edges(edge)?
            .into_iter()
            .filter(|e| {
                source.matches(e.source().annotations())
                    && destination.matches(e.destination().annotations())
            })
            .collect())
    }

    /// Every edge from `source` to `destination`.
    fn get_edges_between(
        &self,
        source: &Vertex,
        destination: &Vertex,
    ) -> Result<HashSet<Edge>, CoreError> {
        Ok(self
            .get_edges_matching(
                &Predicate::from_vertex(source),
                &Predicate::from_vertex(destination),
                &Predicate::Any,
            )?
            .into_iter()
            .filter(|e| e.source() == source && e.destination() == destination)
            .collect())
    }

    /// Edges leaving `vertex` (`Descendants`) or entering it (`Ancestors`), sorted by id.
    fn adjacent_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
    ) -> Result<Vec<Edge>, CoreError> {
        let here = Predicate::from_vertex(vertex);
        let any = Predicate::Any;
        let candidates = match direction {
            Direction::Descendants => self.get_edges_matching(&here, &any, &any)?,
            Direction::Ancestors => self.get_edges_matching(&any, &here, &any)?,
        };
        let mut edges: Vec<Edge> = candidates
            .into_iter()
            .filter(|e| match direction {
                Direction::Descendants => e.source() == vertex,
                Direction::Ancestors => e.destination() == vertex,
            })
            .collect();
        edges.sort_by_cached_key(Edge::id);
        Ok(edges)
    }

    fn get_lineage(&self, request: &LineageRequest) -> Result<LineageGraph, CoreError> {
        lineage::traverse(self, request)
    }

    /// A shortest path of at most `max_depth` edges from `from` to `to`.
    fn get_path(
        &self,
        from: &Vertex,
        to: &Vertex,
        max_depth: u32,
    ) -> Result<Option<Subgraph>, CoreError> {
        lineage::shortest_path(self, from, to, max_depth)
    }

    /// Every vertex and edge on a path of at most `max_depth` edges from `from` to `to`.
    fn get_link(&self, from: &Vertex, to: &Vertex, max_depth: u32) -> Result<Subgraph, CoreError> {
        lineage::link(self, from, to, max_depth)
    }
}
