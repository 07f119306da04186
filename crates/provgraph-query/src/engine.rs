use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use provgraph_core::lineage::{self, LineageGraph, LineageRequest, PathGraph};
use provgraph_core::model::{Edge, Vertex};
use provgraph_core::predicate::Predicate;
use provgraph_core::storage::QueryStore;

use crate::error::QueryError;
use crate::index::GraphSearcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexCounts {
    pub vertices: usize,
    pub edges: usize,
}

/// Read-only access to a graph index written by [`crate::IndexStore`].
///
/// Opening never takes the writer lock, so queries can run while a pipeline is ingesting
/// into the same directory. Call [`QueryEngine::refresh`] to see later commits.
pub struct QueryEngine {
    index_path: PathBuf,
    searcher: GraphSearcher,
}

impl QueryEngine {
    pub fn open(path: &Path) -> Result<Self, QueryError> {
        if !path.join("meta.json").exists() {
            return Err(QueryError::Index(format!("no graph index at {}", path.display())));
        }
        Ok(Self {
            index_path: path.to_path_buf(),
            searcher: GraphSearcher::open(path)?,
        })
    }

    pub fn refresh(&self) -> Result<(), QueryError> {
        self.searcher.reload()
    }

    pub fn vertices(&self, predicate: &Predicate) -> Result<Vec<Vertex>, QueryError> {
        let mut found: Vec<Vertex> = self.searcher.vertices(predicate)?.into_iter().collect();
        found.sort_by_cached_key(Vertex::id);
        Ok(found)
    }

    pub fn edges(&self, predicate: &Predicate) -> Result<Vec<Edge>, QueryError> {
        Ok(sorted_edges(self.searcher.edges(predicate)?))
    }

    /// Edges whose endpoints and own annotations satisfy the three predicates.
    pub fn edges_matching(
        &self,
        source: &Predicate,
        destination: &Predicate,
        edge: &Predicate,
    ) -> Result<Vec<Edge>, QueryError> {
        Ok(sorted_edges(self.searcher.get_edges_matching(source, destination, edge)?))
    }

    pub fn lineage(&self, request: &LineageRequest) -> Result<LineageGraph, QueryError> {
        Ok(self.searcher.get_lineage(request)?)
    }

    /// Connect the vertices selected by `from` and `to` with paths of at most `max_depth`
    /// edges: one shortest path, or every vertex and edge on any such path when `every` is set.
    pub fn path(
        &self,
        from: &Predicate,
        to: &Predicate,
        max_depth: u32,
        every: bool,
    ) -> Result<PathGraph, QueryError> {
        let from = lineage::resolve(&self.searcher, from)?;
        let to = lineage::resolve(&self.searcher, to)?;
        let graph = if every {
            self.searcher.get_link(&from, &to, max_depth)?
        } else {
            self.searcher.get_path(&from, &to, max_depth)?.unwrap_or_default()
        };
        Ok(PathGraph { from, to, graph })
    }

    pub fn counts(&self) -> Result<IndexCounts, QueryError> {
        let (vertices, edges) = self.searcher.counts()?;
        Ok(IndexCounts { vertices, edges })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }
}

fn sorted_edges(edges: HashSet<Edge>) -> Vec<Edge> {
    let mut edges: Vec<Edge> = edges.into_iter().collect();
    edges.sort_by_cached_key(Edge::id);
    edges
}
