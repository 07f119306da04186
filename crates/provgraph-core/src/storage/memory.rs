use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{QueryStore, Sink};
use crate::error::CoreError;
use crate::model::{Direction, Edge, EdgeId, Vertex, VertexId};
use crate::predicate::Predicate;

pub const DEFAULT_COMMIT_INTERVAL: usize = 10_000;

#[derive(Debug, Default)]
struct Graph {
    vertices: HashMap<VertexId, Vertex>,
    edges: HashMap<EdgeId, Edge>,
    outgoing: HashMap<VertexId, Vec<EdgeId>>,
    incoming: HashMap<VertexId, Vec<EdgeId>>,
}

impl Graph {
    fn insert_vertex(&mut self, id: VertexId, vertex: Vertex) {
        self.vertices.insert(id, vertex);
    }

    fn insert_edge(&mut self, id: EdgeId, edge: Edge) {
        self.outgoing.entry(edge.source().id()).or_default().push(id.clone());
        self.incoming.entry(edge.destination().id()).or_default().push(id.clone());
        self.edges.insert(id, edge);
    }
}

#[derive(Debug)]
struct Inner {
    committed: Graph,
    pending_vertices: Vec<(VertexId, Vertex)>,
    pending_edges: Vec<(EdgeId, Edge)>,
    seen_vertices: HashSet<VertexId>,
    seen_edges: HashSet<EdgeId>,
    ops_since_commit: usize,
    commit_interval: usize,
}

impl Inner {
    fn commit(&mut self) {
        for (id, v) in self.pending_vertices.drain(..) {
            self.committed.insert_vertex(id, v);
        }
        for (id, e) in self.pending_edges.drain(..) {
            self.committed.insert_edge(id, e);
        }
        self.ops_since_commit = 0;
    }

    fn tick(&mut self) {
        self.ops_since_commit += 1;
        if self.ops_since_commit >= self.commit_interval {
            self.commit();
        }
    }

    fn put_vertex(&mut self, vertex: &Vertex) -> bool {
        let id = vertex.id();
        if !self.seen_vertices.insert(id.clone()) {
            return false;
        }
        self.pending_vertices.push((id, vertex.clone()));
        self.tick();
        true
    }
}

/// In-process graph store. Cloning shares the same graph.
///
/// Writes are pending until [`Sink::commit`] or until `commit_interval` writes accumulate;
/// queries only see committed elements.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_commit_interval(DEFAULT_COMMIT_INTERVAL)
    }
}

impl MemoryStore {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_interval(commit_interval: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                committed: Graph::default(),
                pending_vertices: Vec::new(),
                pending_edges: Vec::new(),
                seen_vertices: HashSet::new(),
                seen_edges: HashSet::new(),
                ops_since_commit: 0,
                commit_interval: commit_interval.max(1),
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Committed (vertex, edge) counts.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.read();
        (inner.committed.vertices.len(), inner.committed.edges.len())
    }

    pub fn pending(&self) -> usize {
        let inner = self.read();
        inner.pending_vertices.len() + inner.pending_edges.len()
    }
}

impl Sink for MemoryStore {
    fn put_vertex(&mut self, vertex: &Vertex) -> Result<bool, CoreError> {
        Ok(self.write().put_vertex(vertex))
    }

    fn put_edge(&mut self, edge: &Edge) -> Result<bool, CoreError> {
        let mut inner = self.write();
        inner.put_vertex(edge.source());
        inner.put_vertex(edge.destination());
        let id = edge.id();
        if !inner.seen_edges.insert(id.clone()) {
            return Ok(false);
        }
        inner.pending_edges.push((id, edge.clone()));
        inner.tick();
        Ok(true)
    }

    fn commit(&mut self) -> Result<(), CoreError> {
        let mut inner = self.write();
        let pending = inner.pending_vertices.len() + inner.pending_edges.len();
        inner.commit();
        tracing::debug!(pending, "Committed memory store");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), CoreError> {
        self.commit()
    }
}

impl QueryStore for MemoryStore {
    fn get_vertices(&self, predicate: &Predicate) -> Result<HashSet<Vertex>, CoreError> {
        Ok(self
            .read()
            .committed
            .vertices
            .values()
            .filter(|v| predicate.matches(v.annotations()))
            .cloned()
            .collect())
    }

    fn get_edges(&self, predicate: &Predicate) -> Result<HashSet<Edge>, CoreError> {
        Ok(self
            .read()
            .committed
            .edges
            .values()
            .filter(|e| predicate.matches(e.annotations()))
            .cloned()
            .collect())
    }

    fn adjacent_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
    ) -> Result<Vec<Edge>, CoreError> {
        let inner = self.read();
        let graph = &inner.committed;
        let index = match direction {
            Direction::Descendants => &graph.outgoing,
            Direction::Ancestors => &graph.incoming,
        };
        let mut ids: Vec<&EdgeId> = index
            .get(&vertex.id())
            .map(|ids| ids.iter().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids.into_iter().filter_map(|id| graph.edges.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_vertex_true_exactly_once() {
        let mut store = MemoryStore::new();
        let v1 = Vertex::process().with("pid", "1").with("name", "sh");
        let v2 = Vertex::process().with("name", "sh").with("pid", "1");
        assert!(store.put_vertex(&v1).unwrap());
        assert!(!store.put_vertex(&v2).unwrap());
    }

    #[test]
    fn test_queries_see_only_committed() {
        let mut store = MemoryStore::new();
        store.put_vertex(&Vertex::agent().with("uid", "0")).unwrap();
        assert!(store.get_vertices(&Predicate::Any).unwrap().is_empty());
        assert_eq!(store.pending(), 1);
        store.commit().unwrap();
        assert_eq!(store.get_vertices(&Predicate::eq("uid", "0")).unwrap().len(), 1);
    }

    #[test]
    fn test_commit_interval_triggers_commit() {
        let mut store = MemoryStore::with_commit_interval(2);
        store.put_vertex(&Vertex::agent().with("uid", "0")).unwrap();
        store.put_vertex(&Vertex::agent().with("uid", "1")).unwrap();
        assert_eq!(store.counts(), (2, 0));
    }

    #[test]
    fn test_put_edge_stores_endpoints() {
        let mut store = MemoryStore::new();
        let p = Vertex::process().with("pid", "1");
        let a = Vertex::artifact().with("path", "/a");
        let e = Edge::used(p.clone(), a.clone()).unwrap();
        assert!(store.put_edge(&e).unwrap());
        assert!(!store.put_edge(&e).unwrap());
        store.commit().unwrap();
        assert_eq!(store.counts(), (2, 1));
        assert_eq!(store.adjacent_edges(&p, Direction::Descendants).unwrap(), vec![e.clone()]);
        assert_eq!(store.adjacent_edges(&a, Direction::Ancestors).unwrap(), vec![e]);
        assert!(store.adjacent_edges(&a, Direction::Descendants).unwrap().is_empty());
    }

    #[test]
    fn test_edges_between_and_matching() {
        let mut store = MemoryStore::new();
        let p = Vertex::process().with("pid", "1");
        let a = Vertex::artifact().with("path", "/a");
        let b = Vertex::artifact().with("path", "/b");
        store.put_edge(&Edge::used(p.clone(), a.clone()).unwrap()).unwrap();
        store.put_edge(&Edge::used(p.clone(), b.clone()).unwrap().with("op", "mmap")).unwrap();
        store.commit().unwrap();

        assert_eq!(store.get_edges_between(&p, &a).unwrap().len(), 1);
        let mmapped = store
            .get_edges_matching(
                &Predicate::eq("pid", "1"),
                &Predicate::Any,
                &Predicate::eq("op", "mmap"),
            )
            .unwrap();
        assert_eq!(mmapped.len(), 1);
        assert_eq!(store.get_edges(&Predicate::eq("type", "Used")).unwrap().len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let mut writer = MemoryStore::new();
        let reader = writer.clone();
        writer.put_vertex(&Vertex::agent()).unwrap();
        writer.commit().unwrap();
        assert_eq!(reader.counts().0, 1);
    }
}
