use std::collections::HashSet;
use std::path::{Path, PathBuf};

use provgraph_core::error::CoreError;
use provgraph_core::filter::parse_args;
use provgraph_core::kernel::Registry;
use provgraph_core::model::{Direction, Edge, Element, Vertex};
use provgraph_core::predicate::Predicate;
use provgraph_core::storage::{QueryStore, Sink};

use crate::error::QueryError;
use crate::index::{GraphIndexWriter, GraphSearcher};

/// Disk-backed graph store: a [`Sink`] that writes the Tantivy index and a [`QueryStore`]
/// over what it has committed.
///
/// Elements are buffered until the next commit, which happens every `commit_interval`
/// new elements and on [`Sink::commit`]. A failed commit is rolled back and the buffer is
/// kept for the next one.
pub struct IndexStore {
    path: PathBuf,
    writer: GraphIndexWriter,
    searcher: GraphSearcher,
    pending: Vec<Element>,
    /// Ids written by this store, committed or not.
    known: HashSet<String>,
    ops_since_commit: usize,
    commit_interval: usize,
}

impl IndexStore {
    pub const NAME: &'static str = "index";

    pub fn open(path: &Path, commit_interval: usize) -> Result<Self, QueryError> {
        let writer = GraphIndexWriter::open(path)?;
        let searcher = GraphSearcher::for_index(writer.index().clone())?;
        tracing::info!(path = %path.display(), "Opened graph index");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            searcher,
            pending: Vec::new(),
            known: HashSet::new(),
            ops_since_commit: 0,
            commit_interval: commit_interval.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn searcher(&self) -> &GraphSearcher {
        &self.searcher
    }

    /// Records `id` as stored. Returns `false` if it was already here, in this session or in
    /// an earlier one.
    fn claim(&mut self, id: &str) -> Result<bool, QueryError> {
        if self.known.contains(id) {
            return Ok(false);
        }
        let committed_before = self.searcher.contains_id(id)?;
        self.known.insert(id.to_string());
        Ok(!committed_before)
    }

    fn stage_vertex(&mut self, vertex: &Vertex) -> Result<bool, QueryError> {
        if !self.claim(vertex.id().as_str())? {
            return Ok(false);
        }
        self.pending.push(Element::Vertex(vertex.clone()));
        self.tick();
        Ok(true)
    }

    fn tick(&mut self) {
        self.ops_since_commit += 1;
        if self.ops_since_commit < self.commit_interval {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(
                pending = self.pending.len(),
                "Periodic index commit failed, retrying at the next boundary: {e}"
            );
            self.ops_since_commit = 0;
        }
    }

    fn flush(&mut self) -> Result<(), QueryError> {
        self.ops_since_commit = 0;
        if self.pending.is_empty() {
            return Ok(());
        }
        let written = self.write_pending().and_then(|()| self.writer.commit());
        if let Err(e) = written {
            if let Err(rollback) = self.writer.rollback() {
                tracing::error!("Index rollback failed: {rollback}");
            }
            return Err(e);
        }
        tracing::debug!(elements = self.pending.len(), "Committed graph index");
        self.pending.clear();
        self.searcher.reload()
    }

    fn write_pending(&mut self) -> Result<(), QueryError> {
        for element in &self.pending {
            match element {
                Element::Vertex(v) => self.writer.add_vertex(v)?,
                Element::Edge(e) => self.writer.add_edge(e)?,
            }
        }
        Ok(())
    }
}

impl Sink for IndexStore {
    fn put_vertex(&mut self, vertex: &Vertex) -> Result<bool, CoreError> {
        Ok(self.stage_vertex(vertex)?)
    }

    fn put_edge(&mut self, edge: &Edge) -> Result<bool, CoreError> {
        self.stage_vertex(edge.source())?;
        self.stage_vertex(edge.destination())?;
        if !self.claim(edge.id().as_str())? {
            return Ok(false);
        }
        self.pending.push(Element::Edge(edge.clone()));
        self.tick();
        Ok(true)
    }

    fn commit(&mut self) -> Result<(), CoreError> {
        Ok(self.flush()?)
    }

    fn shutdown(&mut self) -> Result<(), CoreError> {
        self.flush()?;
        tracing::info!(path = %self.path.display(), "Closed graph index");
        Ok(())
    }
}

impl QueryStore for IndexStore {
    fn get_vertices(&self, predicate: &Predicate) -> Result<HashSet<Vertex>, CoreError> {
        self.searcher.get_vertices(predicate)
    }

    fn get_edges(&self, predicate: &Predicate) -> Result<HashSet<Edge>, CoreError> {
        self.searcher.get_edges(predicate)
    }

    fn get_edges_matching(
        &self,
        source: &Predicate,
        destination: &Predicate,
        edge: &Predicate,
    ) -> Result<HashSet<Edge>, CoreError> {
        self.searcher.get_edges_matching(source, destination, edge)
    }

    fn get_edges_between(
        &self,
        source: &Vertex,
        destination: &Vertex,
    ) -> Result<HashSet<Edge>, CoreError> {
        self.searcher.get_edges_between(source, destination)
    }

    fn adjacent_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
    ) -> Result<Vec<Edge>, CoreError> {
        self.searcher.adjacent_edges(vertex, direction)
    }
}

/// Register the `index` sink. `path=` and `commit_interval=` override the given defaults.
pub fn register_index_sink(
    registry: &mut Registry,
    default_path: PathBuf,
    default_interval: usize,
) {
    registry.register_sink(IndexStore::NAME, move |args| {
        let args = parse_args(args);
        let path = args.get("path").map(PathBuf::from).unwrap_or_else(|| default_path.clone());
        let interval = match args.get("commit_interval") {
            Some(n) => n
                .parse()
                .map_err(|_| {
                    CoreError::Config(format!("commit_interval must be a number, got '{n}'"))
                })?,
            None => default_interval,
        };
        Ok(Box::new(IndexStore::open(&path, interval)?))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use provgraph_core::lineage::LineageRequest;

    fn chain(n: usize) -> Vec<Vertex> {
        (0..n).map(|i| Vertex::process().with("pid", i.to_string())).collect()
    }

    #[test]
    fn test_put_vertex_dedups_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IndexStore::open(dir.path(), 100).unwrap();
        let v = Vertex::process().with("pid", "1").with("name", "bash");

        assert!(store.put_vertex(&v).unwrap());
        assert!(!store.put_vertex(&v).unwrap());
        assert!(store.get_vertices(&Predicate::Any).unwrap().is_empty());

        store.commit().unwrap();
        let found = store.get_vertices(&Predicate::eq("name", "bash")).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains(&v));
    }

    #[test]
    fn test_commit_interval_triggers_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IndexStore::open(dir.path(), 2).unwrap();
        let vs = chain(3);
        store.put_vertex(&vs[0]).unwrap();
        assert_eq!(store.searcher().counts().unwrap(), (0, 0));
        store.put_vertex(&vs[1]).unwrap();
        assert_eq!(store.searcher().counts().unwrap(), (2, 0));
        store.put_vertex(&vs[2]).unwrap();
        assert_eq!(store.pending(), 1);
    }

    #[test]
    fn test_reopened_index_remembers_elements() {
        let dir = tempfile::tempdir().unwrap();
        let v = Vertex::artifact().with("path", "/etc/passwd");
        {
            let mut store = IndexStore::open(dir.path(), 100).unwrap();
            assert!(store.put_vertex(&v).unwrap());
            store.shutdown().unwrap();
        }
        let mut store = IndexStore::open(dir.path(), 100).unwrap();
        assert!(!store.put_vertex(&v).unwrap());
        assert_eq!(store.searcher().counts().unwrap(), (1, 0));
    }

    #[test]
    fn test_put_edge_stores_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IndexStore::open(dir.path(), 100).unwrap();
        let p = Vertex::process().with("pid", "7");
        let a = Vertex::artifact().with("path", "/tmp/out.txt");
        let e = Edge::was_generated_by(a.clone(), p.clone()).unwrap().with("time", "12:00");
        assert!(store.put_edge(&e).unwrap());
        assert!(!store.put_edge(&e).unwrap());
        store.commit().unwrap();

        assert_eq!(store.searcher().counts().unwrap(), (2, 1));
        assert_eq!(store.get_edges_between(&a, &p).unwrap().len(), 1);
        assert_eq!(store.adjacent_edges(&p, Direction::Ancestors).unwrap(), vec![e.clone()]);
        assert!(store.adjacent_edges(&p, Direction::Descendants).unwrap().is_empty());
    }

    #[test]
    fn test_predicates_against_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IndexStore::open(dir.path(), 100).unwrap();
        let bash = Vertex::process().with("name", "bash").with("cmdline", "/bin/bash -l");
        let ssh = Vertex::process().with("name", "ssh").with("cmdline", "/usr/bin/ssh host");
        let file = Vertex::artifact().with("path", "/home/me/notes.txt");
        for v in [&bash, &ssh, &file] {
            store.put_vertex(v).unwrap();
        }
        store.commit().unwrap();

        let query = |text: &str| store.get_vertices(&Predicate::parse(text).unwrap()).unwrap();
        assert_eq!(query("type:Process").len(), 2);
        assert!(query("cmdline~SSH").contains(&ssh));
        assert_eq!(query("path~notes").len(), 1);
        assert_eq!(query("NOT type:Process"), HashSet::from([file.clone()]));
        assert_eq!(query("name:bash OR name:ssh").len(), 2);
        assert!(query("cmdline~bin/bash").is_empty());
        assert_eq!(query("*").len(), 3);
    }

    #[test]
    fn test_endpoint_queries_use_indexed_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IndexStore::open(dir.path(), 100).unwrap();
        let bash = Vertex::process().with("name", "bash");
        let ssh = Vertex::process().with("name", "ssh");
        let notes = Vertex::artifact().with("path", "/home/me/notes.txt");
        let log = Vertex::artifact().with("path", "/var/log/auth.log");
        let reads = [
            Edge::used(bash.clone(), notes.clone()).unwrap().with("op", "read"),
            Edge::used(bash.clone(), log.clone()).unwrap().with("op", "read"),
            Edge::used(ssh.clone(), log.clone()).unwrap().with("op", "mmap"),
        ];
        for e in &reads {
            store.put_edge(e).unwrap();
        }
        store.commit().unwrap();

        let between = store
            .searcher()
            .edges_between(bash.id().as_str(), log.id().as_str())
            .unwrap();
        assert_eq!(between, HashSet::from([reads[1].clone()]));
        assert!(store.get_edges_between(&log, &bash).unwrap().is_empty());

        let from_bash = store
            .get_edges_matching(&Predicate::eq("name", "bash"), &Predicate::Any, &Predicate::Any)
            .unwrap();
        assert_eq!(from_bash.len(), 2);
        let log_files = Predicate::parse("path~log").unwrap();
        let into_log = store
            .get_edges_matching(&Predicate::Any, &log_files, &Predicate::eq("op", "mmap"))
            .unwrap();
        assert_eq!(into_log, HashSet::from([reads[2].clone()]));
        let none = store
            .get_edges_matching(&Predicate::eq("name", "zsh"), &Predicate::Any, &Predicate::Any)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_lineage_over_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IndexStore::open(dir.path(), 100).unwrap();
        let p = chain(4);
        for w in p.windows(2) {
            store.put_edge(&Edge::was_triggered_by(w[1].clone(), w[0].clone()).unwrap()).unwrap();
        }
        store.commit().unwrap();

        // P3 -> P2 -> P1 -> P0; the ancestors of P0 are the later processes
        let request = LineageRequest::depth(Predicate::eq("pid", "0"), 2, Direction::Ancestors);
        let lineage = store.get_lineage(&request).unwrap();
        assert_eq!(lineage.vertices().len(), 3);
        assert_eq!(lineage.edges().len(), 2);
        assert!(!lineage.vertices().contains(&p[3]));
    }

    #[test]
    fn test_registered_sink_reads_args() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        register_index_sink(&mut registry, dir.path().join("default"), 10);
        let custom = dir.path().join("custom");
        registry
            .create_sink("index", &format!("path={} commit_interval=5", custom.display()))
            .unwrap();
        assert!(custom.join("meta.json").exists());
        assert!(matches!(
            registry.create_sink("index", "commit_interval=lots"),
            Err(CoreError::Config(_))
        ));
    }
}
