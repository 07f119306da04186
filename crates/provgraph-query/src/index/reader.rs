use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{BooleanQuery, Occur, Query};
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, ReloadPolicy, TantivyDocument};

use provgraph_core::error::CoreError;
use provgraph_core::model::{Direction, Edge, Vertex};
use provgraph_core::predicate::Predicate;
use provgraph_core::storage::QueryStore;

use super::query::{element_query, id_set_query, term_query, translate};
use super::schema::{GraphSchema, EDGE, VERTEX};
use crate::error::QueryError;

/// Searches the graph index. Sees the index as of the last [`GraphSearcher::reload`].
pub struct GraphSearcher {
    schema: GraphSchema,
    index: Index,
    reader: IndexReader,
}

impl GraphSearcher {
    /// Open an existing index for reading.
    pub fn open(path: &Path) -> Result<Self, QueryError> {
        let index = Index::open_in_dir(path)?;
        Self::for_index(index)
    }

    pub fn for_index(index: Index) -> Result<Self, QueryError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            schema: GraphSchema::new(),
            index,
            reader,
        })
    }

    /// Pick up the latest commit.
    pub fn reload(&self) -> Result<(), QueryError> {
        self.reader.reload()?;
        Ok(())
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    fn load<T: DeserializeOwned>(&self, query: &dyn Query) -> Result<Vec<T>, QueryError> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(query, &DocSetCollector)?;

        let mut out = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            let body = doc
                .get_first(self.schema.body)
                .and_then(|v| v.as_str())
                .ok_or_else(|| QueryError::Index("document without a stored body".into()))?;
            out.push(serde_json::from_str(body)?);
        }
        Ok(out)
    }

    fn count(&self, query: &dyn Query) -> Result<usize, QueryError> {
        Ok(self.reader.searcher().search(query, &Count)?)
    }

    pub fn vertices(&self, predicate: &Predicate) -> Result<HashSet<Vertex>, QueryError> {
        let query = element_query(&self.schema, VERTEX, predicate);
        let found: Vec<Vertex> = self.load(query.as_ref())?;
        Ok(found
            .into_iter()
            .filter(|v| predicate.matches(v.annotations()))
            .collect())
    }

    pub fn edges(&self, predicate: &Predicate) -> Result<HashSet<Edge>, QueryError> {
        let query = element_query(&self.schema, EDGE, predicate);
        let found: Vec<Edge> = self.load(query.as_ref())?;
        Ok(found
            .into_iter()
            .filter(|e| predicate.matches(e.annotations()))
            .collect())
    }

    /// Whether a vertex or edge with this id has been committed.
    pub fn contains_id(&self, id: &str) -> Result<bool, QueryError> {
        Ok(self.count(term_query(self.schema.id, id).as_ref())? > 0)
    }

    /// Edges leaving (`Descendants`) or entering (`Ancestors`) the vertex with `id`.
    pub fn edges_at(&self, id: &str, direction: Direction) -> Result<Vec<Edge>, QueryError> {
        let field = match direction {
            Direction::Descendants => self.schema.src_id,
            Direction::Ancestors => self.schema.dst_id,
        };
        let mut edges: Vec<Edge> = self.load(term_query(field, id).as_ref())?;
        edges.sort_by_cached_key(Edge::id);
        Ok(edges)
    }

    /// Edges whose endpoints and own annotations match the three predicates.
    ///
    /// Endpoint predicates are resolved to vertex ids first, so only edges touching those
    /// vertices are loaded.
    pub fn edges_matching(
        &self,
        source: &Predicate,
        destination: &Predicate,
        edge: &Predicate,
    ) -> Result<HashSet<Edge>, QueryError> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![
            (Occur::Must, term_query(self.schema.element, EDGE)),
            (Occur::Must, translate(&self.schema, edge)),
        ];
        let endpoints = [(self.schema.src_id, source), (self.schema.dst_id, destination)];
        for (field, predicate) in endpoints {
            if *predicate == Predicate::Any {
                continue;
            }
            let ids: Vec<String> = self
                .vertices(predicate)?
                .iter()
                .map(|v| v.id().to_string())
                .collect();
            if ids.is_empty() {
                return Ok(HashSet::new());
            }
            clauses.push((Occur::Must, id_set_query(field, ids.iter().map(String::as_str))));
        }

        let found: Vec<Edge> = self.load(&BooleanQuery::new(clauses))?;
        Ok(found
            .into_iter()
            .filter(|e| {
                edge.matches(e.annotations())
                    && source.matches(e.source().annotations())
                    && destination.matches(e.destination().annotations())
            })
            .collect())
    }

    /// Every edge from the vertex with id `source` to the one with id `destination`.
    pub fn edges_between(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<HashSet<Edge>, QueryError> {
        let query = BooleanQuery::new(vec![
            (Occur::Must, term_query(self.schema.element, EDGE)),
            (Occur::Must, term_query(self.schema.src_id, source)),
            (Occur::Must, term_query(self.schema.dst_id, destination)),
        ]);
        let found: Vec<Edge> = self.load(&query)?;
        Ok(found.into_iter().collect())
    }

    /// Committed (vertex, edge) counts.
    pub fn counts(&self) -> Result<(usize, usize), QueryError> {
        let vertices = self.count(term_query(self.schema.element, VERTEX).as_ref())?;
        let edges = self.count(term_query(self.schema.element, EDGE).as_ref())?;
        Ok((vertices, edges))
    }
}

impl QueryStore for GraphSearcher {
    fn get_vertices(&self, predicate: &Predicate) -> Result<HashSet<Vertex>, CoreError> {
        Ok(self.vertices(predicate)?)
    }

    fn get_edges(&self, predicate: &Predicate) -> Result<HashSet<Edge>, CoreError> {
        Ok(self.edges(predicate)?)
    }

    fn get_edges_matching(
        &self,
        source: &Predicate,
        destination: &Predicate,
        edge: &Predicate,
    ) -> Result<HashSet<Edge>, CoreError> {
        Ok(self.edges_matching(source, destination, edge)?)
    }

    fn get_edges_between(
        &self,
        source: &Vertex,
        destination: &Vertex,
    ) -> Result<HashSet<Edge>, CoreError> {
        Ok(self.edges_between(source.id().as_str(), destination.id().as_str())?)
    }

    fn adjacent_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
    ) -> Result<Vec<Edge>, CoreError> {
        Ok(self.edges_at(vertex.id().as_str(), direction)?)
    }
}
