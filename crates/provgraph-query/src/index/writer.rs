use std::path::Path;

use tantivy::{doc, Index, IndexWriter, TantivyDocument};

use provgraph_core::model::{Annotations, Edge, Vertex};
use provgraph_core::predicate::tokens;

use super::schema::{pair_term, GraphSchema, EDGE, VERTEX};
use crate::error::QueryError;

/// Writes vertices and edges to the Tantivy index.
pub struct GraphIndexWriter {
    schema: GraphSchema,
    index: Index,
    writer: IndexWriter,
}

impl GraphIndexWriter {
    /// Open or create an index at the given path.
    pub fn open(path: &Path) -> Result<Self, QueryError> {
        let schema = GraphSchema::new();
        let index = if path.exists() && path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            std::fs::create_dir_all(path).map_err(QueryError::Io)?;
            Index::create_in_dir(path, schema.schema.clone())?
        };

        // 50MB heap for indexing
        let writer = index.writer(50_000_000)?;

        Ok(Self {
            schema,
            index,
            writer,
        })
    }

    fn add_annotations(&self, document: &mut TantivyDocument, annotations: &Annotations) {
        for (key, value) in annotations.iter() {
            document.add_text(self.schema.pairs, pair_term(key, value));
            for token in tokens(value) {
                document.add_text(self.schema.words, pair_term(key, &token));
            }
        }
    }

    pub fn add_vertex(&mut self, vertex: &Vertex) -> Result<(), QueryError> {
        let s = &self.schema;
        let mut document = doc!(
            s.element => VERTEX,
            s.id => vertex.id().as_str(),
            s.kind => vertex.kind().as_str(),
            s.body => serde_json::to_string(vertex)?,
        );
        self.add_annotations(&mut document, vertex.annotations());
        self.writer.add_document(document)?;
        Ok(())
    }

    pub fn add_edge(&mut self, edge: &Edge) -> Result<(), QueryError> {
        let s = &self.schema;
        let mut document = doc!(
            s.element => EDGE,
            s.id => edge.id().as_str(),
            s.kind => edge.kind().as_str(),
            s.src_id => edge.source().id().as_str(),
            s.dst_id => edge.destination().id().as_str(),
            s.body => serde_json::to_string(edge)?,
        );
        self.add_annotations(&mut document, edge.annotations());
        self.writer.add_document(document)?;
        Ok(())
    }

    /// Commit all pending changes.
    pub fn commit(&mut self) -> Result<(), QueryError> {
        self.writer.commit()?;
        Ok(())
    }

    /// Discard every document added since the last commit.
    pub fn rollback(&mut self) -> Result<(), QueryError> {
        self.writer.rollback()?;
        Ok(())
    }

    /// Get a reference to the underlying index.
    pub fn index(&self) -> &Index {
        &self.index
    }
}
