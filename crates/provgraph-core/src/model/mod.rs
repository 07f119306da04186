pub mod annotations;
pub mod edge;
pub mod identity;
pub mod vertex;

use serde::{Deserialize, Serialize};

pub use annotations::Annotations;
pub use edge::{Direction, Edge, EdgeKind};
pub use identity::{EdgeId, VertexId};
pub use vertex::{Vertex, VertexKind, TYPE_KEY};

/// A single unit flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
}

impl Element {
    pub fn annotate(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        match self {
            Element::Vertex(v) => v.annotate(key, value),
            Element::Edge(e) => e.annotate(key, value),
        }
    }

    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        match self {
            Element::Vertex(v) => v.remove_annotation(key),
            Element::Edge(e) => e.remove_annotation(key),
        }
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Element::Vertex(v) => v.annotations(),
            Element::Edge(e) => e.annotations(),
        }
    }
}

impl From<Vertex> for Element {
    fn from(v: Vertex) -> Self {
        Element::Vertex(v)
    }
}

impl From<Edge> for Element {
    fn from(e: Edge) -> Self {
        Element::Edge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_json_line_format() {
        let line = r#"{"element":"vertex","kind":"Agent","annotations":{"uid":"1000"}}"#;
        let el: Element = serde_json::from_str(line).unwrap();
        assert_eq!(el, Element::Vertex(Vertex::agent().with("uid", "1000")));

        let line = r#"{"element":"edge","kind":"WasControlledBy",
            "source":{"kind":"Process","annotations":{"pid":"7"}},
            "destination":{"kind":"Agent","annotations":{"uid":"1000"}}}"#;
        match serde_json::from_str::<Element>(line).unwrap() {
            Element::Edge(e) => assert_eq!(e.kind(), EdgeKind::WasControlledBy),
            other => panic!("expected edge, got {other:?}"),
        }
    }
}
