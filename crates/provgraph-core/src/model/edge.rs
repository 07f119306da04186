use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::annotations::Annotations;
use super::identity::{ContentDigest, EdgeId};
use super::vertex::{Vertex, VertexKind, TYPE_KEY};
use crate::error::CoreError;

/// The five edge kinds. Each fixes the kinds of its two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    Used,
    WasGeneratedBy,
    WasTriggeredBy,
    WasDerivedFrom,
    WasControlledBy,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::Used,
        EdgeKind::WasGeneratedBy,
        EdgeKind::WasTriggeredBy,
        EdgeKind::WasDerivedFrom,
        EdgeKind::WasControlledBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Used => "Used",
            EdgeKind::WasGeneratedBy => "WasGeneratedBy",
            EdgeKind::WasTriggeredBy => "WasTriggeredBy",
            EdgeKind::WasDerivedFrom => "WasDerivedFrom",
            EdgeKind::WasControlledBy => "WasControlledBy",
        }
    }

    /// (source kind, destination kind) required by this edge kind.
    pub fn endpoints(&self) -> (VertexKind, VertexKind) {
        match self {
            EdgeKind::Used => (VertexKind::Process, VertexKind::Artifact),
            EdgeKind::WasGeneratedBy => (VertexKind::Artifact, VertexKind::Process),
            EdgeKind::WasTriggeredBy => (VertexKind::Process, VertexKind::Process),
            EdgeKind::WasDerivedFrom => (VertexKind::Artifact, VertexKind::Artifact),
            EdgeKind::WasControlledBy => (VertexKind::Process, VertexKind::Agent),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Parse(format!("unknown edge kind: {s}")))
    }
}

/// Traversal direction: `Descendants` walks source -> destination,
/// `Ancestors` walks destination -> source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ancestors,
    Descendants,
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ancestors" | "ancestry" | "in" | "incoming" => Ok(Direction::Ancestors),
            "descendants" | "descendancy" | "out" | "outgoing" => Ok(Direction::Descendants),
            other => Err(CoreError::Parse(format!("unknown direction: {other}"))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Ancestors => "ancestors",
            Direction::Descendants => "descendants",
        })
    }
}

/// A directed provenance edge. Owns copies of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EdgeRepr")]
pub struct Edge {
    kind: EdgeKind,
    source: Vertex,
    destination: Vertex,
    annotations: Annotations,
}

#[derive(Deserialize)]
struct EdgeRepr {
    kind: EdgeKind,
    source: Vertex,
    destination: Vertex,
    #[serde(default)]
    annotations: Annotations,
}

impl TryFrom<EdgeRepr> for Edge {
    type Error = CoreError;

    fn try_from(repr: EdgeRepr) -> Result<Self, Self::Error> {
        let mut edge = Edge::new(repr.kind, repr.source, repr.destination)?;
        for (k, v) in repr.annotations.iter() {
            if k == TYPE_KEY && v != repr.kind.as_str() {
                return Err(CoreError::Parse(format!(
                    "edge kind {} conflicts with type annotation {v}",
                    repr.kind
                )));
            }
            edge.annotate(k, v);
        }
        Ok(edge)
    }
}

impl Edge {
    /// Construct an edge, rejecting endpoints whose kinds don't match the edge kind.
    pub fn new(kind: EdgeKind, source: Vertex, destination: Vertex) -> Result<Self, CoreError> {
        let (expected_src, expected_dst) = kind.endpoints();
        if source.kind() != expected_src || destination.kind() != expected_dst {
            return Err(CoreError::InvalidEdge {
                kind,
                expected_src,
                expected_dst,
                src: source.kind(),
                dst: destination.kind(),
            });
        }
        let mut annotations = Annotations::new();
        annotations.insert(TYPE_KEY, kind.as_str());
        Ok(Self {
            kind,
            source,
            destination,
            annotations,
        })
    }

    pub fn used(process: Vertex, artifact: Vertex) -> Result<Self, CoreError> {
        Self::new(EdgeKind::Used, process, artifact)
    }

    pub fn was_generated_by(artifact: Vertex, process: Vertex) -> Result<Self, CoreError> {
        Self::new(EdgeKind::WasGeneratedBy, artifact, process)
    }

    pub fn was_triggered_by(process: Vertex, other: Vertex) -> Result<Self, CoreError> {
        Self::new(EdgeKind::WasTriggeredBy, process, other)
    }

    pub fn was_derived_from(artifact: Vertex, other: Vertex) -> Result<Self, CoreError> {
        Self::new(EdgeKind::WasDerivedFrom, artifact, other)
    }

    pub fn was_controlled_by(process: Vertex, agent: Vertex) -> Result<Self, CoreError> {
        Self::new(EdgeKind::WasControlledBy, process, agent)
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.annotate(key, value);
        self
    }

    /// Set an annotation in place. Writes to `type` are ignored.
    pub fn annotate(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        if key == TYPE_KEY {
            return None;
        }
        self.annotations.insert(key, value)
    }

    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        if key == TYPE_KEY {
            return None;
        }
        self.annotations.remove(key)
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn source(&self) -> &Vertex {
        &self.source
    }

    pub fn destination(&self) -> &Vertex {
        &self.destination
    }

    /// Mutable access to both endpoints at once, for filters that rewrite vertex annotations.
    pub fn endpoints_mut(&mut self) -> (&mut Vertex, &mut Vertex) {
        (&mut self.source, &mut self.destination)
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.annotations.get(key)
    }

    /// The endpoint reached when walking this edge in `direction`.
    pub fn far_end(&self, direction: Direction) -> &Vertex {
        match direction {
            Direction::Descendants => &self.destination,
            Direction::Ancestors => &self.source,
        }
    }

    pub fn id(&self) -> EdgeId {
        let mut digest = ContentDigest::new("edge");
        digest
            .field(self.kind.as_str())
            .field(self.source.id().as_str())
            .field(self.destination.id().as_str())
            .annotations(&self.annotations);
        EdgeId(digest.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_kinds_validated() {
        let p = Vertex::process().with("pid", "1");
        let a = Vertex::artifact().with("path", "/tmp/x");
        assert!(Edge::used(p.clone(), a.clone()).is_ok());
        assert!(Edge::used(a.clone(), p.clone()).is_err());
        assert!(Edge::was_controlled_by(p.clone(), a.clone()).is_err());
        assert!(Edge::was_generated_by(a, p).is_ok());
    }

    #[test]
    fn test_every_kind_has_distinct_name() {
        for kind in EdgeKind::ALL {
            assert_eq!(kind.as_str().parse::<EdgeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_edge_identity() {
        let p = Vertex::process().with("pid", "1");
        let a = Vertex::artifact().with("path", "/tmp/x");
        let e1 = Edge::used(p.clone(), a.clone()).unwrap().with("op", "read");
        let e2 = Edge::used(p.clone(), a.clone()).unwrap().with("op", "read");
        let e3 = Edge::used(p, a).unwrap().with("op", "mmap");
        assert_eq!(e1, e2);
        assert_eq!(e1.id(), e2.id());
        assert_ne!(e1.id(), e3.id());
    }

    #[test]
    fn test_deserialize_validates_endpoints() {
        let ok = r#"{"kind":"Used","source":{"kind":"Process","annotations":{"pid":"1"}},
            "destination":{"kind":"Artifact","annotations":{"path":"/a"}},"annotations":{"op":"read"}}"#;
        let edge: Edge = serde_json::from_str(ok).unwrap();
        assert_eq!(edge.get("op"), Some("read"));
        assert_eq!(edge.get(TYPE_KEY), Some("Used"));

        let bad = r#"{"kind":"Used","source":{"kind":"Artifact","annotations":{}},
            "destination":{"kind":"Artifact","annotations":{}}}"#;
        assert!(serde_json::from_str::<Edge>(bad).is_err());
    }

    #[test]
    fn test_far_end() {
        let p1 = Vertex::process().with("pid", "1");
        let p2 = Vertex::process().with("pid", "2");
        let e = Edge::was_triggered_by(p1.clone(), p2.clone()).unwrap();
        assert_eq!(e.far_end(Direction::Descendants), &p2);
        assert_eq!(e.far_end(Direction::Ancestors), &p1);
    }
}
