use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::annotations::Annotations;
use super::identity::{ContentDigest, VertexId};
use crate::error::CoreError;

/// Annotation key naming the element kind.
pub const TYPE_KEY: &str = "type";

/// The three vertex kinds of the provenance model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexKind {
    Agent,
    Process,
    Artifact,
}

impl VertexKind {
    pub const ALL: [VertexKind; 3] = [VertexKind::Agent, VertexKind::Process, VertexKind::Artifact];

    pub fn as_str(&self) -> &'static str {
        match self {
            VertexKind::Agent => "Agent",
            VertexKind::Process => "Process",
            VertexKind::Artifact => "Artifact",
        }
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VertexKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VertexKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Parse(format!("unknown vertex kind: {s}")))
    }
}

/// A provenance vertex. Identity is the kind plus the full annotation content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VertexRepr")]
pub struct Vertex {
    kind: VertexKind,
    annotations: Annotations,
}

#[derive(Deserialize)]
struct VertexRepr {
    kind: VertexKind,
    #[serde(default)]
    annotations: Annotations,
}

impl TryFrom<VertexRepr> for Vertex {
    type Error = CoreError;

    fn try_from(repr: VertexRepr) -> Result<Self, Self::Error> {
        Vertex::with_annotations(repr.kind, repr.annotations)
    }
}

impl Vertex {
    pub fn new(kind: VertexKind) -> Self {
        let mut annotations = Annotations::new();
        annotations.insert(TYPE_KEY, kind.as_str());
        Self { kind, annotations }
    }

    /// Build from an existing mapping. A `type` annotation, if present, must agree with `kind`.
    pub fn with_annotations(kind: VertexKind, annotations: Annotations) -> Result<Self, CoreError> {
        match annotations.get(TYPE_KEY) {
            Some(t) if t != kind.as_str() => Err(CoreError::Parse(format!(
                "vertex kind {kind} conflicts with type annotation {t}"
            ))),
            Some(_) => Ok(Self { kind, annotations }),
            None => {
                let mut vertex = Self::new(kind);
                for (k, v) in annotations.iter() {
                    vertex.annotations.insert(k, v);
                }
                Ok(vertex)
            }
        }
    }

    pub fn agent() -> Self {
        Self::new(VertexKind::Agent)
    }

    pub fn process() -> Self {
        Self::new(VertexKind::Process)
    }

    pub fn artifact() -> Self {
        Self::new(VertexKind::Artifact)
    }

    /// Builder-style annotation. `type` cannot be changed this way.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.annotate(key, value);
        self
    }

    /// Set an annotation in place, returning the previous value. Writes to `type` are ignored.
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

    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.annotations.get(key)
    }

    pub fn id(&self) -> VertexId {
        let mut digest = ContentDigest::new("vertex");
        digest.field(self.kind.as_str()).annotations(&self.annotations);
        VertexId(digest.finish())
    }

    /// Short human label: name-ish annotation if present, else the short id.
    pub fn label(&self) -> String {
        ["name", "path", "pid"]
            .iter()
            .find_map(|k| self.get(k).map(|v| format!("{k}={v}")))
            .unwrap_or_else(|| self.id().short().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_annotation_set_on_construction() {
        let v = Vertex::process().with("pid", "42");
        assert_eq!(v.get(TYPE_KEY), Some("Process"));
        assert_eq!(v.kind(), VertexKind::Process);
    }

    #[test]
    fn test_identity_independent_of_insertion_order() {
        let a = Vertex::process().with("pid", "1").with("name", "bash");
        let b = Vertex::process().with("name", "bash").with("pid", "1");
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_kind_participates_in_identity() {
        let a = Vertex::process().with("id", "1");
        let b = Vertex::artifact().with("id", "1");
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_type_cannot_be_overwritten() {
        let mut v = Vertex::agent();
        assert_eq!(v.annotate(TYPE_KEY, "Process"), None);
        assert_eq!(v.remove_annotation(TYPE_KEY), None);
        assert_eq!(v.get(TYPE_KEY), Some("Agent"));
    }

    #[test]
    fn test_conflicting_type_rejected() {
        let annotations: Annotations = [("type", "Agent")].into_iter().collect();
        assert!(Vertex::with_annotations(VertexKind::Process, annotations).is_err());
    }

    #[test]
    fn test_deserialize_adds_type() {
        let v: Vertex =
            serde_json::from_str(r#"{"kind":"Artifact","annotations":{"path":"/etc/passwd"}}"#)
                .unwrap();
        assert_eq!(v, Vertex::artifact().with("path", "/etc/passwd"));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("process".parse::<VertexKind>().unwrap(), VertexKind::Process);
        assert!("socket".parse::<VertexKind>().is_err());
    }
}
