use std::collections::HashMap;

use super::{parse_args, Filter, Forward};
use crate::error::CoreError;
use crate::model::{Edge, EdgeKind, Vertex, VertexKind};

#[derive(Debug, Clone, Copy)]
struct ArtifactState {
    version: u64,
    /// The current version has already gone downstream.
    seen: bool,
}

/// Gives every write to an artifact a new vertex with the next `version`.
///
/// Artifacts are tracked by a key annotation (`path` by default); artifacts without it pass
/// through untouched. Every tracked artifact leaving the filter carries its current version.
/// A write (`WasGeneratedBy`, or the derived side of `WasDerivedFrom`) to an artifact that
/// was already seen bumps the version and links the new vertex to the previous one with a
/// `WasDerivedFrom` edge marked `edge_key=edge_value`. The first write to an unseen artifact
/// produces the initial version.
#[derive(Debug)]
pub struct VersionOnWrite {
    key: String,
    version_key: String,
    initial: u64,
    edge_key: String,
    edge_value: String,
    artifacts: HashMap<String, ArtifactState>,
}

impl Default for VersionOnWrite {
    fn default() -> Self {
        Self {
            key: "path".into(),
            version_key: "version".into(),
            initial: 0,
            edge_key: "operation".into(),
            edge_value: "update".into(),
            artifacts: HashMap::new(),
        }
    }
}

impl VersionOnWrite {
    pub const NAME: &'static str = "version-on-write";

    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `key=`, `version_key=`, `initial=`, `edge_key=` and `edge_value=`.
    pub fn from_args(args: &str) -> Result<Self, CoreError> {
        let mut filter = Self::new();
        for (key, value) in parse_args(args) {
            if value.is_empty() {
                return Err(CoreError::Config(format!(
                    "version-on-write argument '{key}' is empty"
                )));
            }
            match key.as_str() {
                "key" => filter.key = value,
                "version_key" => filter.version_key = value,
                "edge_key" => filter.edge_key = value,
                "edge_value" => filter.edge_value = value,
                "initial" => {
                    filter.initial = value.parse().map_err(|_| {
                        CoreError::Config(format!("initial must be a number, got '{value}'"))
                    })?
                }
                other => {
                    return Err(CoreError::Config(format!(
                        "unknown version-on-write argument '{other}'"
                    )))
                }
            }
        }
        Ok(filter)
    }

    /// The version currently recorded for `artifact`, if it is tracked.
    pub fn version_of(&self, artifact: &Vertex) -> Option<u64> {
        let key = self.tracked_key(artifact)?;
        self.artifacts.get(&key).map(|s| s.version)
    }

    fn tracked_key(&self, vertex: &Vertex) -> Option<String> {
        if vertex.kind() != VertexKind::Artifact {
            return None;
        }
        vertex.get(&self.key).map(str::to_string)
    }

    fn stamp(&self, mut vertex: Vertex, version: u64) -> Vertex {
        vertex.annotate(&self.version_key, version.to_string());
        vertex
    }

    /// `vertex` as of its current version. Untracked vertices come back unchanged.
    fn current(&mut self, vertex: Vertex) -> Vertex {
        let Some(key) = self.tracked_key(&vertex) else {
            return vertex;
        };
        let initial = self.initial;
        let state = self.artifacts.entry(key).or_insert(ArtifactState {
            version: initial,
            seen: false,
        });
        state.seen = true;
        let version = state.version;
        self.stamp(vertex, version)
    }

    /// Record a write to `artifact`. Returns the written version and, when the write
    /// replaced an earlier version, that earlier version.
    fn write(&mut self, artifact: Vertex) -> (Vertex, Option<Vertex>) {
        let Some(key) = self.tracked_key(&artifact) else {
            return (artifact, None);
        };
        let initial = self.initial;
        let state = self.artifacts.entry(key.clone()).or_insert(ArtifactState {
            version: initial,
            seen: false,
        });
        let previous = state.seen.then_some(state.version);
        if previous.is_some() {
            state.version += 1;
        }
        state.seen = true;
        let version = state.version;
        tracing::debug!(artifact = key, version, "Artifact written");
        let before = previous.map(|v| self.stamp(artifact.clone(), v));
        (self.stamp(artifact, version), before)
    }
}

/// `edge` with new endpoints and the same annotations.
fn rebuild(edge: &Edge, source: Vertex, destination: Vertex) -> Result<Edge, CoreError> {
    let mut copy = Edge::new(edge.kind(), source, destination)?;
    for (k, v) in edge.annotations().iter() {
        copy.annotate(k, v);
    }
    Ok(copy)
}

impl Filter for VersionOnWrite {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn put_vertex(&mut self, vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
        out.vertex(self.current(vertex));
        Ok(())
    }

    fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
        match edge.kind() {
            EdgeKind::WasGeneratedBy | EdgeKind::WasDerivedFrom => {
                // Read the input first so a self-derived artifact points at its old version.
                let destination = self.current(edge.destination().clone());
                let (written, previous) = self.write(edge.source().clone());
                let copy = rebuild(&edge, written.clone(), destination)?;
                out.vertex(written.clone());
                let links_previous = previous.as_ref() == Some(copy.destination())
                    && copy.kind() == EdgeKind::WasDerivedFrom;
                out.edge(copy);
                if let Some(previous) = previous.filter(|_| !links_previous) {
                    let mut update = Edge::was_derived_from(written, previous)?;
                    update.annotate(&self.edge_key, self.edge_value.clone());
                    out.edge(update);
                }
            }
            _ => {
                let source = self.current(edge.source().clone());
                let destination = self.current(edge.destination().clone());
                out.edge(rebuild(&edge, source, destination)?);
            }
        }
        Ok(())
    }
}
