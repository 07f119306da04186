use std::collections::{HashMap, HashSet};

use super::{parse_args, Filter, Forward};
use crate::error::CoreError;
use crate::model::{Edge, EdgeKind, Vertex, VertexId, VertexKind};

/// Collapses bursts of same-direction accesses between one process and one artifact.
///
/// A `Used` edge opens a read run for its (artifact, process) pair and closes that
/// process's write run on the artifact; further `Used` edges for the pair are dropped until
/// the run is closed. `WasGeneratedBy` is the mirror image. Keyed artifact vertices are
/// held back under their run key and released together with the first edge that forwards
/// them. Held vertices may carry annotations the edge endpoints lack (the kernel's source
/// stamp), so they are matched by key rather than by id.
#[derive(Debug)]
pub struct IoRuns {
    key: String,
    reads: HashMap<String, HashSet<VertexId>>,
    writes: HashMap<String, HashSet<VertexId>>,
    held: HashMap<String, Vec<Vertex>>,
}

impl Default for IoRuns {
    fn default() -> Self {
        Self::with_key(Self::DEFAULT_KEY)
    }
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl IoRuns {
    pub const NAME: &'static str = "io-runs";
    pub const DEFAULT_KEY: &'static str = "path";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reads: HashMap::new(),
            writes: HashMap::new(),
            held: HashMap::new(),
        }
    }

    /// Accepts `key=<annotation>`.
    pub fn from_args(args: &str) -> Result<Self, CoreError> {
        let mut filter = Self::new();
        for (key, value) in parse_args(args) {
            match key.as_str() {
                "key" if !value.is_empty() => filter.key = value,
                other => {
                    return Err(CoreError::Config(format!("unknown io-runs argument '{other}'")))
                }
            }
        }
        Ok(filter)
    }

    fn artifact_key(&self, artifact: &Vertex) -> String {
        artifact
            .get(&self.key)
            .map(str::to_string)
            .unwrap_or_else(|| artifact.id().to_string())
    }

    fn access(&mut self, edge: Edge, access: Access, out: &mut Forward) {
        let (artifact, process) = match access {
            Access::Read => (edge.destination(), edge.source()),
            Access::Write => (edge.source(), edge.destination()),
        };
        let file = self.artifact_key(artifact);
        let process_id = process.id();

        let (open, opposite) = match access {
            Access::Read => (&mut self.reads, &mut self.writes),
            Access::Write => (&mut self.writes, &mut self.reads),
        };
        if !open.entry(file.clone()).or_default().insert(process_id.clone()) {
            // Inside a run the artifact already went out with the run's first edge.
            if let Some(held) = self.held.get_mut(&file) {
                held.retain(|v| !describes(v, artifact));
                if held.is_empty() {
                    self.held.remove(&file);
                }
            }
            tracing::debug!(
                file,
                process = %process_id.short(),
                "Suppressing access inside open run"
            );
            return;
        }
        if let Some(runs) = opposite.get_mut(&file) {
            runs.remove(&process_id);
        }

        for vertex in self.held.remove(&file).unwrap_or_default() {
            out.vertex(vertex);
        }
        out.edge(edge);
    }
}

/// Whether `held` is `endpoint`, possibly with extra annotations added upstream.
fn describes(held: &Vertex, endpoint: &Vertex) -> bool {
    held.kind() == endpoint.kind()
        && endpoint
            .annotations()
            .iter()
            .all(|(k, v)| held.get(k) == Some(v))
}

impl Filter for IoRuns {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn put_vertex(&mut self, vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
        if vertex.kind() == VertexKind::Artifact && vertex.get(&self.key).is_some() {
            let key = self.artifact_key(&vertex);
            self.held.entry(key).or_default().push(vertex);
        } else {
            out.vertex(vertex);
        }
        Ok(())
    }

    fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
        match edge.kind() {
            EdgeKind::Used => self.access(edge, Access::Read, out),
            EdgeKind::WasGeneratedBy => self.access(edge, Access::Write, out),
            _ => out.edge(edge),
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Forward) -> Result<(), CoreError> {
        let mut held: Vec<(String, Vec<Vertex>)> = self.held.drain().collect();
        held.sort_by(|a, b| a.0.cmp(&b.0));
        for vertex in held.into_iter().flat_map(|(_, vertices)| vertices) {
            out.vertex(vertex);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::*;
    use crate::model::Element;

    fn edges(out: &[Element]) -> Vec<&Edge> {
        out.iter()
            .filter_map(|e| match e {
                Element::Edge(e) => Some(e),
                Element::Vertex(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_read_run_collapses_then_write_reopens() {
        let (p, f) = (process("1"), artifact("/tmp/log"));
        let mut filter = IoRuns::new();
        let read = |t: &str| -> Element {
            Edge::used(p.clone(), f.clone()).unwrap().with("time", t).into()
        };
        let out = run(&mut filter, vec![read("1"), read("2"), read("3")]);
        assert_eq!(edges(&out).len(), 1);

        let write = Edge::was_generated_by(f.clone(), p.clone()).unwrap();
        let out = run(&mut filter, vec![write.into()]);
        assert_eq!(edges(&out).len(), 1);

        // the write closed the read run, so the next read is forwarded again
        let out = run(&mut filter, vec![read("4")]);
        assert_eq!(edges(&out).len(), 1);
    }

    #[test]
    fn test_other_processes_have_own_runs() {
        let f = artifact("/tmp/log");
        let mut filter = IoRuns::new();
        let out = run(
            &mut filter,
            vec![
                Edge::used(process("1"), f.clone()).unwrap().into(),
                Edge::used(process("2"), f.clone()).unwrap().into(),
                Edge::used(process("1"), f).unwrap().into(),
            ],
        );
        assert_eq!(edges(&out).len(), 2);
    }

    #[test]
    fn test_artifact_vertex_released_with_first_edge() {
        let (p, f) = (process("1"), artifact("/tmp/log"));
        let mut filter = IoRuns::new();
        let out = run(&mut filter, vec![f.clone().into()]);
        assert!(out.is_empty());

        let out = run(&mut filter, vec![Edge::used(p, f.clone()).unwrap().into()]);
        assert_eq!(out[0], Element::Vertex(f));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_flush_releases_unreferenced_artifacts() {
        let mut filter = IoRuns::new();
        run(&mut filter, vec![artifact("/orphan").into()]);
        let mut out = Forward::default();
        filter.flush(&mut out).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_unkeyed_artifacts_fall_back_to_identity() {
        let mut filter = IoRuns::with_key("location");
        let p = process("1");
        let a = Vertex::artifact().with("path", "/a");
        let b = Vertex::artifact().with("path", "/b");
        let out = run(
            &mut filter,
            vec![
                Edge::used(p.clone(), a).unwrap().into(),
                Edge::used(p, b).unwrap().into(),
            ],
        );
        assert_eq!(edges(&out).len(), 2);
    }

    #[test]
    fn test_stamped_artifact_released_by_unstamped_endpoint() {
        let (p, f) = (process("1"), artifact("/tmp/log"));
        let mut filter = IoRuns::new();
        let stamped = f.clone().with("source", "jsonl");
        assert!(run(&mut filter, vec![stamped.clone().into()]).is_empty());

        let read = Edge::used(p.clone(), f.clone()).unwrap();
        let out = run(&mut filter, vec![read.clone().into()]);
        assert_eq!(out, vec![Element::Vertex(stamped.clone()), Element::Edge(read)]);
        assert!(filter.held.is_empty());

        // a re-sent copy inside the open run is dropped, not kept until flush
        run(&mut filter, vec![stamped.into()]);
        assert_eq!(edges(&run(&mut filter, vec![Edge::used(p, f).unwrap().into()])).len(), 0);
        assert!(filter.held.is_empty());
    }

    #[test]
    fn test_other_edge_kinds_pass() {
        let mut filter = IoRuns::new();
        let e = Edge::was_triggered_by(process("1"), process("2")).unwrap();
        assert_eq!(run(&mut filter, vec![e.clone().into(), e.into()]).len(), 2);
    }
}
