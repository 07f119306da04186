use std::collections::BTreeMap;

use super::{parse_args, Filter, Forward};
use crate::error::CoreError;
use crate::model::{Edge, EdgeKind, Vertex};

pub const START_TIME_KEY: &str = "starttime";
pub const END_TIME_KEY: &str = "endtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// Open runs on one file. Only the runs of `current` can be non-empty.
#[derive(Debug, Default)]
struct FileRuns {
    current: Option<Direction>,
    reads: Vec<(String, Edge)>,
    writes: Vec<(String, Edge)>,
}

impl FileRuns {
    fn runs_mut(&mut self, direction: Direction) -> &mut Vec<(String, Edge)> {
        match direction {
            Direction::Read => &mut self.reads,
            Direction::Write => &mut self.writes,
        }
    }
}

/// Merges consecutive same-direction accesses into one edge per (file, process) carrying
/// `starttime`/`endtime`.
///
/// Access edges are held while their run is open. When a file switches direction every run
/// of the old direction is emitted, in the order the runs were opened.
#[derive(Debug)]
pub struct ReadWriteCoalescer {
    file_key: String,
    process_key: String,
    time_key: String,
    files: BTreeMap<String, FileRuns>,
}

impl Default for ReadWriteCoalescer {
    fn default() -> Self {
        Self {
            file_key: "path".into(),
            process_key: "pid".into(),
            time_key: "time".into(),
            files: BTreeMap::new(),
        }
    }
}

impl ReadWriteCoalescer {
    pub const NAME: &'static str = "read-write";

    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `key=`, `process_key=` and `time_key=`.
    pub fn from_args(args: &str) -> Result<Self, CoreError> {
        let mut filter = Self::new();
        for (key, value) in parse_args(args) {
            if value.is_empty() {
                return Err(CoreError::Config(format!("read-write argument '{key}' needs a value")));
            }
            match key.as_str() {
                "key" => filter.file_key = value,
                "process_key" => filter.process_key = value,
                "time_key" => filter.time_key = value,
                other => {
                    return Err(CoreError::Config(format!(
                        "unknown read-write argument '{other}'"
                    )))
                }
            }
        }
        Ok(filter)
    }

    /// Number of runs currently held open.
    pub fn open_runs(&self) -> usize {
        self.files.values().map(|f| f.reads.len() + f.writes.len()).sum()
    }

    fn label(vertex: &Vertex, key: &str) -> String {
        vertex
            .get(key)
            .map(str::to_string)
            .unwrap_or_else(|| vertex.id().to_string())
    }

    fn access(&mut self, mut edge: Edge, direction: Direction, out: &mut Forward) {
        let (artifact, process) = match direction {
            Direction::Read => (edge.destination(), edge.source()),
            Direction::Write => (edge.source(), edge.destination()),
        };
        let file = Self::label(artifact, &self.file_key);
        let pid = Self::label(process, &self.process_key);
        let time = edge
            .get(&self.time_key)
            .or_else(|| artifact.get(&self.time_key))
            .map(str::to_string);

        let state = self.files.entry(file).or_default();
        match state.current {
            Some(current) if current == direction => {}
            Some(previous) => {
                for (_, run) in state.runs_mut(previous).drain(..) {
                    out.edge(run);
                }
                state.current = Some(direction);
            }
            None => state.current = Some(direction),
        }

        let runs = state.runs_mut(direction);
        if let Some((_, open)) = runs.iter_mut().find(|(p, _)| *p == pid) {
            if let Some(t) = time {
                open.annotate(END_TIME_KEY, t);
            }
            tracing::debug!(pid, "Extending open run");
            return;
        }
        if let Some(t) = time {
            edge.annotate(START_TIME_KEY, t);
        }
        runs.push((pid, edge));
    }
}

impl Filter for ReadWriteCoalescer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
        match edge.kind() {
            EdgeKind::Used => self.access(edge, Direction::Read, out),
            EdgeKind::WasGeneratedBy => self.access(edge, Direction::Write, out),
            _ => out.edge(edge),
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Forward) -> Result<(), CoreError> {
        for (_, state) in std::mem::take(&mut self.files) {
            for (_, run) in state.reads.into_iter().chain(state.writes) {
                out.edge(run);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::testing::*;
    use crate::model::Element;

    fn read(pid: &str, time: &str) -> Element {
        Edge::used(process(pid), artifact("/data"))
            .unwrap()
            .with("time", time)
            .into()
    }

    fn write(pid: &str, time: &str) -> Element {
        Edge::was_generated_by(artifact("/data"), process(pid))
            .unwrap()
            .with("time", time)
            .into()
    }

    fn only_edge(out: &[Element]) -> &Edge {
        assert_eq!(out.len(), 1, "expected one element, got {out:?}");
        match &out[0] {
            Element::Edge(e) => e,
            other => panic!("expected edge, got {other:?}"),
        }
    }

    #[test]
    fn test_first_access_opens_run_without_output() {
        let mut filter = ReadWriteCoalescer::new();
        assert!(run(&mut filter, vec![read("1", "10")]).is_empty());
        assert_eq!(filter.open_runs(), 1);
    }

    #[test]
    fn test_reversal_flushes_opposite_runs_with_times() {
        let mut filter = ReadWriteCoalescer::new();
        let out = run(
            &mut filter,
            vec![read("1", "10"), read("1", "11"), read("1", "12"), write("2", "13")],
        );
        let merged = only_edge(&out);
        assert_eq!(merged.kind(), EdgeKind::Used);
        assert_eq!(merged.get(START_TIME_KEY), Some("10"));
        assert_eq!(merged.get(END_TIME_KEY), Some("12"));
        assert_eq!(filter.open_runs(), 1);
    }

    #[test]
    fn test_one_edge_per_process_in_open_order() {
        let mut filter = ReadWriteCoalescer::new();
        let out = run(
            &mut filter,
            vec![read("2", "1"), read("1", "2"), read("2", "3"), write("3", "4")],
        );
        let pids: Vec<_> = out
            .iter()
            .map(|e| match e {
                Element::Edge(e) => e.source().get("pid").unwrap_or_default().to_string(),
                Element::Vertex(_) => String::new(),
            })
            .collect();
        assert_eq!(pids, vec!["2", "1"]);
    }

    #[test]
    fn test_time_falls_back_to_artifact() {
        let mut filter = ReadWriteCoalescer::new();
        let file = artifact("/data").with("time", "99");
        let e = Edge::used(process("1"), file).unwrap();
        run(&mut filter, vec![e.into()]);
        let mut out = Forward::default();
        filter.flush(&mut out).unwrap();
        let out = out.into_elements();
        assert_eq!(only_edge(&out).get(START_TIME_KEY), Some("99"));
    }

    #[test]
    fn test_flush_emits_open_runs() {
        let mut filter = ReadWriteCoalescer::new();
        run(&mut filter, vec![write("1", "5"), write("2", "6")]);
        let mut out = Forward::default();
        filter.flush(&mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(filter.open_runs(), 0);
    }

    #[test]
    fn test_vertices_and_other_edges_pass() {
        let mut filter = ReadWriteCoalescer::new();
        let e = Edge::was_controlled_by(process("1"), crate::model::Vertex::agent()).unwrap();
        let out = run(&mut filter, vec![process("1").into(), e.into()]);
        assert_eq!(out.len(), 2);
    }
}
