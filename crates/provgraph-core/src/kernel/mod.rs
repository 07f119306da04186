//! The dispatch loop and its admin surface.
//!
//! [`Kernel::start`] spawns one dispatch thread that owns the sources, the filter chain and
//! the sinks. [`KernelHandle`] sends it commands; each command is applied between two
//! round-robin passes over the source buffers.

mod dispatch;
pub mod handle;
pub mod registry;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;

pub use handle::{Kernel, KernelHandle};
pub use registry::Registry;
pub use stats::{KernelStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sources,
    Filters,
    Sinks,
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" | "sources" => Ok(Category::Sources),
            "filter" | "filters" => Ok(Category::Filters),
            "sink" | "sinks" | "storage" | "storages" => Ok(Category::Sinks),
            other => Err(CoreError::Parse(format!("unknown category: {other}"))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Sources => "sources",
            Category::Filters => "filters",
            Category::Sinks => "sinks",
        })
    }
}

/// One attached component, as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Chain index for filters, attach order otherwise.
    pub position: usize,
    pub name: String,
    pub type_name: String,
    pub attached_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;
    use std::time::Duration;

    use super::*;
    use crate::buffer::Buffer;
    use crate::config::{ComponentSpec, KernelConfig};
    use crate::filter::{Filter, Forward};
    use crate::model::{Edge, Element, Vertex};
    use crate::predicate::Predicate;
    use crate::source::Source;
    use crate::storage::{MemoryStore, QueryStore, Sink};

    fn config() -> KernelConfig {
        KernelConfig {
            idle_wait_ms: 5,
            ..KernelConfig::default()
        }
    }

    /// Pushes a fixed list of elements, optionally leaving the buffer open.
    struct Scripted {
        elements: Vec<Element>,
        close_when_done: bool,
        shutdowns: Arc<Mutex<u32>>,
    }

    impl Scripted {
        fn new(elements: Vec<Element>, close_when_done: bool) -> Self {
            Self {
                elements,
                close_when_done,
                shutdowns: Arc::default(),
            }
        }
    }

    impl Source for Scripted {
        fn initialize(&mut self, buffer: Arc<Buffer>) -> Result<(), CoreError> {
            for el in self.elements.drain(..) {
                buffer.put(el);
            }
            if self.close_when_done {
                buffer.close();
            }
            Ok(())
        }

        fn is_finished(&self) -> bool {
            true
        }

        fn shutdown(&mut self) -> Result<(), CoreError> {
            *self.shutdowns.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Produces nothing until stopped, then puts its final elements and closes.
    struct FlushOnStop {
        last: Vec<Element>,
        stop: Arc<AtomicBool>,
        worker: Option<JoinHandle<()>>,
    }

    impl FlushOnStop {
        fn new(last: Vec<Element>) -> Self {
            Self {
                last,
                stop: Arc::default(),
                worker: None,
            }
        }
    }

    impl Source for FlushOnStop {
        fn initialize(&mut self, buffer: Arc<Buffer>) -> Result<(), CoreError> {
            let last = std::mem::take(&mut self.last);
            let stop = Arc::clone(&self.stop);
            self.worker = Some(std::thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(2));
                }
                for el in last {
                    assert!(buffer.put(el));
                }
                buffer.close();
            }));
            Ok(())
        }

        fn stop(&mut self) {
            self.stop.store(true, Ordering::Release);
        }

        fn shutdown(&mut self) -> Result<(), CoreError> {
            if let Some(worker) = self.worker.take() {
                worker.join().unwrap();
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingSink {
        store: MemoryStore,
        shutdowns: Arc<Mutex<u32>>,
    }

    impl Sink for CountingSink {
        fn put_vertex(&mut self, vertex: &Vertex) -> Result<bool, CoreError> {
            self.store.put_vertex(vertex)
        }

        fn put_edge(&mut self, edge: &Edge) -> Result<bool, CoreError> {
            self.store.put_edge(edge)
        }

        fn commit(&mut self) -> Result<(), CoreError> {
            self.store.commit()
        }

        fn shutdown(&mut self) -> Result<(), CoreError> {
            *self.shutdowns.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn chain_elements(n: usize) -> Vec<Element> {
        let p: Vec<Vertex> = (0..n).map(|i| Vertex::process().with("pid", i.to_string())).collect();
        let mut out: Vec<Element> = p.iter().cloned().map(Into::into).collect();
        for w in p.windows(2) {
            out.push(Edge::was_triggered_by(w[0].clone(), w[1].clone()).unwrap().into());
        }
        out
    }

    #[test]
    fn test_shutdown_drains_every_source_and_closes_sinks_once() {
        let kernel = Kernel::start(config(), Registry::with_builtins()).unwrap();
        let sink = CountingSink::default();
        let other = CountingSink::default();
        kernel.attach_sink("counting", Box::new(sink.clone())).unwrap();
        kernel.attach_sink("counting", Box::new(other.clone())).unwrap();

        // left open: only shutdown closes it
        let open = Scripted::new(chain_elements(20), false);
        let open_shutdowns = Arc::clone(&open.shutdowns);
        kernel.attach_source("scripted", Box::new(open)).unwrap();
        kernel.attach_source("scripted", Box::new(Scripted::new(chain_elements(5), true))).unwrap();

        let stats = kernel.shutdown().unwrap();
        assert_eq!(stats.vertices_received, 25);
        assert_eq!(stats.edges_received, 23);
        assert_eq!(*sink.shutdowns.lock().unwrap(), 1);
        assert_eq!(*other.shutdowns.lock().unwrap(), 1);
        assert_eq!(*open_shutdowns.lock().unwrap(), 1);
        assert_eq!(sink.store.counts(), (20, 19));

        kernel.shutdown().unwrap();
        assert_eq!(*sink.shutdowns.lock().unwrap(), 1);
    }

    #[test]
    fn test_source_annotation_stripped_before_sinks() {
        let kernel = Kernel::start(config(), Registry::new()).unwrap();
        let sink = CountingSink::default();
        kernel.attach_sink("counting", Box::new(sink.clone())).unwrap();
        let v = Vertex::agent().with("uid", "0");
        kernel
            .attach_source("scripted", Box::new(Scripted::new(vec![v.clone().into()], true)))
            .unwrap();
        kernel.await_idle().unwrap();
        kernel.shutdown().unwrap();
        let stored = sink.store.get_vertices(&Predicate::Any).unwrap();
        assert!(stored.contains(&v));
        assert!(stored.iter().all(|v| v.get("source").is_none()));
    }

    struct SeenSources(Arc<Mutex<Vec<String>>>);

    impl Filter for SeenSources {
        fn name(&self) -> &str {
            "seen-sources"
        }

        fn put_vertex(&mut self, vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
            self.0.lock().unwrap().push(vertex.get("source").unwrap_or_default().to_string());
            out.vertex(vertex);
            Ok(())
        }

        fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
            out.edge(edge);
            Ok(())
        }
    }

    #[test]
    fn test_round_robin_and_source_stamp() {
        let kernel = Kernel::start(config(), Registry::new()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        kernel.insert_filter(0, Box::new(SeenSources(Arc::clone(&seen)))).unwrap();

        let batch = |prefix: &str| -> Vec<Element> {
            (0..3)
                .map(|i| Vertex::process().with("pid", format!("{prefix}{i}")).into())
                .collect()
        };
        let (a, b) = (batch("a"), batch("b"));
        let first = kernel.attach_source("s", Box::new(Scripted::new(a, true))).unwrap();
        let second = kernel.attach_source("s", Box::new(Scripted::new(b, true))).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("s", "s-2"));
        kernel.await_idle().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().filter(|s| *s == "s").count(), 3);
        assert_eq!(seen.iter().filter(|s| *s == "s-2").count(), 3);
    }

    #[test]
    fn test_admin_errors_change_nothing() {
        let kernel = Kernel::start(config(), Registry::with_builtins()).unwrap();
        assert!(matches!(kernel.add_filter("nope", 0, ""), Err(CoreError::Registry { .. })));
        assert!(matches!(
            kernel.add_filter("graph-finesse", 3, ""),
            Err(CoreError::BadIndex { index: 3, len: 0 })
        ));
        assert!(matches!(kernel.remove_filter(0), Err(CoreError::BadIndex { .. })));
        assert!(matches!(kernel.remove_source("ghost"), Err(CoreError::NotFound(_))));
        assert!(matches!(kernel.remove_sink("ghost"), Err(CoreError::NotFound(_))));
        assert!(kernel.list(Category::Filters).unwrap().is_empty());
    }

    #[test]
    fn test_filter_insert_remove_and_list() {
        let kernel = Kernel::start(config(), Registry::with_builtins()).unwrap();
        kernel.add_filter("graph-finesse", 0, "").unwrap();
        kernel.add_filter("cycle-avoidance", 0, "").unwrap();
        kernel.add_filter("io-runs", 2, "").unwrap();
        let names: Vec<String> = kernel
            .list(Category::Filters)
            .unwrap()
            .into_iter()
            .map(|l| l.type_name)
            .collect();
        assert_eq!(names, vec!["cycle-avoidance", "graph-finesse", "io-runs"]);
        assert_eq!(kernel.remove_filter(1).unwrap(), "graph-finesse");
        assert_eq!(kernel.list(Category::Filters).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_source_waits_for_drain() {
        let kernel = Kernel::start(config(), Registry::new()).unwrap();
        let sink = CountingSink::default();
        kernel.attach_sink("counting", Box::new(sink.clone())).unwrap();
        let source = Scripted::new(chain_elements(50), false);
        let shutdowns = Arc::clone(&source.shutdowns);
        let name = kernel.attach_source("scripted", Box::new(source)).unwrap();

        kernel.remove_source(&name).unwrap();
        assert_eq!(*shutdowns.lock().unwrap(), 1);
        assert_eq!(kernel.stats().vertices_received, 50);
        assert!(kernel.list(Category::Sources).unwrap().is_empty());
        kernel.remove_sink("counting").unwrap();
        assert_eq!(*sink.shutdowns.lock().unwrap(), 1);
        assert_eq!(sink.store.counts(), (50, 49));
    }

    #[test]
    fn test_elements_put_after_stop_are_delivered() {
        let kernel = Kernel::start(config(), Registry::new()).unwrap();
        let sink = CountingSink::default();
        kernel.attach_sink("counting", Box::new(sink.clone())).unwrap();
        let name = kernel
            .attach_source("late", Box::new(FlushOnStop::new(chain_elements(3))))
            .unwrap();
        kernel.remove_source(&name).unwrap();
        assert_eq!(kernel.stats().vertices_received, 3);
        assert_eq!(kernel.stats().edges_received, 2);

        kernel
            .attach_source("late", Box::new(FlushOnStop::new(chain_elements(4))))
            .unwrap();
        let stats = kernel.shutdown().unwrap();
        assert_eq!(stats.vertices_received, 7);
        assert_eq!(sink.store.counts(), (4, 3));
    }

    #[test]
    fn test_io_runs_releases_stamped_artifact_with_first_edge() {
        let kernel = Kernel::start(config(), Registry::with_builtins()).unwrap();
        kernel.add_filter("io-runs", 0, "").unwrap();
        let p = Vertex::process().with("pid", "1");
        let f = Vertex::artifact().with("path", "/tmp/log");
        let read = Edge::used(p.clone(), f.clone()).unwrap();
        let elements = vec![p.into(), f.into(), read.clone().into(), read.with("n", "2").into()];
        kernel.attach_source("scripted", Box::new(Scripted::new(elements, true))).unwrap();
        kernel.await_idle().unwrap();

        let stats = kernel.stats();
        assert_eq!(stats.vertices_forwarded, 2);
        assert_eq!(stats.edges_forwarded, 1);
        let stats = kernel.shutdown().unwrap();
        assert_eq!(stats.vertices_forwarded, 2);
    }

    #[test]
    fn test_startup_pipeline_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let lines: Vec<String> = chain_elements(4)
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect();
        std::fs::write(&path, lines.join("\n")).unwrap();

        let mut cfg = config();
        cfg.filters = vec![
            ComponentSpec::new("cycle-avoidance", ""),
            ComponentSpec::new("graph-finesse", ""),
        ];
        cfg.sinks = vec![ComponentSpec::new("memory", "")];
        cfg.sources = vec![ComponentSpec::new("jsonl", format!("path={}", path.display()))];
        let kernel = Kernel::start(cfg, Registry::with_builtins()).unwrap();
        kernel.await_idle().unwrap();
        let stats = kernel.shutdown().unwrap();
        assert_eq!(stats.vertices_received, 4);
        assert_eq!(stats.edges_forwarded, 3);
    }

    #[test]
    fn test_bad_startup_pipeline_fails() {
        let mut cfg = config();
        cfg.filters = vec![ComponentSpec::new("no-such-filter", "")];
        assert!(matches!(
            Kernel::start(cfg, Registry::with_builtins()),
            Err(CoreError::Registry { .. })
        ));
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("sources".parse::<Category>().unwrap(), Category::Sources);
        assert_eq!("storage".parse::<Category>().unwrap(), Category::Sinks);
        assert!("widgets".parse::<Category>().is_err());
    }
}
