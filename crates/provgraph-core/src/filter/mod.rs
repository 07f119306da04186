//! The ordered filter chain every element passes through before reaching sinks.

pub mod cycle_avoidance;
pub mod drop_keys;
pub mod final_commit;
pub mod graph_finesse;
pub mod io_runs;
pub mod read_write;
pub mod version_on_write;

use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{Edge, Element, Vertex};

pub use cycle_avoidance::CycleAvoidance;
pub use drop_keys::DropKeys;
pub use final_commit::FinalCommitFilter;
pub use graph_finesse::GraphFinesse;
pub use io_runs::IoRuns;
pub use read_write::ReadWriteCoalescer;
pub use version_on_write::VersionOnWrite;

/// Collects what a filter passes on to the next stage.
#[derive(Debug, Default)]
pub struct Forward {
    elements: Vec<Element>,
}

impl Forward {
    pub fn vertex(&mut self, vertex: Vertex) {
        self.elements.push(Element::Vertex(vertex));
    }

    pub fn edge(&mut self, edge: Edge) {
        self.elements.push(Element::Edge(edge));
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

/// A pipeline stage. Forwarding nothing suppresses the element.
pub trait Filter: Send {
    /// Registry type name, used in listings.
    fn name(&self) -> &str;

    fn put_vertex(&mut self, vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
        out.vertex(vertex);
        Ok(())
    }

    fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError>;

    /// Emit any held-back state. Called when the filter is removed and at shutdown.
    fn flush(&mut self, _out: &mut Forward) -> Result<(), CoreError> {
        Ok(())
    }
}

struct Stage {
    filter: Box<dyn Filter>,
    attached_at: DateTime<Utc>,
}

/// Filters in order, terminated by the [`FinalCommitFilter`] fan-out to sinks.
pub struct FilterChain {
    filters: Vec<Stage>,
    terminal: FinalCommitFilter,
}

impl FilterChain {
    pub fn new(terminal: FinalCommitFilter) -> Self {
        Self {
            filters: Vec::new(),
            terminal,
        }
    }

    /// Push one element through the head of the chain.
    pub fn put(&mut self, element: Element) {
        self.run_from(0, vec![element]);
    }

    fn run_from(&mut self, start: usize, mut batch: Vec<Element>) {
        for stage in self.filters.iter_mut().skip(start) {
            let filter = &mut stage.filter;
            let mut out = Forward::default();
            for element in batch {
                let result = catch_unwind(AssertUnwindSafe(|| match element {
                    Element::Vertex(v) => filter.put_vertex(v, &mut out),
                    Element::Edge(e) => filter.put_edge(e, &mut out),
                }));
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        self.terminal.stats().record_element_error();
                        tracing::warn!(filter = filter.name(), "Filter rejected element: {e}");
                    }
                    Err(_) => {
                        self.terminal.stats().record_element_error();
                        tracing::error!(filter = filter.name(), "Filter panicked; element dropped");
                    }
                }
            }
            batch = out.into_elements();
            if batch.is_empty() {
                return;
            }
        }
        for element in batch {
            self.terminal.deliver(element);
        }
    }

    /// Insert at `index` (0 = head, `len()` = just before the sinks).
    pub fn insert(&mut self, index: usize, filter: Box<dyn Filter>) -> Result<(), CoreError> {
        if index > self.filters.len() {
            return Err(CoreError::BadIndex {
                index,
                len: self.filters.len(),
            });
        }
        self.filters.insert(
            index,
            Stage {
                filter,
                attached_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Remove the filter at `index`, forwarding whatever it still held to its successor.
    pub fn remove(&mut self, index: usize) -> Result<Box<dyn Filter>, CoreError> {
        if index >= self.filters.len() {
            return Err(CoreError::BadIndex {
                index,
                len: self.filters.len(),
            });
        }
        let mut filter = self.filters.remove(index).filter;
        let mut out = Forward::default();
        if let Err(e) = filter.flush(&mut out) {
            tracing::warn!(filter = filter.name(), "Flush on removal failed: {e}");
        }
        self.run_from(index, out.into_elements());
        Ok(filter)
    }

    /// Flush every filter head to tail; output of stage i continues from stage i + 1.
    pub fn flush_all(&mut self) {
        for i in 0..self.filters.len() {
            let mut out = Forward::default();
            let filter = &mut self.filters[i].filter;
            if let Err(e) = filter.flush(&mut out) {
                tracing::warn!(filter = filter.name(), "Flush failed: {e}");
            }
            self.run_from(i + 1, out.into_elements());
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|s| s.filter.name().to_string()).collect()
    }

    /// (type name, attach time) per stage, head first.
    pub fn stages(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.filters.iter().map(|s| (s.filter.name(), s.attached_at))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn terminal(&self) -> &FinalCommitFilter {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut FinalCommitFilter {
        &mut self.terminal
    }
}

/// Parse `key=value` arguments separated by whitespace. Bare words map to an empty value.
pub fn parse_args(args: &str) -> std::collections::HashMap<String, String> {
    args.split_whitespace()
        .map(|token| match token.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Run a single filter over `elements` and collect everything it forwarded.
    pub fn run(filter: &mut dyn Filter, elements: Vec<Element>) -> Vec<Element> {
        let mut out = Forward::default();
        for element in elements {
            match element {
                Element::Vertex(v) => filter.put_vertex(v, &mut out).unwrap(),
                Element::Edge(e) => filter.put_edge(e, &mut out).unwrap(),
            }
        }
        out.into_elements()
    }

    pub fn process(pid: &str) -> Vertex {
        Vertex::process().with("pid", pid)
    }

    pub fn artifact(path: &str) -> Vertex {
        Vertex::artifact().with("path", path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::testing::*;
    use super::*;
    use crate::kernel::stats::KernelStats;
    use crate::storage::Sink;

    #[derive(Default, Clone)]
    struct Recording(Arc<Mutex<Vec<Element>>>);

    impl Sink for Recording {
        fn put_vertex(&mut self, vertex: &Vertex) -> Result<bool, CoreError> {
            self.0.lock().unwrap().push(Element::Vertex(vertex.clone()));
            Ok(true)
        }

        fn put_edge(&mut self, edge: &Edge) -> Result<bool, CoreError> {
            self.0.lock().unwrap().push(Element::Edge(edge.clone()));
            Ok(true)
        }
    }

    struct Doubler;

    impl Filter for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn put_vertex(&mut self, vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
            out.vertex(vertex.clone().with("copy", "1"));
            out.vertex(vertex);
            Ok(())
        }

        fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
            out.edge(edge);
            Ok(())
        }
    }

    struct Panicky;

    impl Filter for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn put_vertex(&mut self, vertex: Vertex, out: &mut Forward) -> Result<(), CoreError> {
            if vertex.get("pid") == Some("bad") {
                panic!("malformed vertex");
            }
            out.vertex(vertex);
            Ok(())
        }

        fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
            out.edge(edge);
            Ok(())
        }
    }

    fn chain_with_recorder() -> (FilterChain, Recording) {
        let recording = Recording::default();
        let mut terminal = FinalCommitFilter::new("source", Arc::new(KernelStats::default()));
        terminal.attach("rec", "recording", Box::new(recording.clone()));
        (FilterChain::new(terminal), recording)
    }

    #[test]
    fn test_elements_flow_through_in_order() {
        let (mut chain, rec) = chain_with_recorder();
        chain.insert(0, Box::new(Doubler)).unwrap();
        chain.put(Element::Vertex(process("1")));
        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Element::Vertex(process("1").with("copy", "1")));
    }

    #[test]
    fn test_bad_index_changes_nothing() {
        let (mut chain, _) = chain_with_recorder();
        assert!(matches!(
            chain.insert(1, Box::new(Doubler)),
            Err(CoreError::BadIndex { index: 1, len: 0 })
        ));
        assert!(chain.remove(0).is_err());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_insert_and_remove_relink() {
        let (mut chain, _) = chain_with_recorder();
        chain.insert(0, Box::new(CycleAvoidance::default())).unwrap();
        chain.insert(1, Box::new(GraphFinesse::default())).unwrap();
        chain.insert(1, Box::new(Doubler)).unwrap();
        assert_eq!(chain.names(), vec!["cycle-avoidance", "doubler", "graph-finesse"]);
        let removed = chain.remove(1).unwrap();
        assert_eq!(removed.name(), "doubler");
        assert_eq!(chain.names(), vec!["cycle-avoidance", "graph-finesse"]);
    }

    #[test]
    fn test_panicking_filter_does_not_stop_chain() {
        let (mut chain, rec) = chain_with_recorder();
        chain.insert(0, Box::new(Panicky)).unwrap();
        chain.put(Element::Vertex(process("bad")));
        chain.put(Element::Vertex(process("good")));
        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Element::Vertex(process("good"))]);
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args("keys=a,b capacity=10 verbose");
        assert_eq!(args["keys"], "a,b");
        assert_eq!(args["capacity"], "10");
        assert_eq!(args["verbose"], "");
    }
}
