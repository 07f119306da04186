use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::kernel::stats::KernelStats;
use crate::model::Element;
use crate::storage::Sink;

pub(crate) struct SinkSlot {
    pub name: String,
    pub type_name: String,
    pub attached_at: DateTime<Utc>,
    sink: Box<dyn Sink>,
}

/// Terminal stage: strips pipeline bookkeeping and hands each element to every sink in
/// registration order. A failing sink is logged and skipped.
pub struct FinalCommitFilter {
    strip_key: String,
    sinks: Vec<SinkSlot>,
    stats: Arc<KernelStats>,
}

impl FinalCommitFilter {
    pub fn new(strip_key: impl Into<String>, stats: Arc<KernelStats>) -> Self {
        Self {
            strip_key: strip_key.into(),
            sinks: Vec::new(),
            stats,
        }
    }

    pub fn attach(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        sink: Box<dyn Sink>,
    ) {
        self.sinks.push(SinkSlot {
            name: name.into(),
            type_name: type_name.into(),
            attached_at: Utc::now(),
            sink,
        });
    }

    pub fn detach(&mut self, name: &str) -> Option<Box<dyn Sink>> {
        let pos = self.sinks.iter().position(|s| s.name == name)?;
        Some(self.sinks.remove(pos).sink)
    }

    pub fn stats(&self) -> &KernelStats {
        &self.stats
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sinks.iter().any(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = &SinkSlot> {
        self.sinks.iter()
    }

    pub fn deliver(&mut self, mut element: Element) {
        element.remove_annotation(&self.strip_key);
        match &element {
            Element::Vertex(_) => self.stats.record_vertex_forwarded(),
            Element::Edge(_) => self.stats.record_edge_forwarded(),
        }
        for slot in &mut self.sinks {
            let sink = &mut slot.sink;
            let result = catch_unwind(AssertUnwindSafe(|| match &element {
                Element::Vertex(v) => sink.put_vertex(v),
                Element::Edge(e) => sink.put_edge(e),
            }));
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.stats.record_sink_failure();
                    tracing::warn!(sink = %slot.name, "Sink rejected element: {e}");
                }
                Err(_) => {
                    self.stats.record_sink_failure();
                    tracing::error!(sink = %slot.name, "Sink panicked while storing element");
                }
            }
        }
    }

    /// Commit then shut down one sink. Every error is logged; the sink is consumed.
    pub(crate) fn close_sink(name: &str, mut sink: Box<dyn Sink>) -> Result<(), CoreError> {
        if let Err(e) = sink.commit() {
            tracing::warn!(sink = name, "Final commit failed: {e}");
        }
        let result = sink.shutdown();
        match &result {
            Ok(()) => tracing::info!(sink = name, "Sink shut down"),
            Err(e) => tracing::error!(sink = name, "Sink shutdown failed: {e}"),
        }
        result
    }

    /// Detach and close every sink, in registration order.
    pub fn shutdown_all(&mut self) {
        for slot in self.sinks.drain(..) {
            let _ = Self::close_sink(&slot.name, slot.sink);
        }
    }
}
