use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared between the dispatch thread and admin handles.
#[derive(Debug, Default)]
pub struct KernelStats {
    vertices_received: AtomicU64,
    edges_received: AtomicU64,
    vertices_forwarded: AtomicU64,
    edges_forwarded: AtomicU64,
    sink_failures: AtomicU64,
    element_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub vertices_received: u64,
    pub edges_received: u64,
    pub vertices_forwarded: u64,
    pub edges_forwarded: u64,
    pub sink_failures: u64,
    pub element_errors: u64,
}

impl KernelStats {
    pub fn record_vertex_received(&self) {
        self.vertices_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_edge_received(&self) {
        self.edges_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vertex_forwarded(&self) {
        self.vertices_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_edge_forwarded(&self) {
        self.edges_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_element_error(&self) {
        self.element_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            vertices_received: self.vertices_received.load(Ordering::Relaxed),
            edges_received: self.edges_received.load(Ordering::Relaxed),
            vertices_forwarded: self.vertices_forwarded.load(Ordering::Relaxed),
            edges_forwarded: self.edges_forwarded.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            element_errors: self.element_errors.load(Ordering::Relaxed),
        }
    }
}
