use std::collections::{HashMap, HashSet};

use super::{Filter, Forward};
use crate::error::CoreError;
use crate::model::{Edge, VertexId};

/// Suppresses an edge whose (source, destination) pair was already forwarded.
///
/// Only the direct predecessor set of each destination is kept, so edges implied by
/// longer paths still pass. See [`super::GraphFinesse`] for that.
#[derive(Debug, Default)]
pub struct CycleAvoidance {
    predecessors: HashMap<VertexId, HashSet<VertexId>>,
}

impl CycleAvoidance {
    pub const NAME: &'static str = "cycle-avoidance";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for CycleAvoidance {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
        let src = edge.source().id();
        let dst = edge.destination().id();
        if !self.predecessors.entry(dst).or_default().insert(src) {
            tracing::debug!(edge = %edge.id().short(), "Suppressing repeated direct edge");
            return Ok(());
        }
        out.edge(edge);
        Ok(())
    }
}
