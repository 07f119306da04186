use std::collections::HashSet;
use std::num::NonZeroUsize;

use lru::LruCache;

use super::{parse_args, Filter, Forward};
use crate::error::CoreError;
use crate::model::{Edge, VertexId};

/// Online transitive redundancy elimination.
///
/// For every vertex the filter remembers which vertices already reach it through forwarded
/// edges. An edge `v1 -> v2` is suppressed when `v1` is already in that set for `v2`;
/// otherwise it is forwarded and `v2`'s set absorbs `v1` and everything reaching `v1`.
///
/// Reach sets live in an LRU cache. It is unbounded unless built with
/// [`GraphFinesse::with_capacity`]; an evicted set is forgotten, which can only let a
/// redundant edge through, never suppress a needed one.
pub struct GraphFinesse {
    reach: LruCache<VertexId, HashSet<VertexId>>,
}

impl Default for GraphFinesse {
    fn default() -> Self {
        Self {
            reach: LruCache::unbounded(),
        }
    }
}

impl GraphFinesse {
    pub const NAME: &'static str = "graph-finesse";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            reach: LruCache::new(capacity),
        }
    }

    /// Accepts `capacity=N`; anything else is rejected.
    pub fn from_args(args: &str) -> Result<Self, CoreError> {
        let args = parse_args(args);
        let mut filter = Self::new();
        for (key, value) in args {
            match key.as_str() {
                "capacity" => {
                    let n: usize = value.parse().map_err(|_| {
                        CoreError::Config(format!("capacity must be a number, got '{value}'"))
                    })?;
                    let n = NonZeroUsize::new(n).ok_or_else(|| {
                        CoreError::Config("capacity must be greater than zero".into())
                    })?;
                    filter = Self::with_capacity(n);
                }
                other => {
                    return Err(CoreError::Config(format!(
                        "unknown graph-finesse argument '{other}'"
                    )))
                }
            }
        }
        Ok(filter)
    }

    pub fn tracked(&self) -> usize {
        self.reach.len()
    }
}

impl Filter for GraphFinesse {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn put_edge(&mut self, edge: Edge, out: &mut Forward) -> Result<(), CoreError> {
        let v1 = edge.source().id();
        let v2 = edge.destination().id();

        if self.reach.get(&v2).is_some_and(|set| set.contains(&v1)) {
            tracing::debug!(edge = %edge.id().short(), "Suppressing transitively implied edge");
            return Ok(());
        }

        let inherited: Vec<VertexId> = self
            .reach
            .get(&v1)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let set = self.reach.get_or_insert_mut(v2, HashSet::new);
        set.insert(v1);
        set.extend(inherited);

        out.edge(edge);
        Ok(())
    }
}
