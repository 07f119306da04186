use std::collections::HashSet;

use super::model::{Bound, LineageGraph, LineageRequest, Subgraph};
use crate::error::CoreError;
use crate::model::{Direction, Vertex, VertexId};
use crate::predicate::Predicate;
use crate::storage::QueryStore;

/// Resolve the request's source predicate to a root vertex and walk from it.
///
/// Fails with [`CoreError::NotFound`] when nothing matches. When several vertices match,
/// the one with the smallest id is used.
pub fn traverse<S: QueryStore + ?Sized>(
    store: &S,
    request: &LineageRequest,
) -> Result<LineageGraph, CoreError> {
    let root = resolve(store, &request.source)?;
    walk(store, root, &request.bound, request.direction, request.include_terminating)
}

/// The single vertex a query starts from: the matching vertex with the smallest id.
pub fn resolve<S: QueryStore + ?Sized>(
    store: &S,
    predicate: &Predicate,
) -> Result<Vertex, CoreError> {
    let mut matches: Vec<Vertex> = store.get_vertices(predicate)?.into_iter().collect();
    if matches.is_empty() {
        return Err(CoreError::NotFound(format!("no vertex matches '{predicate}'")));
    }
    matches.sort_by_cached_key(Vertex::id);
    if matches.len() > 1 {
        tracing::warn!(
            candidates = matches.len(),
            "Query source '{predicate}' is ambiguous, using {}",
            matches[0].id().short()
        );
    }
    Ok(matches.swap_remove(0))
}

/// Breadth-first walk from an already resolved root.
pub fn walk<S: QueryStore + ?Sized>(
    store: &S,
    root: Vertex,
    bound: &Bound,
    direction: Direction,
    include_terminating: bool,
) -> Result<LineageGraph, CoreError> {
    let mut graph = Subgraph::new();
    let mut visited: HashSet<VertexId> = HashSet::new();
    visited.insert(root.id());
    graph.add_vertex(root.clone());

    let mut frontier = vec![root.clone()];
    let mut remaining = match bound {
        Bound::Depth(depth) => Some(*depth),
        Bound::Prune(_) => None,
    };

    while !frontier.is_empty() && remaining != Some(0) {
        let mut next = Vec::new();
        for vertex in &frontier {
            for edge in store.adjacent_edges(vertex, direction)? {
                let far = edge.far_end(direction).clone();
                let far_id = far.id();

                if let Bound::Prune(stop) = bound {
                    if stop.matches(far.annotations()) {
                        if include_terminating {
                            visited.insert(far_id);
                            graph.add_vertex(far);
                            graph.add_edge(edge);
                        }
                        continue;
                    }
                }

                graph.add_edge(edge);
                if visited.insert(far_id) {
                    graph.add_vertex(far.clone());
                    next.push(far);
                }
            }
        }
        frontier = next;
        if let Some(r) = remaining.as_mut() {
            *r -= 1;
        }
    }

    tracing::debug!(
        vertices = graph.vertices.len(),
        edges = graph.edges.len(),
        "Lineage walk finished"
    );
    Ok(LineageGraph { root, direction, graph })
}
