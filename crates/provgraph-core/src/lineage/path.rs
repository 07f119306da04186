use std::collections::{HashMap, HashSet, VecDeque};

use super::model::Subgraph;
use crate::error::CoreError;
use crate::model::{Direction, Edge, EdgeId, Vertex, VertexId};
use crate::storage::QueryStore;

/// Hop counts from a root, plus every edge crossed while counting.
struct Reach {
    distance: HashMap<VertexId, u32>,
    edges: Vec<Edge>,
}

fn reach<S: QueryStore + ?Sized>(
    store: &S,
    root: &Vertex,
    direction: Direction,
    max_depth: u32,
) -> Result<Reach, CoreError> {
    let mut distance = HashMap::from([(root.id(), 0)]);
    let mut edges = Vec::new();
    let mut queue = VecDeque::from([(root.clone(), 0u32)]);
    while let Some((vertex, depth)) = queue.pop_front() {
        if depth == max_depth {
            continue;
        }
        for edge in store.adjacent_edges(&vertex, direction)? {
            let far = edge.far_end(direction).clone();
            if !distance.contains_key(&far.id()) {
                distance.insert(far.id(), depth + 1);
                queue.push_back((far, depth + 1));
            }
            edges.push(edge);
        }
    }
    Ok(Reach { distance, edges })
}

/// Every vertex and edge lying on a walk of at most `max_depth` edges from `from` to `to`,
/// following edges from source to destination. Empty when there is no such walk.
pub fn link<S: QueryStore + ?Sized>(
    store: &S,
    from: &Vertex,
    to: &Vertex,
    max_depth: u32,
) -> Result<Subgraph, CoreError> {
    let forward = reach(store, from, Direction::Descendants, max_depth)?;
    let backward = reach(store, to, Direction::Ancestors, max_depth)?;

    let mut graph = Subgraph::new();
    if from == to {
        graph.add_vertex(from.clone());
    }
    let mut kept: HashSet<EdgeId> = HashSet::new();
    for edge in forward.edges {
        let before = forward.distance.get(&edge.source().id());
        let after = backward.distance.get(&edge.destination().id());
        let (Some(before), Some(after)) = (before, after) else {
            continue;
        };
        if before + 1 + after > max_depth || !kept.insert(edge.id()) {
            continue;
        }
        graph.add_vertex(edge.source().clone());
        graph.add_vertex(edge.destination().clone());
        graph.add_edge(edge);
    }
    tracing::debug!(
        vertices = graph.vertices.len(),
        edges = graph.edges.len(),
        "Link query finished"
    );
    Ok(graph)
}

/// One shortest walk from `from` to `to`, at most `max_depth` edges long, following edges
/// from source to destination. Ties go to the edge with the smaller id.
pub fn shortest_path<S: QueryStore + ?Sized>(
    store: &S,
    from: &Vertex,
    to: &Vertex,
    max_depth: u32,
) -> Result<Option<Subgraph>, CoreError> {
    let target = to.id();
    let mut via: HashMap<VertexId, Edge> = HashMap::new();
    let mut visited = HashSet::from([from.id()]);
    let mut queue = VecDeque::from([(from.clone(), 0u32)]);

    let mut found = from.id() == target;
    'search: while let Some((vertex, depth)) = queue.pop_front() {
        if found {
            break;
        }
        if depth == max_depth {
            continue;
        }
        for edge in store.adjacent_edges(&vertex, Direction::Descendants)? {
            let far = edge.destination().clone();
            let far_id = far.id();
            if !visited.insert(far_id.clone()) {
                continue;
            }
            via.insert(far_id.clone(), edge);
            if far_id == target {
                found = true;
                break 'search;
            }
            queue.push_back((far, depth + 1));
        }
    }
    if !found {
        return Ok(None);
    }

    let mut graph = Subgraph::new();
    graph.add_vertex(to.clone());
    let mut cursor = target;
    while let Some(edge) = via.remove(&cursor) {
        cursor = edge.source().id();
        graph.add_vertex(edge.source().clone());
        graph.add_edge(edge);
    }
    Ok(Some(graph))
}
