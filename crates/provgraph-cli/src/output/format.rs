use std::path::Path;

use provgraph_core::kernel::{Category, Listing, StatsSnapshot};
use provgraph_core::lineage::{LineageGraph, PathGraph, Subgraph};
use provgraph_core::model::{Annotations, Edge, Vertex, TYPE_KEY};
use provgraph_query::IndexCounts;

use super::OutputFormat;

fn annotation_text(annotations: &Annotations) -> String {
    annotations
        .sorted()
        .into_iter()
        .filter(|(k, _)| *k != TYPE_KEY)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn vertex_line(v: &Vertex) -> String {
    format!("\u{25c6} {} {} {}", v.id().short(), v.kind(), annotation_text(v.annotations()))
}

fn edge_line(e: &Edge) -> String {
    let extra = annotation_text(e.annotations());
    let mut line = format!(
        "  {} {} {} -> {}",
        e.id().short(),
        e.kind(),
        e.source().label(),
        e.destination().label()
    );
    if !extra.is_empty() {
        line.push_str(&format!("  [{extra}]"));
    }
    line
}

pub fn format_vertices(vertices: &[Vertex], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(vertices).unwrap_or_default(),
        OutputFormat::Text if vertices.is_empty() => "No vertices found.".to_string(),
        OutputFormat::Text => vertices.iter().map(vertex_line).collect::<Vec<_>>().join("\n"),
    }
}

pub fn format_edges(edges: &[Edge], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(edges).unwrap_or_default(),
        OutputFormat::Text if edges.is_empty() => "No edges found.".to_string(),
        OutputFormat::Text => edges.iter().map(edge_line).collect::<Vec<_>>().join("\n"),
    }
}

fn subgraph_text(heading: String, graph: &Subgraph) -> String {
    let mut out = heading;
    for v in graph.sorted_vertices() {
        out.push_str(&vertex_line(v));
        out.push('\n');
    }
    for e in graph.sorted_edges() {
        out.push_str(&edge_line(e));
        out.push('\n');
    }
    out
}

pub fn format_lineage(lineage: &LineageGraph, fmt: OutputFormat) -> String {
    if fmt == OutputFormat::Json {
        return serde_json::to_string_pretty(lineage).unwrap_or_default();
    }
    let heading = format!(
        "Lineage ({}) of {}: {} vertices, {} edges\n",
        lineage.direction,
        lineage.root.label(),
        lineage.vertices().len(),
        lineage.edges().len()
    );
    subgraph_text(heading, &lineage.graph)
}

pub fn format_path(path: &PathGraph, max_depth: u32, fmt: OutputFormat) -> String {
    if fmt == OutputFormat::Json {
        return serde_json::to_string_pretty(path).unwrap_or_default();
    }
    if path.graph.is_empty() {
        return format!(
            "No path from {} to {} within {max_depth} edges.",
            path.from.label(),
            path.to.label()
        );
    }
    let heading = format!(
        "Path from {} to {}: {} vertices, {} edges\n",
        path.from.label(),
        path.to.label(),
        path.graph.vertices.len(),
        path.graph.edges.len()
    );
    subgraph_text(heading, &path.graph)
}

pub fn format_listing(category: Category, listing: &[Listing], fmt: OutputFormat) -> String {
    if fmt == OutputFormat::Json {
        return serde_json::to_string(listing).unwrap_or_default();
    }
    if listing.is_empty() {
        return format!("no {category}");
    }
    listing
        .iter()
        .map(|l| {
            format!(
                "{:>3}  {:<20} {:<16} {}",
                l.position,
                l.name,
                l.type_name,
                l.attached_at.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_kernel_stats(stats: &StatsSnapshot, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(stats).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = format!(
                "Received {} vertices and {} edges; forwarded {} vertices and {} edges",
                stats.vertices_received,
                stats.edges_received,
                stats.vertices_forwarded,
                stats.edges_forwarded
            );
            if stats.sink_failures > 0 || stats.element_errors > 0 {
                out.push_str(&format!(
                    " ({} sink failures, {} element errors)",
                    stats.sink_failures, stats.element_errors
                ));
            }
            out
        }
    }
}

pub fn format_counts(index: &Path, counts: &IndexCounts, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "index": index.display().to_string(),
            "vertices": counts.vertices,
            "edges": counts.edges,
        }))
        .unwrap_or_default(),
        OutputFormat::Text => format!(
            "Graph Index\n===========\nPath:      {}\nVertices:  {}\nEdges:     {}",
            index.display(),
            counts.vertices,
            counts.edges
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_text_omits_type_and_sorts_keys() {
        let v = Vertex::process().with("pid", "9").with("name", "vim");
        let text = format_vertices(&[v], OutputFormat::Text);
        assert!(text.contains("Process name=vim pid=9"));
        assert!(!text.contains("type="));
    }

    #[test]
    fn test_edge_text_uses_labels() {
        let p = Vertex::process().with("name", "cc");
        let a = Vertex::artifact().with("path", "main.c");
        let e = Edge::used(p, a).unwrap().with("time", "3");
        let text = format_edges(&[e], OutputFormat::Text);
        assert!(text.contains("Used name=cc -> path=main.c  [time=3]"));
    }

    #[test]
    fn test_empty_path_text() {
        let path = PathGraph {
            from: Vertex::process().with("pid", "1"),
            to: Vertex::process().with("pid", "2"),
            graph: Subgraph::new(),
        };
        assert_eq!(
            format_path(&path, 3, OutputFormat::Text),
            "No path from pid=1 to pid=2 within 3 edges."
        );
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(format_listing(Category::Sinks, &[], OutputFormat::Text), "no sinks");
    }
}
