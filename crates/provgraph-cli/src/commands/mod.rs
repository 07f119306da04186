pub mod console;
pub mod edges;
pub mod ingest;
pub mod lineage;
pub mod path;
pub mod run;
pub mod stats;
pub mod vertices;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use provgraph_core::config::{ComponentSpec, KernelConfig};
use provgraph_core::kernel::Registry;
use provgraph_core::predicate::Predicate;
use provgraph_query::{register_index_sink, IndexStore, QueryEngine};

#[derive(Subcommand)]
pub enum Commands {
    /// Start a pipeline and administer it from stdin
    Run(run::RunArgs),
    /// Feed JSON-lines files through a pipeline into the index
    Ingest(ingest::IngestArgs),
    /// List indexed vertices matching a predicate
    Vertices(vertices::VerticesArgs),
    /// List indexed edges matching predicates
    Edges(edges::EdgesArgs),
    /// Extract the lineage of a vertex
    Lineage(lineage::LineageArgs),
    /// Find paths between two vertices
    Path(path::PathArgs),
    /// Show index counts
    Stats,
}

/// Builtin components plus the `index` sink writing to `index`.
pub fn registry(index: &Path, commit_interval: usize) -> Registry {
    let mut registry = Registry::with_builtins();
    register_index_sink(&mut registry, index.to_path_buf(), commit_interval);
    registry
}

/// Config from `path` (or defaults), with `commit_interval` overridden and the index sink
/// attached when the config names no sinks.
pub fn pipeline_config(
    path: Option<&Path>,
    commit_interval: Option<usize>,
    default_sink: bool,
) -> Result<KernelConfig> {
    let mut config = match path {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("Failed to load pipeline config {}", path.display()))?,
        None => KernelConfig::default(),
    };
    if let Some(n) = commit_interval {
        config.commit_interval = n;
    }
    if default_sink && config.sinks.is_empty() {
        config.sinks.push(ComponentSpec::new(IndexStore::NAME, ""));
    }
    Ok(config)
}

pub fn open_engine(index: &Path) -> Result<QueryEngine> {
    QueryEngine::open(index)
        .with_context(|| format!("Failed to open graph index at {}", index.display()))
}

/// Joins trailing words into one predicate; nothing means `*`.
pub fn parse_predicate(words: &[String]) -> Result<Predicate> {
    let text = words.join(" ");
    Predicate::parse(&text).with_context(|| format!("Invalid predicate: {text}"))
}
