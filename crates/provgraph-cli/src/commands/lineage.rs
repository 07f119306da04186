use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use provgraph_core::lineage::LineageRequest;
use provgraph_core::model::Direction;
use provgraph_core::predicate::Predicate;

use super::open_engine;
use crate::output::format::format_lineage;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct LineageArgs {
    /// Predicate selecting the root vertex, e.g. `path:/etc/passwd`
    pub source: String,

    /// ancestors (walk edges backwards) or descendants
    #[arg(short, long, default_value = "ancestors", value_parser = parse_direction)]
    pub direction: Direction,

    /// Number of hops to walk
    #[arg(long, conflicts_with = "prune", required_unless_present = "prune")]
    pub depth: Option<u32>,

    /// Stop at vertices matching this predicate instead of after a fixed depth
    #[arg(long)]
    pub prune: Option<String>,

    /// Leave the vertices that stopped a pruned walk out of the result
    #[arg(long, requires = "prune")]
    pub exclude_terminating: bool,
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    s.parse().map_err(|e: provgraph_core::error::CoreError| e.to_string())
}

pub fn run(args: &LineageArgs, index: &Path, format: OutputFormat) -> Result<()> {
    let source = Predicate::parse(&args.source)
        .with_context(|| format!("Invalid source predicate: {}", args.source))?;
    let request = match (&args.prune, args.depth) {
        (Some(stop), _) => {
            let stop = Predicate::parse(stop)
                .with_context(|| format!("Invalid prune predicate: {stop}"))?;
            LineageRequest::pruned(source, stop, args.direction, !args.exclude_terminating)
        }
        (None, Some(depth)) => LineageRequest::depth(source, depth, args.direction),
        (None, None) => anyhow::bail!("Either --depth or --prune is required"),
    };

    let engine = open_engine(index)?;
    let lineage = engine
        .lineage(&request)
        .with_context(|| format!("Lineage query from '{}' failed", args.source))?;
    println!("{}", format_lineage(&lineage, format));
    Ok(())
}
