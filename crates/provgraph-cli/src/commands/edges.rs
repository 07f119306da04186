use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use provgraph_core::predicate::Predicate;

use super::{open_engine, parse_predicate};
use crate::output::format::format_edges;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct EdgesArgs {
    /// Predicate on the edge's own annotations (default: all)
    pub predicate: Vec<String>,

    /// Predicate the source vertex must satisfy
    #[arg(long)]
    pub from: Option<String>,

    /// Predicate the destination vertex must satisfy
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum number of edges to print
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

fn endpoint(text: Option<&str>) -> Result<Predicate> {
    match text {
        Some(t) => Predicate::parse(t).with_context(|| format!("Invalid predicate: {t}")),
        None => Ok(Predicate::Any),
    }
}

pub fn run(args: &EdgesArgs, index: &Path, format: OutputFormat) -> Result<()> {
    let edge = parse_predicate(&args.predicate)?;
    let source = endpoint(args.from.as_deref())?;
    let destination = endpoint(args.to.as_deref())?;
    let engine = open_engine(index)?;
    let mut edges = engine.edges_matching(&source, &destination, &edge)?;
    if let Some(limit) = args.limit {
        edges.truncate(limit);
    }
    println!("{}", format_edges(&edges, format));
    Ok(())
}
