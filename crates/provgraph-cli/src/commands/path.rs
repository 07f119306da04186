use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use provgraph_core::predicate::Predicate;

use super::open_engine;
use crate::output::format::format_path;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct PathArgs {
    /// Predicate selecting the start vertex; edges are followed source to destination
    pub from: String,

    /// Predicate selecting the end vertex
    pub to: String,

    /// Longest path to consider, in edges
    #[arg(long, default_value_t = 10)]
    pub max_depth: u32,

    /// Every vertex and edge on any path within the bound, not just one shortest path
    #[arg(long)]
    pub all: bool,
}

pub fn run(args: &PathArgs, index: &Path, format: OutputFormat) -> Result<()> {
    let from = Predicate::parse(&args.from)
        .with_context(|| format!("Invalid predicate: {}", args.from))?;
    let to =
        Predicate::parse(&args.to).with_context(|| format!("Invalid predicate: {}", args.to))?;

    let engine = open_engine(index)?;
    let path = engine
        .path(&from, &to, args.max_depth, args.all)
        .with_context(|| format!("Path query from '{}' to '{}' failed", args.from, args.to))?;
    println!("{}", format_path(&path, args.max_depth, format));
    Ok(())
}
