use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::{open_engine, parse_predicate};
use crate::output::format::format_vertices;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct VerticesArgs {
    /// Annotation predicate, e.g. `type:Process AND name~bash` (default: all)
    pub predicate: Vec<String>,

    /// Maximum number of vertices to print
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

pub fn run(args: &VerticesArgs, index: &Path, format: OutputFormat) -> Result<()> {
    let predicate = parse_predicate(&args.predicate)?;
    let engine = open_engine(index)?;
    let mut vertices = engine.vertices(&predicate)?;
    if let Some(limit) = args.limit {
        vertices.truncate(limit);
    }
    println!("{}", format_vertices(&vertices, format));
    Ok(())
}
