use std::path::Path;

use anyhow::Result;

use super::open_engine;
use crate::output::format::format_counts;
use crate::output::OutputFormat;

pub fn run(index: &Path, format: OutputFormat) -> Result<()> {
    let engine = open_engine(index)?;
    let counts = engine.counts()?;
    println!("{}", format_counts(engine.index_path(), &counts, format));
    Ok(())
}
