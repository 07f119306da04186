use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use provgraph_core::kernel::Kernel;
use provgraph_core::source::jsonl::JsonLinesSource;

use super::{pipeline_config, registry};
use crate::output::format::format_kernel_stats;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct IngestArgs {
    /// JSON-lines files, one vertex or edge per line
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Filter to append to the chain: `<type> [key=value ...]` (repeatable, in order)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Pipeline config (JSON) supplying startup filters and sinks
    #[arg(short, long, env = "PROVGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage operations between automatic index commits
    #[arg(long)]
    pub commit_interval: Option<usize>,
}

pub fn run(args: &IngestArgs, index: &Path, format: OutputFormat) -> Result<()> {
    let config = pipeline_config(args.config.as_deref(), args.commit_interval, true)?;
    let first_extra = config.filters.len();
    let kernel = Kernel::start(config.clone(), registry(index, config.commit_interval))
        .context("Failed to start pipeline")?;

    for (offset, spec) in args.filters.iter().enumerate() {
        let (type_name, filter_args) = spec.trim().split_once(' ').unwrap_or((spec.trim(), ""));
        kernel
            .add_filter(type_name, first_extra + offset, filter_args)
            .with_context(|| format!("Failed to add filter '{spec}'"))?;
    }

    for file in &args.files {
        kernel
            .attach_source(JsonLinesSource::NAME, Box::new(JsonLinesSource::new(file)))
            .with_context(|| format!("Failed to read {}", file.display()))?;
    }

    kernel.await_idle()?;
    let stats = kernel.shutdown().context("Pipeline shutdown failed")?;
    println!("{}", format_kernel_stats(&stats, format));
    Ok(())
}
