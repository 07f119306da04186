use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use provgraph_core::kernel::Kernel;

use super::{console, pipeline_config, registry};
use crate::output::format::format_kernel_stats;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline config (JSON) naming startup sources, filters and sinks
    #[arg(short, long, env = "PROVGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage operations between automatic index commits
    #[arg(long)]
    pub commit_interval: Option<usize>,

    /// Start without the default index sink
    #[arg(long)]
    pub no_index: bool,
}

pub fn run(args: &RunArgs, index: &Path, format: OutputFormat) -> Result<()> {
    let config = pipeline_config(args.config.as_deref(), args.commit_interval, !args.no_index)?;
    let kernel = Kernel::start(config.clone(), registry(index, config.commit_interval))
        .context("Failed to start pipeline")?;
    eprintln!("Pipeline running. Commands: add, remove, list, exit.");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    console::serve(&kernel, stdin.lock(), &mut stdout, format).context("Console I/O failed")?;

    let stats = kernel.shutdown().context("Pipeline shutdown failed")?;
    eprintln!("{}", format_kernel_stats(&stats, format));
    Ok(())
}
