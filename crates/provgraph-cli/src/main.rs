use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "provgraph",
    version,
    about = "Ingest provenance events into a graph and query their lineage"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Graph index directory
    #[arg(long, global = true, env = "PROVGRAPH_INDEX", default_value = ".provgraph")]
    index: PathBuf,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        commands::Commands::Run(args) => commands::run::run(args, &cli.index, cli.format),
        commands::Commands::Ingest(args) => commands::ingest::run(args, &cli.index, cli.format),
        commands::Commands::Vertices(args) => commands::vertices::run(args, &cli.index, cli.format),
        commands::Commands::Edges(args) => commands::edges::run(args, &cli.index, cli.format),
        commands::Commands::Lineage(args) => commands::lineage::run(args, &cli.index, cli.format),
        commands::Commands::Path(args) => commands::path::run(args, &cli.index, cli.format),
        commands::Commands::Stats => commands::stats::run(&cli.index, cli.format),
    }
}
