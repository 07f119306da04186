//! Line protocol for administering a running kernel:
//!
//! ```text
//! add source <type> [args]
//! add sink <type> [args]
//! add filter <type> <index> [args]
//! remove source <name>
//! remove sink <name>
//! remove filter <index>
//! list <sources|sinks|filters>
//! exit
//! ```

use std::io::{BufRead, Write};
use std::str::FromStr;

use provgraph_core::error::CoreError;
use provgraph_core::kernel::{Category, KernelHandle};

use crate::output::format::format_listing;
use crate::output::OutputFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    AddSource { type_name: String, args: String },
    AddSink { type_name: String, args: String },
    AddFilter { type_name: String, index: usize, args: String },
    RemoveSource(String),
    RemoveSink(String),
    RemoveFilter(usize),
    List(Category),
    Exit,
}

fn usage(line: &str) -> CoreError {
    CoreError::Parse(format!("unrecognized command: {line}"))
}

fn parse_index(word: &str) -> Result<usize, CoreError> {
    word.parse()
        .map_err(|_| CoreError::Parse(format!("index must be a non-negative number, got '{word}'")))
}

impl FromStr for AdminCommand {
    type Err = CoreError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let rest = |from: usize| words.get(from..).map(|w| w.join(" ")).unwrap_or_default();
        let command = match words.as_slice() {
            ["exit" | "quit"] => AdminCommand::Exit,
            ["list", category] => AdminCommand::List(category.parse()?),
            ["add", "source", type_name, ..] => AdminCommand::AddSource {
                type_name: type_name.to_string(),
                args: rest(3),
            },
            ["add", "sink" | "storage", type_name, ..] => AdminCommand::AddSink {
                type_name: type_name.to_string(),
                args: rest(3),
            },
            ["add", "filter", type_name, index, ..] => AdminCommand::AddFilter {
                type_name: type_name.to_string(),
                index: parse_index(index)?,
                args: rest(4),
            },
            ["remove", "source", name] => AdminCommand::RemoveSource(name.to_string()),
            ["remove", "sink" | "storage", name] => AdminCommand::RemoveSink(name.to_string()),
            ["remove", "filter", index] => AdminCommand::RemoveFilter(parse_index(index)?),
            _ => return Err(usage(line.trim())),
        };
        Ok(command)
    }
}

/// Apply one command and describe the outcome. `Exit` is the caller's business.
pub fn execute(
    kernel: &KernelHandle,
    command: AdminCommand,
    format: OutputFormat,
) -> Result<String, CoreError> {
    match command {
        AdminCommand::AddSource { type_name, args } => {
            let name = kernel.add_source(&type_name, &args)?;
            Ok(format!("added source {name}"))
        }
        AdminCommand::AddSink { type_name, args } => {
            let name = kernel.add_sink(&type_name, &args)?;
            Ok(format!("added sink {name}"))
        }
        AdminCommand::AddFilter { type_name, index, args } => {
            kernel.add_filter(&type_name, index, &args)?;
            Ok(format!("added filter {type_name} at {index}"))
        }
        AdminCommand::RemoveSource(name) => {
            kernel.remove_source(&name)?;
            Ok(format!("removed source {name}"))
        }
        AdminCommand::RemoveSink(name) => {
            kernel.remove_sink(&name)?;
            Ok(format!("removed sink {name}"))
        }
        AdminCommand::RemoveFilter(index) => {
            let name = kernel.remove_filter(index)?;
            Ok(format!("removed filter {name} from {index}"))
        }
        AdminCommand::List(category) => {
            Ok(format_listing(category, &kernel.list(category)?, format))
        }
        AdminCommand::Exit => Ok("bye".to_string()),
    }
}

/// Read commands until `exit` or end of input, answering each on `out`.
pub fn serve(
    kernel: &KernelHandle,
    input: impl BufRead,
    out: &mut impl Write,
    format: OutputFormat,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let reply = match trimmed.parse::<AdminCommand>() {
            Ok(AdminCommand::Exit) => break,
            Ok(command) => execute(kernel, command, format),
            Err(e) => Err(e),
        };
        match reply {
            Ok(text) => writeln!(out, "{text}")?,
            Err(e) => {
                tracing::debug!("Admin command failed: {e}");
                writeln!(out, "error: {e}")?
            }
        }
        out.flush()?;
    }
    Ok(())
}
