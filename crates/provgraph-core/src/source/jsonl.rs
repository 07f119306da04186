use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::Source;
use crate::buffer::Buffer;
use crate::error::CoreError;
use crate::filter::parse_args;
use crate::model::Element;

/// Reads one JSON element per line from a file and closes its buffer at end of file.
///
/// Blank lines and lines starting with `#` are skipped; malformed lines are logged and skipped.
pub struct JsonLinesSource {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl JsonLinesSource {
    pub const NAME: &'static str = "jsonl";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Accepts `path=<file>` or a bare file path.
    pub fn from_args(args: &str) -> Result<Self, CoreError> {
        let parsed = parse_args(args);
        if let Some(path) = parsed.get("path") {
            return Ok(Self::new(path));
        }
        match args.split_whitespace().collect::<Vec<_>>().as_slice() {
            [path] if !path.contains('=') => Ok(Self::new(*path)),
            _ => Err(CoreError::Config("jsonl source requires 'path=<file>'".into())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn produce(reader: impl BufRead, buffer: &Buffer, stop: &AtomicBool, path: &Path) {
    let mut accepted = 0u64;
    for (n, line) in reader.lines().enumerate() {
        if stop.load(Ordering::Relaxed) {
            tracing::info!(path = %path.display(), "Stopped before end of file");
            break;
        }
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(path = %path.display(), "Read failed: {e}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Element>(trimmed) {
            Ok(element) => {
                if !buffer.put(element) {
                    break;
                }
                accepted += 1;
            }
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = n + 1,
                "Skipping malformed element: {e}"
            ),
        }
    }
    tracing::info!(path = %path.display(), accepted, "Finished reading");
    buffer.close();
}

impl Source for JsonLinesSource {
    fn initialize(&mut self, buffer: Arc<Buffer>) -> Result<(), CoreError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let stop = Arc::clone(&self.stop);
        let path = self.path.clone();
        let worker = std::thread::Builder::new()
            .name(format!("jsonl:{}", self.path.display()))
            .spawn(move || produce(reader, &buffer, &stop, &path))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn shutdown(&mut self) -> Result<(), CoreError> {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                return Err(CoreError::Storage(format!(
                    "reader thread for {} panicked",
                    self.path.display()
                )));
            }
        }
        Ok(())
    }
}
