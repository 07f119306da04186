use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::dispatch::{Command, Dispatcher};
use super::registry::Registry;
use super::stats::{KernelStats, StatsSnapshot};
use super::{Category, Listing};
use crate::buffer::Doorbell;
use crate::config::KernelConfig;
use crate::error::CoreError;
use crate::filter::{Filter, FinalCommitFilter};
use crate::source::Source;
use crate::storage::Sink;

/// One running pipeline. Every method is a synchronous request to the dispatch thread.
///
/// Dropping the handle shuts the pipeline down gracefully.
pub struct KernelHandle {
    commands: Sender<Command>,
    doorbell: Doorbell,
    registry: Arc<Registry>,
    stats: Arc<KernelStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Entry point for building pipelines.
pub struct Kernel;

impl Kernel {
    /// Spawn the dispatch thread and attach the config's startup filters, sinks and sources,
    /// in that order. If any of them fails the half-built pipeline is shut down.
    pub fn start(config: KernelConfig, registry: Registry) -> Result<KernelHandle, CoreError> {
        config.validate()?;
        let stats = Arc::new(KernelStats::default());
        let doorbell = Doorbell::new();
        let (tx, rx) = mpsc::channel();
        let terminal = FinalCommitFilter::new(config.source_annotation.clone(), Arc::clone(&stats));
        let dispatcher = Dispatcher::new(
            config.source_annotation.clone(),
            Duration::from_millis(config.idle_wait_ms),
            doorbell.clone(),
            rx,
            terminal,
        );
        let worker = std::thread::Builder::new()
            .name("provgraph-dispatch".into())
            .spawn(move || dispatcher.run())?;

        let handle = KernelHandle {
            commands: tx,
            doorbell,
            registry: Arc::new(registry),
            stats,
            worker: Mutex::new(Some(worker)),
        };

        let startup = || -> Result<(), CoreError> {
            for (index, spec) in config.filters.iter().enumerate() {
                handle.add_filter(&spec.name, index, &spec.args)?;
            }
            for spec in &config.sinks {
                handle.add_sink(&spec.name, &spec.args)?;
            }
            for spec in &config.sources {
                handle.add_source(&spec.name, &spec.args)?;
            }
            Ok(())
        };
        if let Err(e) = startup() {
            tracing::error!("Pipeline startup failed: {e}");
            let _ = handle.shutdown();
            return Err(e);
        }
        Ok(handle)
    }
}

impl KernelHandle {
    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> Command) -> Result<T, CoreError> {
        let (tx, rx) = mpsc::channel();
        self.commands.send(build(tx)).map_err(|_| CoreError::Closed)?;
        self.doorbell.ring();
        rx.recv().map_err(|_| CoreError::Closed)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Create a source from the registry and attach it. Returns the instance name.
    pub fn add_source(&self, type_name: &str, args: &str) -> Result<String, CoreError> {
        let source = self.registry.create_source(type_name, args)?;
        self.attach_source(type_name, source)
    }

    pub fn attach_source(
        &self,
        type_name: &str,
        source: Box<dyn Source>,
    ) -> Result<String, CoreError> {
        self.request(|reply| Command::AttachSource {
            type_name: type_name.to_string(),
            source,
            reply,
        })?
    }

    pub fn add_sink(&self, type_name: &str, args: &str) -> Result<String, CoreError> {
        let sink = self.registry.create_sink(type_name, args)?;
        self.attach_sink(type_name, sink)
    }

    pub fn attach_sink(&self, type_name: &str, sink: Box<dyn Sink>) -> Result<String, CoreError> {
        self.request(|reply| Command::AttachSink {
            type_name: type_name.to_string(),
            sink,
            reply,
        })?
    }

    /// Insert a registry filter at `index` (0 is the head of the chain).
    pub fn add_filter(&self, type_name: &str, index: usize, args: &str) -> Result<(), CoreError> {
        let filter = self.registry.create_filter(type_name, args)?;
        self.insert_filter(index, filter)
    }

    pub fn insert_filter(&self, index: usize, filter: Box<dyn Filter>) -> Result<(), CoreError> {
        self.request(|reply| Command::InsertFilter { index, filter, reply })?
    }

    /// Stop a source and wait until everything it produced has gone through the chain.
    pub fn remove_source(&self, name: &str) -> Result<(), CoreError> {
        self.request(|reply| Command::RemoveSource {
            name: name.to_string(),
            reply,
        })?
    }

    /// Detach a sink after committing and shutting it down.
    pub fn remove_sink(&self, name: &str) -> Result<(), CoreError> {
        self.request(|reply| Command::RemoveSink {
            name: name.to_string(),
            reply,
        })?
    }

    /// Remove the filter at `index`; whatever it still held is flushed downstream.
    pub fn remove_filter(&self, index: usize) -> Result<String, CoreError> {
        self.request(|reply| Command::RemoveFilter { index, reply })?
    }

    pub fn list(&self, category: Category) -> Result<Vec<Listing>, CoreError> {
        self.request(|reply| Command::List { category, reply })
    }

    /// Block until every attached source has closed and drained its buffer.
    pub fn await_idle(&self) -> Result<(), CoreError> {
        self.request(|reply| Command::AwaitIdle { reply })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drain every source, flush the filters, shut down each sink once, and stop the thread.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<StatsSnapshot, CoreError> {
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(worker) = worker else {
            return Ok(self.stats.snapshot());
        };
        // The reply is lost if the thread is already gone; joining still tells us.
        let _ = self.request(|reply| Command::Shutdown { reply });
        worker
            .join()
            .map_err(|_| CoreError::Storage("dispatch thread panicked".into()))?;
        Ok(self.stats.snapshot())
    }
}

impl Drop for KernelHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Kernel shutdown on drop failed: {e}");
        }
    }
}
