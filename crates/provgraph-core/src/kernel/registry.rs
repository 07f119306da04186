use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::filter::{
    CycleAvoidance, DropKeys, Filter, GraphFinesse, IoRuns, ReadWriteCoalescer, VersionOnWrite,
};
use crate::source::{JsonLinesSource, Source};
use crate::storage::{MemoryStore, Sink};

pub type SourceFactory = Box<dyn Fn(&str) -> Result<Box<dyn Source>, CoreError> + Send + Sync>;
pub type FilterFactory = Box<dyn Fn(&str) -> Result<Box<dyn Filter>, CoreError> + Send + Sync>;
pub type SinkFactory = Box<dyn Fn(&str) -> Result<Box<dyn Sink>, CoreError> + Send + Sync>;

/// Maps type names to constructors. Admin commands look components up here by name.
#[derive(Default)]
pub struct Registry {
    sources: BTreeMap<String, SourceFactory>,
    filters: BTreeMap<String, FilterFactory>,
    sinks: BTreeMap<String, SinkFactory>,
}

fn no_args(name: &str, args: &str) -> Result<(), CoreError> {
    if args.trim().is_empty() {
        Ok(())
    } else {
        Err(CoreError::Config(format!("{name} takes no arguments")))
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in source, filter and sink.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_source(JsonLinesSource::NAME, |args| {
            Ok(Box::new(JsonLinesSource::from_args(args)?))
        });

        registry.register_filter(CycleAvoidance::NAME, |args| {
            no_args(CycleAvoidance::NAME, args)?;
            Ok(Box::new(CycleAvoidance::new()))
        });
        registry.register_filter(GraphFinesse::NAME, |args| {
            Ok(Box::new(GraphFinesse::from_args(args)?))
        });
        registry.register_filter(IoRuns::NAME, |args| Ok(Box::new(IoRuns::from_args(args)?)));
        registry.register_filter(ReadWriteCoalescer::NAME, |args| {
            Ok(Box::new(ReadWriteCoalescer::from_args(args)?))
        });
        registry.register_filter(DropKeys::NAME, |args| Ok(Box::new(DropKeys::from_args(args)?)));
        registry.register_filter(VersionOnWrite::NAME, |args| {
            Ok(Box::new(VersionOnWrite::from_args(args)?))
        });

        registry.register_sink(MemoryStore::NAME, |args| {
            let interval = match crate::filter::parse_args(args).get("commit_interval") {
                Some(n) => n
                    .parse()
                    .map_err(|_| {
                        CoreError::Config(format!("commit_interval must be a number, got '{n}'"))
                    })?,
                None => crate::storage::memory::DEFAULT_COMMIT_INTERVAL,
            };
            Ok(Box::new(MemoryStore::with_commit_interval(interval)))
        });
        registry
    }

    pub fn register_source<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Source>, CoreError> + Send + Sync + 'static,
    {
        self.sources.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_filter<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Filter>, CoreError> + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_sink<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Sink>, CoreError> + Send + Sync + 'static,
    {
        self.sinks.insert(name.to_string(), Box::new(factory));
    }

    pub fn create_source(&self, name: &str, args: &str) -> Result<Box<dyn Source>, CoreError> {
        let factory = self.sources.get(name).ok_or_else(|| CoreError::Registry {
            category: "source",
            name: name.to_string(),
        })?;
        factory(args)
    }

    pub fn create_filter(&self, name: &str, args: &str) -> Result<Box<dyn Filter>, CoreError> {
        let factory = self.filters.get(name).ok_or_else(|| CoreError::Registry {
            category: "filter",
            name: name.to_string(),
        })?;
        factory(args)
    }

    pub fn create_sink(&self, name: &str, args: &str) -> Result<Box<dyn Sink>, CoreError> {
        let factory = self.sinks.get(name).ok_or_else(|| CoreError::Registry {
            category: "sink",
            name: name.to_string(),
        })?;
        factory(args)
    }

    pub fn source_types(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn filter_types(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn sink_types(&self) -> impl Iterator<Item = &str> {
        self.sinks.keys().map(String::as_str)
    }
}
