use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{Category, Listing};
use crate::buffer::{Buffer, BufferElement, Doorbell};
use crate::error::CoreError;
use crate::filter::{Filter, FilterChain, FinalCommitFilter};
use crate::model::Element;
use crate::source::Source;
use crate::storage::Sink;

pub(crate) enum Command {
    AttachSource {
        type_name: String,
        source: Box<dyn Source>,
        reply: Sender<Result<String, CoreError>>,
    },
    AttachSink {
        type_name: String,
        sink: Box<dyn Sink>,
        reply: Sender<Result<String, CoreError>>,
    },
    InsertFilter {
        index: usize,
        filter: Box<dyn Filter>,
        reply: Sender<Result<(), CoreError>>,
    },
    RemoveSource {
        name: String,
        reply: Sender<Result<(), CoreError>>,
    },
    RemoveSink {
        name: String,
        reply: Sender<Result<(), CoreError>>,
    },
    RemoveFilter {
        index: usize,
        reply: Sender<Result<String, CoreError>>,
    },
    List {
        category: Category,
        reply: Sender<Vec<Listing>>,
    },
    AwaitIdle {
        reply: Sender<()>,
    },
    Shutdown {
        reply: Sender<()>,
    },
}

struct SourceSlot {
    name: String,
    type_name: String,
    attached_at: DateTime<Utc>,
    source: Box<dyn Source>,
    buffer: Arc<Buffer>,
    /// Closed and fully taken.
    drained: bool,
    removing: bool,
    waiters: Vec<Sender<Result<(), CoreError>>>,
}

/// Owns every piece of pipeline state. Runs on the dispatch thread; admin handles talk to it
/// over the command channel, so mutation never overlaps a pass over the buffers.
pub(crate) struct Dispatcher {
    source_annotation: String,
    idle_wait: Duration,
    doorbell: Doorbell,
    commands: Receiver<Command>,
    sources: Vec<SourceSlot>,
    chain: FilterChain,
    idle_waiters: Vec<Sender<()>>,
    shutdown_waiters: Vec<Sender<()>>,
    shutting_down: bool,
}

fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl Dispatcher {
    pub(crate) fn new(
        source_annotation: String,
        idle_wait: Duration,
        doorbell: Doorbell,
        commands: Receiver<Command>,
        terminal: FinalCommitFilter,
    ) -> Self {
        Self {
            source_annotation,
            idle_wait,
            doorbell,
            commands,
            sources: Vec::new(),
            chain: FilterChain::new(terminal),
            idle_waiters: Vec::new(),
            shutdown_waiters: Vec::new(),
            shutting_down: false,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::info!("Dispatch loop started");
        loop {
            let seen = self.doorbell.rings();
            let mut busy = self.drain_commands();
            busy |= self.round();
            self.reap();
            self.answer_idle_waiters();
            if self.shutting_down && self.sources.is_empty() {
                break;
            }
            if !busy {
                self.doorbell.wait(seen, self.idle_wait);
            }
        }
        self.finish();
    }

    fn drain_commands(&mut self) -> bool {
        let mut handled = false;
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    handled = true;
                    self.handle(command);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.shutting_down {
                        tracing::info!("All handles dropped, shutting down");
                        self.begin_shutdown();
                    }
                    break;
                }
            }
        }
        handled
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::AttachSource {
                type_name,
                source,
                reply,
            } => {
                let _ = reply.send(self.attach_source(type_name, source));
            }
            Command::AttachSink { type_name, sink, reply } => {
                let _ = reply.send(self.attach_sink(type_name, sink));
            }
            Command::InsertFilter { index, filter, reply } => {
                let name = filter.name().to_string();
                let result = self.chain.insert(index, filter);
                if result.is_ok() {
                    tracing::info!(filter = %name, index, "Filter attached");
                }
                let _ = reply.send(result);
            }
            Command::RemoveSource { name, reply } => {
                match self.sources.iter_mut().find(|s| s.name == name) {
                    Some(slot) => {
                        if !slot.removing {
                            tracing::info!(
                                source = %slot.name,
                                "Detaching source, draining buffer"
                            );
                            slot.removing = true;
                            slot.source.stop();
                        }
                        slot.waiters.push(reply);
                    }
                    None => {
                        let _ = reply.send(Err(CoreError::NotFound(format!("source '{name}'"))));
                    }
                }
            }
            Command::RemoveSink { name, reply } => {
                let result = match self.chain.terminal_mut().detach(&name) {
                    Some(sink) => FinalCommitFilter::close_sink(&name, sink),
                    None => Err(CoreError::NotFound(format!("sink '{name}'"))),
                };
                let _ = reply.send(result);
            }
            Command::RemoveFilter { index, reply } => {
                let result = self.chain.remove(index).map(|f| {
                    tracing::info!(filter = f.name(), index, "Filter detached");
                    f.name().to_string()
                });
                let _ = reply.send(result);
            }
            Command::List { category, reply } => {
                let _ = reply.send(self.list(category));
            }
            Command::AwaitIdle { reply } => self.idle_waiters.push(reply),
            Command::Shutdown { reply } => {
                self.shutdown_waiters.push(reply);
                if !self.shutting_down {
                    self.begin_shutdown();
                }
            }
        }
    }

    fn attach_source(
        &mut self,
        type_name: String,
        mut source: Box<dyn Source>,
    ) -> Result<String, CoreError> {
        if self.shutting_down {
            return Err(CoreError::Closed);
        }
        let name = unique_name(&type_name, |n| self.sources.iter().any(|s| s.name == n));
        let buffer = Arc::new(Buffer::with_doorbell(self.doorbell.clone()));
        source.initialize(Arc::clone(&buffer))?;
        tracing::info!(source = %name, "Source attached");
        self.sources.push(SourceSlot {
            name: name.clone(),
            type_name,
            attached_at: Utc::now(),
            source,
            buffer,
            drained: false,
            removing: false,
            waiters: Vec::new(),
        });
        Ok(name)
    }

    fn attach_sink(
        &mut self,
        type_name: String,
        mut sink: Box<dyn Sink>,
    ) -> Result<String, CoreError> {
        if self.shutting_down {
            return Err(CoreError::Closed);
        }
        let terminal = self.chain.terminal_mut();
        let name = unique_name(&type_name, |n| terminal.contains(n));
        sink.initialize()?;
        tracing::info!(sink = %name, "Sink attached");
        terminal.attach(name.clone(), type_name, sink);
        Ok(name)
    }

    fn list(&self, category: Category) -> Vec<Listing> {
        match category {
            Category::Sources => self
                .sources
                .iter()
                .enumerate()
                .map(|(position, s)| Listing {
                    position,
                    name: s.name.clone(),
                    type_name: s.type_name.clone(),
                    attached_at: s.attached_at,
                })
                .collect(),
            Category::Filters => self
                .chain
                .stages()
                .enumerate()
                .map(|(position, (name, attached_at))| Listing {
                    position,
                    name: name.to_string(),
                    type_name: name.to_string(),
                    attached_at,
                })
                .collect(),
            Category::Sinks => self
                .chain
                .terminal()
                .slots()
                .enumerate()
                .map(|(position, s)| Listing {
                    position,
                    name: s.name.clone(),
                    type_name: s.type_name.clone(),
                    attached_at: s.attached_at,
                })
                .collect(),
        }
    }

    /// Take at most one element from every source buffer.
    fn round(&mut self) -> bool {
        let mut busy = false;
        let stats = self.chain.terminal().stats();
        let mut taken = Vec::new();
        for slot in &mut self.sources {
            let mut element = match slot.buffer.get_buffer_element() {
                BufferElement::Vertex(v) => {
                    stats.record_vertex_received();
                    Element::Vertex(v)
                }
                BufferElement::Edge(e) => {
                    stats.record_edge_received();
                    Element::Edge(e)
                }
                BufferElement::Empty => continue,
                BufferElement::Closed => {
                    if !slot.drained {
                        slot.drained = true;
                        tracing::debug!(source = %slot.name, "Source buffer drained");
                    }
                    continue;
                }
            };
            element.annotate(&self.source_annotation, slot.name.clone());
            taken.push(element);
            busy = true;
        }
        for element in taken {
            self.chain.put(element);
        }
        busy
    }

    /// Detach sources that were marked for removal and whose buffers have drained.
    ///
    /// A stopped source whose producers have exited without closing gets its buffer closed
    /// here; whatever it put before exiting is still taken first.
    fn reap(&mut self) {
        let mut i = 0;
        while i < self.sources.len() {
            let slot = &self.sources[i];
            let abandoned = !slot.buffer.is_closed() && slot.source.is_finished();
            if slot.removing && !slot.drained && abandoned {
                tracing::debug!(source = %slot.name, "Source finished without closing its buffer");
                slot.buffer.close();
            }
            if !(slot.removing && slot.drained) {
                i += 1;
                continue;
            }
            let mut slot = self.sources.remove(i);
            let result = slot.source.shutdown();
            if let Err(e) = &result {
                tracing::warn!(source = %slot.name, "Source shutdown failed: {e}");
            }
            tracing::info!(source = %slot.name, "Source detached");
            for waiter in slot.waiters.drain(..) {
                let _ = waiter.send(Ok(()));
            }
        }
    }

    fn answer_idle_waiters(&mut self) {
        if self.idle_waiters.is_empty() || !self.sources.iter().all(|s| s.drained) {
            return;
        }
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn begin_shutdown(&mut self) {
        self.shutting_down = true;
        for slot in &mut self.sources {
            if !slot.removing {
                slot.removing = true;
                slot.source.stop();
            }
        }
    }

    fn finish(mut self) {
        self.chain.flush_all();
        self.chain.terminal_mut().shutdown_all();
        let stats = self.chain.terminal().stats().snapshot();
        tracing::info!(
            vertices = stats.vertices_forwarded,
            edges = stats.edges_forwarded,
            "Dispatch loop stopped"
        );
        for waiter in self.idle_waiters.drain(..).chain(self.shutdown_waiters.drain(..)) {
            let _ = waiter.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_suffixes() {
        let taken = ["jsonl", "jsonl-2"];
        assert_eq!(unique_name("memory", |n| taken.contains(&n)), "memory");
        assert_eq!(unique_name("jsonl", |n| taken.contains(&n)), "jsonl-3");
    }
}
