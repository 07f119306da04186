//! Producers that push graph elements into a [`Buffer`].

pub mod jsonl;

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::error::CoreError;

pub use jsonl::JsonLinesSource;

/// An event producer. Runs on its own thread(s) and appends to the buffer it was given.
///
/// A source closes its buffer when it runs out of input, and again once it has put its last
/// element after [`Source::stop`]. The kernel never closes a buffer on its own while the
/// source may still produce into it; it only does so for a stopped source that reports
/// [`Source::is_finished`].
pub trait Source: Send {
    /// Start producing into `buffer`. Failing here leaves the source unattached.
    fn initialize(&mut self, buffer: Arc<Buffer>) -> Result<(), CoreError>;

    /// Ask producer threads to stop. Must not block. Elements put after this are still
    /// delivered.
    fn stop(&mut self) {}

    /// Whether every producer thread has exited, so nothing more can reach the buffer.
    fn is_finished(&self) -> bool {
        false
    }

    /// Called once after the buffer has drained; join threads and release resources here.
    fn shutdown(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}
