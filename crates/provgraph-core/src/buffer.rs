use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::model::{Edge, Element, Vertex};

/// What the consumer side of a [`Buffer`] sees on each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferElement {
    Vertex(Vertex),
    Edge(Edge),
    /// Nothing pending right now.
    Empty,
    /// The producer has closed the buffer and every element has been taken.
    Closed,
}

/// Wakes the dispatch loop when any buffer receives work or an admin command arrives.
#[derive(Debug, Clone, Default)]
pub struct Doorbell {
    inner: Arc<(Mutex<u64>, Condvar)>,
}

impl Doorbell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ring(&self) {
        let (lock, cvar) = &*self.inner;
        let mut rings = lock.lock().unwrap_or_else(|e| e.into_inner());
        *rings = rings.wrapping_add(1);
        cvar.notify_all();
    }

    /// Current ring count; pass it back to [`Doorbell::wait`] to avoid missed wakeups.
    pub fn rings(&self) -> u64 {
        *self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Park until the count moves past `seen` or `timeout` elapses.
    pub fn wait(&self, seen: u64, timeout: Duration) {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = cvar
            .wait_timeout_while(guard, timeout, |rings| *rings == seen)
            .unwrap_or_else(|e| e.into_inner());
    }
}

/// FIFO of pending elements owned by one source.
///
/// Any number of producer threads may append; only the dispatch loop takes.
#[derive(Debug, Default)]
pub struct Buffer {
    queue: Mutex<VecDeque<Element>>,
    closed: AtomicBool,
    doorbell: Option<Doorbell>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doorbell(doorbell: Doorbell) -> Self {
        Self {
            doorbell: Some(doorbell),
            ..Self::default()
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Element>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an element. Returns false (and drops it) once the buffer is closed.
    pub fn put(&self, element: Element) -> bool {
        {
            let mut queue = self.queue();
            if self.closed.load(Ordering::Acquire) {
                tracing::debug!("Dropping element put into a closed buffer");
                return false;
            }
            queue.push_back(element);
        }
        if let Some(bell) = &self.doorbell {
            bell.ring();
        }
        true
    }

    pub fn put_vertex(&self, vertex: Vertex) -> bool {
        self.put(Element::Vertex(vertex))
    }

    pub fn put_edge(&self, edge: Edge) -> bool {
        self.put(Element::Edge(edge))
    }

    /// Take the next element, or report `Empty`/`Closed`.
    pub fn get_buffer_element(&self) -> BufferElement {
        let mut queue = self.queue();
        let closed = self.closed.load(Ordering::Acquire);
        match queue.pop_front() {
            Some(Element::Vertex(v)) => BufferElement::Vertex(v),
            Some(Element::Edge(e)) => BufferElement::Edge(e),
            None if closed => BufferElement::Closed,
            None => BufferElement::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    /// Signal that no more elements will be produced.
    pub fn close(&self) {
        // Flip under the queue lock so a concurrent put either lands before Closed or is refused.
        {
            let _queue = self.queue();
            self.closed.store(true, Ordering::Release);
        }
        if let Some(bell) = &self.doorbell {
            bell.ring();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
