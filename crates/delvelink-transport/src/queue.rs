//! The thread-safe inbound message queue.
//!
//! Receive tasks push onto it; the simulation drains it once per tick.
//! The lock is held only for the push or the pop; handler execution
//! happens entirely outside, so a handler that sends (and thereby touches
//! the write path) can never deadlock against a receive task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use delvelink_protocol::Message;

/// Shared inbound queue. Cheap to clone; all clones see the same queue.
#[derive(Clone, Default)]
pub struct InboundQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: Mutex<VecDeque<Message>>,
    /// Raised on every enqueue so the renderer knows a redraw is due,
    /// cleared when the simulation drains.
    dirty: AtomicBool,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a message. Called from receive tasks only.
    pub fn enqueue(&self, msg: Message) {
        tracing::trace!(kind = msg.kind(), "message enqueued");
        self.inner
            .messages
            .lock()
            .expect("inbound queue poisoned")
            .push_back(msg);
        self.inner.dirty.store(true, Ordering::Release);
    }

    /// Pops everything currently queued, in arrival order.
    ///
    /// Called once per simulation tick. Messages enqueued while the
    /// caller is still dispatching the returned batch wait for the next
    /// tick; that keeps per-connection ordering trivially correct.
    pub fn drain(&self) -> Vec<Message> {
        self.inner.dirty.store(false, Ordering::Release);
        let mut queue = self
            .inner
            .messages
            .lock()
            .expect("inbound queue poisoned");
        queue.drain(..).collect()
    }

    /// Whether anything arrived since the last drain.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Number of messages currently waiting.
    pub fn len(&self) -> usize {
        self.inner
            .messages
            .lock()
            .expect("inbound queue poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops everything queued. Part of connection teardown.
    pub fn clear(&self) {
        self.inner
            .messages
            .lock()
            .expect("inbound queue poisoned")
            .clear();
        self.inner.dirty.store(false, Ordering::Release);
    }
}
