//! Byte-bounded blocking message queue.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::message::Message;
use crate::types::{Result, StrataError};

/// FIFO of messages holding at most `capacity` payload bytes.
///
/// Producers block in [`MessageQueue::push`] while the queue is full;
/// consumers block in [`MessageQueue::pop`] while it is empty. Closing the
/// queue wakes everybody: pushes fail, pops drain what is left and then
/// return `None`.
pub struct MessageQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<Message>,
    used: usize,
    closed: bool,
}

impl MessageQueue {
    /// An empty queue bounded to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Byte bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `msg`, blocking until enough bytes are free.
    ///
    /// A message larger than the whole capacity can never fit and is
    /// rejected up front.
    pub fn push(&self, msg: Message) -> Result<()> {
        let len = msg.len();
        if len > self.capacity {
            return Err(StrataError::Precondition(format!(
                "message of {len} bytes exceeds queue capacity {}",
                self.capacity
            )));
        }
        let mut state = self.state.lock();
        while !state.closed && state.used + len > self.capacity {
            debug!(
                used = state.used,
                capacity = self.capacity,
                incoming = len,
                "comm.queue.backpressure"
            );
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(StrataError::Transport("queue is closed".into()));
        }
        state.used += len;
        state.items.push_back(msg);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest message, blocking while the queue is empty and open.
    pub fn pop(&self) -> Option<Message> {
        let mut state = self.state.lock();
        loop {
            if let Some(msg) = self.take_front(&mut state) {
                return Some(msg);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Removes the oldest message if one is queued.
    pub fn try_pop(&self) -> Option<Message> {
        let mut state = self.state.lock();
        self.take_front(&mut state)
    }

    fn take_front(&self, state: &mut QueueState) -> Option<Message> {
        let msg = state.items.pop_front()?;
        state.used -= msg.len();
        self.not_full.notify_all();
        Some(msg)
    }

    /// Stops accepting messages and wakes every waiter.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Whether [`MessageQueue::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Whether the queue is closed and fully drained.
    pub fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.closed && state.items.is_empty()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no message is queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Payload bytes currently queued.
    pub fn used_bytes(&self) -> usize {
        self.state.lock().used
    }
}
