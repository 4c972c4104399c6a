//! Tunables for the socket communicator.

use serde::{Deserialize, Serialize};

/// Default per-link queue bound in bytes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64 * 1024 * 1024;

/// Configuration shared by socket senders and receivers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommOptions {
    /// Bytes each link may hold queued before `send` blocks.
    pub queue_capacity: usize,
    /// Whether to disable Nagle's algorithm on every link.
    pub tcp_nodelay: bool,
    /// Largest frame a receiver accepts; capped at the queue capacity.
    pub max_frame_len: Option<usize>,
}

impl Default for CommOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            tcp_nodelay: true,
            max_frame_len: None,
        }
    }
}

impl CommOptions {
    /// Sets the per-link queue bound.
    pub fn queue_capacity(mut self, bytes: usize) -> Self {
        self.queue_capacity = bytes.max(1);
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Sets the largest accepted frame.
    pub fn max_frame_len(mut self, bytes: usize) -> Self {
        self.max_frame_len = Some(bytes);
        self
    }

    /// Frame limit in effect, never above the queue capacity.
    pub fn frame_limit(&self) -> usize {
        self.max_frame_len
            .map_or(self.queue_capacity, |len| len.min(self.queue_capacity))
    }
}
