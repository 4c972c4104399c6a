//! Transport message with an exactly-once release notification.

use std::fmt;

use bytes::Bytes;

type Release = Box<dyn FnOnce() + Send + 'static>;

/// A byte buffer handed to the transport.
///
/// The optional release callback fires exactly once, when the transport
/// (or whoever ends up owning the message) drops it. For outgoing messages
/// that happens after the bytes were written to the socket.
pub struct Message {
    data: Bytes,
    release: Option<Release>,
}

impl Message {
    /// A message without a release callback.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            release: None,
        }
    }

    /// A message that calls `release` once the buffer is no longer needed.
    pub fn with_release(data: impl Into<Bytes>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            data: data.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Payload bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Takes the payload, firing the release callback.
    pub fn into_bytes(mut self) -> Bytes {
        std::mem::take(&mut self.data)
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("len", &self.data.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Message::new(data)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message::new(data)
    }
}
