use bytes::{Bytes, BytesMut};

/// Unbounded FIFO of bytes accepted from the producer but not yet flushed.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    data: BytesMut,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Take everything queued so far, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
