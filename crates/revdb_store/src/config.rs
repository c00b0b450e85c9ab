//! In-memory store configuration.

/// Configuration for [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Undelivered events buffered per changefeed before the producer waits.
    pub changefeed_buffer: usize,

    /// Events retained per table for slow changefeeds before they lag.
    pub broadcast_capacity: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            changefeed_buffer: 256,
            broadcast_capacity: 1024,
        }
    }
}

impl MemoryStoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-changefeed buffer.
    #[must_use]
    pub const fn changefeed_buffer(mut self, size: usize) -> Self {
        self.changefeed_buffer = size;
        self
    }

    /// Sets the per-table broadcast capacity.
    #[must_use]
    pub const fn broadcast_capacity(mut self, size: usize) -> Self {
        self.broadcast_capacity = size;
        self
    }
}
