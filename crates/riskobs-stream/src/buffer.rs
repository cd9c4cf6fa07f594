//! Bounded, ordered view of recent inbound frames.
//!
//! A pure sliding window: frames are appended in receipt order and the
//! oldest are evicted once capacity is reached. The lifetime receive
//! counter is independent of eviction.

use crate::message::InboundFrame;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default retained-window size.
pub const DEFAULT_CAPACITY: usize = 50;

/// Sliding window over the most recent inbound frames.
pub struct MessageBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    frames: VecDeque<InboundFrame>,
    total_received: u64,
}

impl MessageBuffer {
    /// Create a buffer retaining at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                total_received: 0,
            }),
        }
    }

    /// Append a frame, evicting from the front past capacity.
    ///
    /// The lifetime counter is incremented even when the frame is later
    /// evicted from the retained window.
    pub fn append(&self, frame: InboundFrame) {
        let mut inner = self.inner.lock();
        inner.frames.push_back(frame);
        while inner.frames.len() > self.capacity {
            inner.frames.pop_front();
        }
        inner.total_received += 1;
    }

    /// Reset the window and the lifetime counter.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.frames.clear();
        inner.total_received = 0;
    }

    /// Snapshot of retained frames, oldest first.
    pub fn frames(&self) -> Vec<InboundFrame> {
        self.inner.lock().frames.iter().cloned().collect()
    }

    /// Number of currently retained frames.
    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Whether the retained window is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    /// Lifetime count of appended frames.
    pub fn message_count(&self) -> u64 {
        self.inner.lock().total_received
    }

    /// Configured window size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
