//! Outbound frame queue.
//!
//! Producers on any thread push encoded frames addressed to a client slot.
//! The connection loop drains the whole queue with a single lock acquisition
//! and writes each frame to the socket of its slot, dropping frames whose
//! slot has no live connection at that point.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// An encoded frame waiting to be written to a client slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundItem {
    /// Slot index of the receiving client.
    pub destination: usize,
    /// Fully encoded frame.
    pub frame: Bytes,
}

impl OutboundItem {
    /// Creates a new item.
    #[must_use]
    pub fn new(destination: usize, frame: impl Into<Bytes>) -> Self {
        Self {
            destination,
            frame: frame.into(),
        }
    }
}

/// Thread-safe FIFO of [`OutboundItem`]s.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: Mutex<VecDeque<OutboundItem>>,
}

impl OutboundQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a frame for `destination`.
    pub fn push(&self, destination: usize, frame: impl Into<Bytes>) {
        self.items
            .lock()
            .push_back(OutboundItem::new(destination, frame));
    }

    /// Takes every queued item in FIFO order.
    ///
    /// The queue is emptied under one lock acquisition, so a concurrent push
    /// lands either entirely in the returned batch or entirely in the next.
    pub fn drain(&self) -> Vec<OutboundItem> {
        let mut items = self.items.lock();
        items.drain(..).collect()
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
