//! Bounded outbound ring buffer serving many producer tasks and a single
//! I/O consumer (spec §4.6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::ProviderError;

/// An outbound entry: either a frame to write, or a control message for the
/// I/O task itself.
#[derive(Debug, Clone)]
pub enum OutboundEntry {
    Frame(Vec<u8>),
    Ping,
    Close,
}

/// How a producer waits when the buffer is momentarily full before giving
/// up with [`ProviderError::RingBufferSaturated`].
///
/// `BusySpin` never yields and is reserved for dedicated-core deployments;
/// the others back off the scheduler between spins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    BusySpin,
    #[default]
    Yielding,
    LiteBlocking,
    Blocking,
}

struct Inner {
    buffer: Mutex<std::collections::VecDeque<OutboundEntry>>,
    not_empty: Condvar,
    capacity: usize,
    len: AtomicUsize,
    saturation_events: AtomicUsize,
}

/// A bounded MPSC ring buffer. `capacity` must be a power of two.
#[derive(Clone)]
pub struct RingBuffer {
    inner: Arc<Inner>,
    wait_strategy: WaitStrategy,
}

impl RingBuffer {
    pub fn new(capacity: usize, wait_strategy: WaitStrategy) -> Self {
        assert!(capacity.is_power_of_two(), "ring buffer capacity must be a power of two");
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(std::collections::VecDeque::with_capacity(capacity)),
                not_empty: Condvar::new(),
                capacity,
                len: AtomicUsize::new(0),
                saturation_events: AtomicUsize::new(0),
            }),
            wait_strategy,
        }
    }

    /// Enqueues a single entry; fails immediately (no blocking wait) when
    /// the buffer is at capacity.
    pub fn try_push(&self, entry: OutboundEntry) -> Result<(), ProviderError> {
        let mut guard = self.inner.buffer.lock();
        if guard.len() >= self.inner.capacity {
            self.inner.saturation_events.fetch_add(1, Ordering::Relaxed);
            return Err(ProviderError::RingBufferSaturated);
        }
        guard.push_back(entry);
        self.inner.len.store(guard.len(), Ordering::Relaxed);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Enqueues a batch, hinting the producer queue that many frames are
    /// about to arrive. Atomic: either the whole batch fits or none of it
    /// is admitted, so a caller never observes a half-enqueued batch.
    pub fn try_push_batch(&self, entries: Vec<OutboundEntry>) -> Result<(), ProviderError> {
        let mut guard = self.inner.buffer.lock();
        if guard.len() + entries.len() > self.inner.capacity {
            self.inner.saturation_events.fetch_add(1, Ordering::Relaxed);
            return Err(ProviderError::RingBufferSaturated);
        }
        guard.extend(entries);
        self.inner.len.store(guard.len(), Ordering::Relaxed);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Drains the next entry for the I/O task, applying the configured
    /// wait strategy while the buffer is empty.
    pub fn pop_blocking(&self) -> Option<OutboundEntry> {
        let mut guard = self.inner.buffer.lock();
        loop {
            if let Some(entry) = guard.pop_front() {
                self.inner.len.store(guard.len(), Ordering::Relaxed);
                return Some(entry);
            }
            match self.wait_strategy {
                WaitStrategy::BusySpin => {
                    drop(guard);
                    std::hint::spin_loop();
                    guard = self.inner.buffer.lock();
                }
                WaitStrategy::Yielding => {
                    drop(guard);
                    std::thread::yield_now();
                    guard = self.inner.buffer.lock();
                }
                WaitStrategy::LiteBlocking => {
                    let result = self
                        .inner
                        .not_empty
                        .wait_for(&mut guard, std::time::Duration::from_millis(1));
                    guard = result;
                }
                WaitStrategy::Blocking => {
                    self.inner.not_empty.wait(&mut guard);
                }
            }
        }
    }

    pub fn try_pop(&self) -> Option<OutboundEntry> {
        let mut guard = self.inner.buffer.lock();
        let entry = guard.pop_front();
        self.inner.len.store(guard.len(), Ordering::Relaxed);
        entry
    }

    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.inner.capacity as f64
    }

    pub fn saturation_events(&self) -> usize {
        self.inner.saturation_events.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_preserve_fifo_order() {
        let queue = RingBuffer::new(4, WaitStrategy::Yielding);
        queue.try_push(OutboundEntry::Frame(vec![1])).unwrap();
        queue.try_push(OutboundEntry::Frame(vec![2])).unwrap();
        match queue.try_pop().unwrap() {
            OutboundEntry::Frame(f) => assert_eq!(f, vec![1]),
            _ => panic!("expected frame"),
        }
    }

    #[test]
    fn full_buffer_fails_fast_without_blocking() {
        let queue = RingBuffer::new(1, WaitStrategy::Yielding);
        queue.try_push(OutboundEntry::Ping).unwrap();
        assert!(matches!(
            queue.try_push(OutboundEntry::Ping),
            Err(ProviderError::RingBufferSaturated)
        ));
        assert_eq!(queue.saturation_events(), 1);
    }

    #[test]
    fn batch_push_is_all_or_nothing() {
        let queue = RingBuffer::new(2, WaitStrategy::Yielding);
        let batch = vec![OutboundEntry::Ping, OutboundEntry::Ping, OutboundEntry::Ping];
        assert!(queue.try_push_batch(batch).is_err());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn fill_ratio_reflects_occupancy() {
        let queue = RingBuffer::new(4, WaitStrategy::Yielding);
        queue.try_push(OutboundEntry::Ping).unwrap();
        assert_eq!(queue.fill_ratio(), 0.25);
    }
}
