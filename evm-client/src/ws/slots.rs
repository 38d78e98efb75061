//! Request correlator: a fixed power-of-two slot table keyed by
//! `id & (N-1)` (spec §4.5). Allocation fails fast on collision rather than
//! blocking, which is the client's primary backpressure signal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::ProviderError;
use crate::jsonrpc::ResponsePayload;

struct Slot {
    id: u64,
    method: String,
    allocated_at: Instant,
    completion: oneshot::Sender<Result<ResponsePayload, ProviderError>>,
}

/// Fixed-size request correlator. `capacity` must be a power of two.
pub struct SlotTable {
    slots: Box<[Mutex<Option<Slot>>]>,
    mask: u64,
    next_id: AtomicU64,
    late_responses: AtomicU64,
}

/// A reservation returned by [`SlotTable::allocate`]; the caller awaits
/// `completion` and the table clears the slot before sending along it.
pub struct Reservation {
    pub id: u64,
    pub completion: oneshot::Receiver<Result<ResponsePayload, ProviderError>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "slot table capacity must be a power of two");
        let slots = (0..capacity).map(|_| Mutex::new(None)).collect();
        Self {
            slots,
            mask: (capacity - 1) as u64,
            next_id: AtomicU64::new(1),
            late_responses: AtomicU64::new(0),
        }
    }

    fn index(&self, id: u64) -> usize {
        (id & self.mask) as usize
    }

    /// Draws the next id and reserves its slot, or fails fast with
    /// [`ProviderError::TooManyInFlight`] if the slot is already occupied.
    pub fn allocate(&self, method: &str) -> Result<Reservation, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let idx = self.index(id);
        let mut guard = self.slots[idx].lock();
        if guard.is_some() {
            return Err(ProviderError::TooManyInFlight);
        }
        let (tx, rx) = oneshot::channel();
        *guard = Some(Slot {
            id,
            method: method.to_string(),
            allocated_at: Instant::now(),
            completion: tx,
        });
        Ok(Reservation { id, completion: rx })
    }

    /// Completes the slot for `id` with a response, clearing it first so
    /// the index is reusable the instant the caller observes completion.
    pub fn complete(&self, id: u64, result: Result<ResponsePayload, ProviderError>) {
        let idx = self.index(id);
        let slot = self.slots[idx].lock().take();
        match slot {
            Some(slot) if slot.id == id => {
                let _ = slot.completion.send(result);
            }
            _ => {
                self.late_responses.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Times out the slot for `id` if it is still occupied by that id.
    pub fn timeout(&self, id: u64) {
        self.complete(id, Err(ProviderError::RequestTimeout));
    }

    /// Completes every occupied slot with `ConnectionLost` (spec §4.7, on
    /// entering `Reconnecting` from `Connected`).
    pub fn fail_all_with_connection_lost(&self) {
        for slot_cell in self.slots.iter() {
            if let Some(slot) = slot_cell.lock().take() {
                let _ = slot.completion.send(Err(ProviderError::ConnectionLost));
            }
        }
    }

    pub fn cancel(&self, id: u64) {
        self.complete(id, Err(ProviderError::Cancelled));
    }

    pub fn late_response_count(&self) -> u64 {
        self.late_responses.load(Ordering::Relaxed)
    }

    pub fn method_for(&self, id: u64) -> Option<String> {
        self.slots[self.index(id)]
            .lock()
            .as_ref()
            .filter(|s| s.id == id)
            .map(|s| s.method.clone())
    }

    pub fn age_of(&self, id: u64) -> Option<std::time::Duration> {
        self.slots[self.index(id)]
            .lock()
            .as_ref()
            .filter(|s| s.id == id)
            .map(|s| s.allocated_at.elapsed())
    }
}
