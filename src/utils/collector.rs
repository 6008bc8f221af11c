//! Rank-indexed result sink shared by concurrent producers.
//!
//! Each rank owns its own slot lock, so writers at distinct ranks never
//! contend. The fill level is tracked with an atomic counter that only grows
//! for the lifetime of one operation, which makes it a cheap progress source.
//! A slot counts once from its first write, whether or not its payload has
//! been drained since.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::models::RankedItem;

/// Something a progress monitor can poll.
pub trait ProgressSource: Send + Sync {
    /// Number of completed items
    fn completed(&self) -> usize;

    /// True once no further progress is expected
    fn is_done(&self) -> bool;
}

#[derive(Debug)]
enum Slot<T> {
    Empty,
    Filled(T),
    /// Written, then drained
    Taken,
}

/// Bounded, rank-indexed collection of results.
#[derive(Debug)]
pub struct ResultCollector<T> {
    slots: Vec<Mutex<Slot<T>>>,
    filled: AtomicUsize,
    closed: AtomicBool,
}

impl<T> ResultCollector<T> {
    /// Create a collector holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Mutex::new(Slot::Empty)).collect(),
            filled: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `payload` at `rank`.
    ///
    /// Writing a rank twice replaces the earlier payload without changing the
    /// size, also after the rank was drained. Ranks outside the capacity are
    /// rejected and `false` is returned.
    pub fn put(&self, rank: usize, payload: T) -> bool {
        let Some(slot) = self.slots.get(rank) else {
            warn!(rank, capacity = self.capacity(), "Rejected out-of-range rank");
            return false;
        };

        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *slot, Slot::Filled(payload));
        if matches!(previous, Slot::Empty) {
            self.filled.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    /// Number of ranks written so far
    pub fn size(&self) -> usize {
        self.filled.load(Ordering::SeqCst)
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }

    /// Signal that producers are finished, even if the collector is not full
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Full or closed
    pub fn is_terminal(&self) -> bool {
        self.is_full() || self.is_closed()
    }

    /// Take all stored payloads, ascending by rank.
    ///
    /// Unwritten ranks are skipped. The size counter is left untouched so it
    /// stays monotonic for observers.
    pub fn drain(&self) -> Vec<T> {
        self.drain_ranked()
            .into_iter()
            .map(RankedItem::into_item)
            .collect()
    }

    /// Take all stored payloads together with their ranks, ascending by rank
    pub fn drain_ranked(&self) -> Vec<RankedItem<T>> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(rank, slot)| {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match std::mem::replace(&mut *slot, Slot::Taken) {
                    Slot::Filled(item) => Some(RankedItem::new(rank, item)),
                    Slot::Empty => {
                        *slot = Slot::Empty;
                        None
                    }
                    Slot::Taken => None,
                }
            })
            .collect()
    }
}

impl<T: Send> ProgressSource for ResultCollector<T> {
    fn completed(&self) -> usize {
        self.size()
    }

    fn is_done(&self) -> bool {
        self.is_terminal()
    }
}
