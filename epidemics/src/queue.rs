//! Min-priority event queue with lazy invalidation.
//!
//! Entries are ordered by:
//! 1. Time (earlier first)
//! 2. Sequence number (insertion order, so ties are deterministic)
//!
//! Invalidating an event only forgets its payload. The heap entry stays
//! behind and is skipped when it reaches the top, which keeps
//! [`EventQueue::invalidate`] O(1).

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use crate::error::EpidemicError;

/// Handle to a scheduled event, used to invalidate it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(u64);

/// Heap key. Payloads live in [`EventQueue::pending`].
#[derive(Debug, Clone, Copy)]
struct EntryKey {
    time: f64,
    sequence: u64,
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.total_cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EntryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntryKey {}

/// Event schedule with a simulation clock.
///
/// # Invariants
///
/// - No pending event is earlier than `clock`.
/// - `clock` never decreases.
/// - Every heap entry without a pending payload is stale and is counted in
///   `discarded()` once it is removed.
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Reverse<EntryKey>>,
    pending: HashMap<u64, E>,
    next_sequence: u64,
    clock: f64,
    discarded: u64,
}

impl<E> EventQueue<E> {
    /// Create an empty queue with the clock at `start_time`.
    #[must_use]
    pub fn new(start_time: f64) -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_sequence: 0,
            clock: start_time,
            discarded: 0,
        }
    }

    /// Current simulation clock: the time of the last popped event.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    /// Number of valid pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Number of stale heap entries removed so far.
    #[must_use]
    pub const fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Whether the event behind `handle` is still pending.
    #[must_use]
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains_key(&handle.0)
    }

    /// Whether no valid event is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedule `event` at `time`.
    ///
    /// # Pre-conditions
    /// - `time >= clock()`
    ///
    /// # Post-conditions
    /// - `len()` increased by 1
    /// - The returned handle is pending until popped or invalidated
    ///
    /// # Errors
    ///
    /// Returns [`EpidemicError::InvalidTime`] if `time` is NaN or earlier
    /// than the clock.
    pub fn schedule(&mut self, time: f64, event: E) -> Result<EventHandle, EpidemicError> {
        if time.is_nan() || time < self.clock {
            return Err(EpidemicError::InvalidTime {
                time,
                clock: self.clock,
            });
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(EntryKey { time, sequence }));
        self.pending.insert(sequence, event);
        Ok(EventHandle(sequence))
    }

    /// Mark an event as stale. Returns whether it was still pending.
    ///
    /// Invalidating an event that already fired or was already invalidated
    /// is a no-op.
    pub fn invalidate(&mut self, handle: EventHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    /// Time of the earliest valid event, discarding stale entries on top.
    pub fn peek_time(&mut self) -> Option<f64> {
        while let Some(Reverse(key)) = self.heap.peek() {
            if self.pending.contains_key(&key.sequence) {
                return Some(key.time);
            }
            self.heap.pop();
            self.discarded += 1;
        }
        None
    }

    /// Remove and return the earliest valid event, advancing the clock to
    /// its time. Returns `None` once every event has fired or been
    /// invalidated. Stale entries passed on the way are counted in
    /// [`discarded`](Self::discarded).
    ///
    /// # Post-conditions
    /// - `clock()` did not decrease
    /// - `len()` decreased by 1 if an event was returned
    pub fn pop_next_valid(&mut self) -> Option<(f64, E)> {
        while let Some(Reverse(key)) = self.heap.pop() {
            if let Some(event) = self.pending.remove(&key.sequence) {
                debug_assert!(key.time >= self.clock, "event queue clock went backwards");
                self.clock = key.time;
                return Some((key.time, event));
            }
            self.discarded += 1;
        }
        None
    }
}
