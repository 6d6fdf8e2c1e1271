//! The future-event list of a `Context`.
//!
//! `Queue<T>` holds payloads keyed by virtual time. Payloads scheduled for
//! the same instant come out in the order they were added, which is what
//! makes a run reproducible from its seed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Time-ordered queue with FIFO tie-breaking.
pub struct Queue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_sequence: u64,
}

impl<T> Queue<T> {
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Adds `data` at `time`. Times must not be NaN.
    pub fn add_plan(&mut self, time: f64, data: T) -> PlanId {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Entry {
            time,
            sequence,
            data,
        });
        PlanId(sequence)
    }

    /// Time of the earliest plan.
    #[must_use]
    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.time)
    }

    /// Removes and returns the earliest plan.
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.heap.pop().map(|entry| Plan {
            time: entry.time,
            data: entry.data,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry<T> {
    time: f64,
    sequence: u64,
    data: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `BinaryHeap` pops the greatest entry, so earlier times and lower sequence
// numbers must compare greater.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Position of a plan in scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanId(u64);

/// A payload together with the time it is due.
pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}
