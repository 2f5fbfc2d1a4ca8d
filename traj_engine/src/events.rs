//! # Timed event queue
//!
//! The driver schedules future work (waypoint arrivals, pause expiries) as
//! alarms on a min-heap keyed by simulation time. Scheduling hands back an
//! [`EventToken`] which cancels the alarm lazily, cancelled alarms are
//! dropped when they surface rather than removed from the heap.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use ordered_float::NotNan;
use std::cell::Cell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::constraints::is_limited;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Handle to a scheduled alarm, cancelling it prevents delivery.
#[derive(Debug, Clone)]
pub struct EventToken(Rc<Cell<bool>>);

impl EventToken {
    fn new() -> Self {
        EventToken(Rc::new(Cell::new(false)))
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug)]
struct Alarm<K> {
    time_s: NotNan<f64>,
    seq: u64,
    kind: K,
    token: EventToken,
}

impl<K> PartialEq for Alarm<K> {
    fn eq(&self, other: &Self) -> bool {
        self.time_s == other.time_s && self.seq == other.seq
    }
}

impl<K> Eq for Alarm<K> {}

impl<K> PartialOrd for Alarm<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Alarm<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time_s
            .cmp(&other.time_s)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of pending alarms.
#[derive(Debug, Default)]
pub struct EventQueue<K> {
    heap: BinaryHeap<Reverse<Alarm<K>>>,
    next_seq: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl<K> EventQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `kind` at the given simulation time.
    ///
    /// Unlimited times are not schedulable ("never"), in which case no alarm
    /// is queued and `None` is returned.
    pub fn schedule(&mut self, time_s: f64, kind: K) -> Option<EventToken> {
        if !is_limited(time_s) || time_s.is_nan() {
            return None;
        }

        let token = EventToken::new();
        let time_s = NotNan::new(time_s).ok()?;
        self.heap.push(Reverse(Alarm {
            time_s,
            seq: self.next_seq,
            kind,
            token: token.clone(),
        }));
        self.next_seq += 1;
        Some(token)
    }

    /// Pop the earliest alarm due at or before `now`, skipping cancelled
    /// ones.
    pub fn pop_due(&mut self, now_s: f64) -> Option<(f64, K)> {
        while let Some(Reverse(alarm)) = self.heap.peek() {
            if alarm.time_s.into_inner() > now_s {
                return None;
            }
            let Reverse(alarm) = self.heap.pop()?;
            if !alarm.token.is_cancelled() {
                return Some((alarm.time_s.into_inner(), alarm.kind));
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
