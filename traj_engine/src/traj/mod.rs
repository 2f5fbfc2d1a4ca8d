//! # Trajectory container
//!
//! A [`Trajectory`] is an ordered list of segments with the state recorded at
//! the start of each. Sampling is analytic, any time within the trajectory
//! maps to exactly one segment and the same time always yields the same
//! state. A cursor remembers the last sampled segment since callers almost
//! always sample with monotonically increasing times.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod segment;

pub use segment::Segment;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::cell::Cell;

use crate::constraints::is_limited;
use crate::state::KinematicState;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// An ordered sequence of segments forming a complete path.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    segments: Vec<Segment>,
    start_states: Vec<KinematicState>,
    start_times: Vec<f64>,
    total_duration_s: f64,

    /// Index of the segment hit by the most recent sample.
    cursor: Cell<usize>,

    /// End state override, set when the final segment's analytic end differs
    /// from the state the path should report (e.g. an infinite pause placed
    /// where a turn would have ended).
    end_state_override: Option<KinematicState>,

    end_state_cache: Cell<Option<KinematicState>>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total duration in seconds. May be unlimited, see
    /// [`crate::constraints::is_limited`].
    pub fn duration_s(&self) -> f64 {
        self.total_duration_s
    }

    /// True if any segment only approximates the limited dynamics, in which
    /// case the owner should re-plan from sampled states periodically.
    pub fn any_approximation(&self) -> bool {
        self.segments.iter().any(|s| s.is_approximation())
    }

    /// Append a segment starting from the given state.
    pub fn append(&mut self, segment: Segment, start_state: KinematicState) {
        self.start_times.push(self.total_duration_s);
        self.total_duration_s += segment.duration_s();
        self.segments.push(segment);
        self.start_states.push(start_state);
        self.end_state_override = None;
        self.end_state_cache.set(None);
    }

    /// Append a segment and force the trajectory's reported end state.
    pub fn append_with_end(
        &mut self,
        segment: Segment,
        start_state: KinematicState,
        end_state: KinematicState,
    ) {
        self.append(segment, start_state);
        self.end_state_override = Some(end_state);
        self.end_state_cache.set(None);
    }

    /// Remove and return the last segment with its start state.
    pub fn pop_back(&mut self) -> Option<(Segment, KinematicState)> {
        let segment = self.segments.pop()?;
        let start_state = self.start_states.pop()?;
        let start_time = self.start_times.pop()?;
        self.total_duration_s = start_time;
        self.end_state_override = None;
        self.end_state_cache.set(None);
        Some((segment, start_state))
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.start_states.clear();
        self.start_times.clear();
        self.total_duration_s = 0.0;
        self.cursor.set(0);
        self.end_state_override = None;
        self.end_state_cache.set(None);
    }

    /// State at `time_s` seconds from the start of the trajectory.
    ///
    /// Times beyond the end return the end state, negative times the start
    /// state. Returns `None` only when the trajectory is empty.
    pub fn get_state(&self, time_s: f64) -> Option<KinematicState> {
        if self.segments.is_empty() {
            return None;
        }
        if time_s >= self.total_duration_s {
            return self.end_state();
        }

        let index = self.segment_index_at(time_s.max(0.0));
        self.cursor.set(index);

        let dt = time_s - self.start_times[index];
        Some(self.segments[index].compute_state(&self.start_states[index], dt))
    }

    /// State at the end of the trajectory, `None` when empty.
    ///
    /// For a trajectory ending in an unlimited segment this is the state at
    /// the start of that segment, there is no meaningful end to report.
    pub fn end_state(&self) -> Option<KinematicState> {
        if let Some(state) = self.end_state_override {
            return Some(state);
        }
        if let Some(state) = self.end_state_cache.get() {
            return Some(state);
        }

        let segment = self.segments.last()?;
        let start_state = self.start_states.last()?;

        let state = if is_limited(segment.duration_s()) {
            segment.compute_state(start_state, segment.duration_s())
        } else {
            *start_state
        };

        self.end_state_cache.set(Some(state));
        Some(state)
    }

    /// Index of the segment containing `time_s`, preferring the cursor.
    fn segment_index_at(&self, time_s: f64) -> usize {
        let cursor = self.cursor.get();
        if cursor < self.segments.len() {
            let start = self.start_times[cursor];
            if time_s >= start && time_s < start + self.segments[cursor].duration_s() {
                return cursor;
            }
        }

        // partition_point gives the first start time greater than time_s
        let index = self.start_times.partition_point(|&t| t <= time_s);
        index.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
