/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Parallel early-lectures shift.
//!
//! One [`ShiftJob`] covers the lectures of a single day.  Lists longer than
//! the sequential threshold are halved: the left half is forked onto the
//! shift pool, the right half runs inline, and the job joins both before
//! returning `left || right`.  Depth is `O(log n)` in the day's lecture count.
//!
//! # Per-lecture critical section
//! For each lecture the engine lock is held across the whole
//! "find current hour → scan earlier hours → move" sequence.  Releasing it
//! between candidate hours would let two subtasks both see the same hour as
//! free and double-book it.
//!
//! The move is greedy: first free earlier hour wins, one move per lecture,
//! lectures handled in snapshot order.

use std::sync::Mutex;

use tracing::debug;

use crate::lecture::{LectureId, HOURS};

use super::{lock_state, ScheduleState};

pub(crate) struct ShiftJob<'a> {
    state: &'a Mutex<ScheduleState>,
    day: &'a str,
    lectures: &'a [LectureId],
    threshold: usize,
}

impl<'a> ShiftJob<'a> {
    pub(crate) fn new(
        state: &'a Mutex<ScheduleState>,
        day: &'a str,
        lectures: &'a [LectureId],
        threshold: usize,
    ) -> Self {
        Self {
            state,
            day,
            lectures,
            threshold: threshold.max(1),
        }
    }

    fn sub_job(&self, lectures: &'a [LectureId]) -> Self {
        Self {
            state: self.state,
            day: self.day,
            lectures,
            threshold: self.threshold,
        }
    }

    /// Returns `true` if any lecture in this job moved.
    ///
    /// Must run inside the shift pool (`ThreadPool::install`) so the forked
    /// half lands on the same pool.
    pub(crate) fn compute(&self) -> bool {
        if self.lectures.len() <= self.threshold {
            return self.shift_sequential();
        }

        let (left, right) = self.lectures.split_at(self.lectures.len() / 2);
        let left_job = self.sub_job(left);
        let right_job = self.sub_job(right);

        // rayon::join runs the first closure on this thread and makes the
        // second one stealable.
        let (right_changed, left_changed) =
            rayon::join(|| right_job.compute(), || left_job.compute());

        left_changed || right_changed
    }

    fn shift_sequential(&self) -> bool {
        let mut changed = false;
        for &id in self.lectures {
            changed |= self.shift_one(id);
        }
        changed
    }

    fn shift_one(&self, id: LectureId) -> bool {
        let mut state = lock_state(self.state);

        // Removed since the snapshot, or parked outside the grid.
        let Some(current) = state.hour_of(self.day, id) else {
            return false;
        };
        if current == 0 {
            return false;
        }
        let Some(target) = state.earliest_free_before(self.day, current) else {
            return false;
        };

        let Some(lecture) = state.relocate(self.day, HOURS[current], HOURS[target]) else {
            return false;
        };
        debug!(
            module = %lecture.module,
            day = self.day,
            from = HOURS[current],
            to = HOURS[target],
            "lecture shifted earlier"
        );
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
