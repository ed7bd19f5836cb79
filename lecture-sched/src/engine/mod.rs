/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduling engine.
//!
//! [`ScheduleEngine`] is the single owner of the timetable.  The slot map and
//! the active-module set sit behind **one** mutex, because add and remove both
//! read one structure and then write the other; two locks would let a
//! concurrent add slip in between "no lecture left for this module" and
//! "untrack the module".
//!
//! # Uniqueness
//! A slot is keyed by `(day, time)` only.  The same-room check runs first and
//! produces its own message, but the binding constraint is one lecture per
//! day-hour across the whole timetable.
//!
//! # Example
//! ```rust,ignore
//! let engine = Arc::new(ScheduleEngine::new(&ShiftConfig::default())?);
//! engine.add_lecture("Monday", "10:00", "R101", "CS101")?;
//! let outcome = engine.process_early_lectures(); // blocks on the shift pool
//! ```

pub mod error;
pub mod shift;

pub use error::ScheduleError;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::ShiftConfig;
use crate::lecture::{hour_index, is_valid_time, Lecture, LectureId, SlotKey, DAYS, HOURS};

use shift::ShiftJob;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Maximum number of distinct modules with at least one lecture.
pub const MAX_ACTIVE_MODULES: usize = 5;

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything guarded by the engine mutex.
///
/// `BTreeMap` keeps each day's lectures in time order, so per-day snapshots
/// (and therefore shift results) are deterministic for a given timetable.
#[derive(Debug, Default)]
pub(crate) struct ScheduleState {
    slots: BTreeMap<SlotKey, Lecture>,
    modules: BTreeSet<String>,
    next_id: u64,
}

impl ScheduleState {
    fn allocate_id(&mut self) -> LectureId {
        self.next_id += 1;
        LectureId(self.next_id)
    }

    fn is_booked(&self, day: &str, time: &str) -> bool {
        self.slots.contains_key(&SlotKey::new(day, time))
    }

    /// Ids of the lectures on `day`, in slot order.
    fn day_snapshot(&self, day: &str) -> Vec<LectureId> {
        self.slots
            .values()
            .filter(|l| l.day == day)
            .map(|l| l.id)
            .collect()
    }

    /// Index in [`HOURS`] of the slot currently holding `id` on `day`.
    ///
    /// `None` if the lecture has been removed or sits outside the grid.
    pub(crate) fn hour_of(&self, day: &str, id: LectureId) -> Option<usize> {
        HOURS.iter().position(|hour| {
            self.slots
                .get(&SlotKey::new(day, hour))
                .is_some_and(|l| l.id == id)
        })
    }

    /// First free hour on `day` strictly earlier than `before`.
    pub(crate) fn earliest_free_before(&self, day: &str, before: usize) -> Option<usize> {
        HOURS[..before]
            .iter()
            .position(|hour| !self.is_booked(day, hour))
    }

    /// Moves the lecture at `(day, from)` to `(day, to)`, rewriting its time.
    pub(crate) fn relocate(&mut self, day: &str, from: &str, to: &str) -> Option<&Lecture> {
        let mut lecture = self.slots.remove(&SlotKey::new(day, from))?;
        lecture.time = to.to_string();
        let key = lecture.slot();
        self.slots.insert(key.clone(), lecture);
        self.slots.get(&key)
    }
}

/// Locks `state`, recovering the guard if a previous holder panicked.
///
/// Every mutation under the lock is a single map/set operation pair, so a
/// poisoned guard still holds a consistent timetable.
pub(crate) fn lock_state(state: &Mutex<ScheduleState>) -> MutexGuard<'_, ScheduleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Operation results ─────────────────────────────────────────────────────────

/// Successful add.  Displays as the confirmation line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled(pub Lecture);

impl fmt::Display for Scheduled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.0;
        write!(
            f,
            "Lecture scheduled: {} on {} at {} in room {}",
            l.module, l.day, l.time, l.room
        )
    }
}

/// Successful remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub lecture: Lecture,
    /// `true` when this was the module's last lecture and it left the
    /// active set.
    pub module_retired: bool,
}

impl fmt::Display for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module_retired {
            write!(
                f,
                "Lecture removed and module '{}' removed from system.",
                self.lecture.module
            )
        } else {
            write!(
                f,
                "Lecture removed from {} at {}",
                self.lecture.day, self.lecture.time
            )
        }
    }
}

/// One cell of the 5 × 9 display grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridCell {
    Booked(Lecture),
    Free {
        day: &'static str,
        time: &'static str,
    },
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridCell::Booked(lecture) => fmt::Display::fmt(lecture, f),
            GridCell::Free { day, time } => write!(f, "EMPTY | Day: {day} | Time: {time}"),
        }
    }
}

/// Result of a schedule display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleView {
    /// Nothing is scheduled at all.
    Empty,
    /// Exactly [`GRID_SIZE`](crate::lecture::GRID_SIZE) cells, days outer,
    /// hours inner.
    Grid(Vec<GridCell>),
}

impl fmt::Display for ScheduleView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleView::Empty => f.write_str("No lectures scheduled."),
            ScheduleView::Grid(cells) => {
                for (i, cell) in cells.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    fmt::Display::fmt(cell, f)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of one early-lectures run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftOutcome {
    /// At least one lecture moved.
    pub changed: bool,
    /// Number of day jobs submitted to the pool.
    pub days: usize,
}

impl fmt::Display for ShiftOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changed {
            f.write_str("Lectures shifted earlier where possible.")
        } else {
            f.write_str("No changes made.")
        }
    }
}

// ── ScheduleEngine ────────────────────────────────────────────────────────────

/// Owner of the shared timetable and of the shift worker pool.
///
/// Share it between connections as `Arc<ScheduleEngine>`.
pub struct ScheduleEngine {
    state: Mutex<ScheduleState>,
    /// Dedicated to shift jobs; nothing else runs here.
    pool: rayon::ThreadPool,
    sequential_threshold: usize,
}

impl ScheduleEngine {
    /// Creates an empty engine and its shift pool.
    ///
    /// # Errors
    /// Fails only if the OS refuses to spawn the pool threads.
    pub fn new(config: &ShiftConfig) -> Result<Self> {
        let workers = config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("shift-worker-{i}"))
            .build()
            .context("Failed to build shift worker pool")?;

        info!(
            workers = workers,
            sequential_threshold = config.sequential_threshold,
            "schedule engine ready"
        );

        Ok(Self {
            state: Mutex::new(ScheduleState::default()),
            pool,
            sequential_threshold: config.sequential_threshold.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        lock_state(&self.state)
    }

    // ── Public operations ─────────────────────────────────────────────────────

    /// Books a lecture.
    ///
    /// Checks run in a fixed order and the first failure wins: time format,
    /// same room in the same slot, module capacity, slot occupancy.
    pub fn add_lecture(
        &self,
        day: &str,
        time: &str,
        room: &str,
        module: &str,
    ) -> Result<Scheduled, ScheduleError> {
        if !is_valid_time(time) {
            debug!(time, "rejected add: invalid time");
            return Err(ScheduleError::InvalidTimeFormat {
                time: time.to_string(),
            });
        }

        let mut state = self.lock();

        if state
            .slots
            .values()
            .any(|l| l.day == day && l.time == time && l.room == room)
        {
            return Err(ScheduleError::RoomAlreadyBooked {
                day: day.to_string(),
                time: time.to_string(),
                room: room.to_string(),
            });
        }

        if !state.modules.contains(module) && state.modules.len() >= MAX_ACTIVE_MODULES {
            return Err(ScheduleError::ModuleCapacityExceeded {
                module: module.to_string(),
                limit: MAX_ACTIVE_MODULES,
            });
        }

        let key = SlotKey::new(day, time);
        if state.slots.contains_key(&key) {
            return Err(ScheduleError::SlotAlreadyBooked {
                day: day.to_string(),
                time: time.to_string(),
            });
        }

        let id = state.allocate_id();
        let lecture = Lecture::new(id, day, time, room, module);
        state.slots.insert(key, lecture.clone());
        state.modules.insert(module.to_string());

        debug!(
            module,
            day,
            time,
            room,
            active_modules = state.modules.len(),
            "lecture added"
        );
        Ok(Scheduled(lecture))
    }

    /// Removes the lecture at `(day, time)` and retires its module if no
    /// other lecture references it.
    pub fn remove_lecture(&self, day: &str, time: &str) -> Result<Removal, ScheduleError> {
        let mut state = self.lock();

        let lecture = state
            .slots
            .remove(&SlotKey::new(day, time))
            .ok_or_else(|| ScheduleError::SlotEmpty {
                day: day.to_string(),
                time: time.to_string(),
            })?;

        let still_used = state.slots.values().any(|l| l.module == lecture.module);
        if !still_used {
            state.modules.remove(&lecture.module);
        }

        debug!(
            module = %lecture.module,
            day,
            time,
            module_retired = !still_used,
            "lecture removed"
        );
        Ok(Removal {
            lecture,
            module_retired: !still_used,
        })
    }

    /// Renders the full 5 × 9 grid, or [`ScheduleView::Empty`].
    pub fn display_schedule(&self) -> ScheduleView {
        let state = self.lock();
        if state.slots.is_empty() {
            return ScheduleView::Empty;
        }

        let cells = DAYS
            .into_iter()
            .flat_map(|day| HOURS.into_iter().map(move |time| (day, time)))
            .map(|(day, time)| match state.slots.get(&SlotKey::new(day, time)) {
                Some(lecture) => GridCell::Booked(lecture.clone()),
                None => GridCell::Free { day, time },
            })
            .collect();

        ScheduleView::Grid(cells)
    }

    /// Moves lectures towards earlier free slots of their own day.
    ///
    /// Blocks the calling thread until every day job has finished.  Call it
    /// from a blocking context (see [`spawn_early_lectures`](Self::spawn_early_lectures)).
    pub fn process_early_lectures(&self) -> ShiftOutcome {
        let jobs: Vec<(&'static str, Vec<LectureId>)> = {
            let state = self.lock();
            DAYS.into_iter()
                .map(|day| (day, state.day_snapshot(day)))
                .filter(|(_, lectures)| !lectures.is_empty())
                .collect()
        };

        info!(days = jobs.len(), "early-lectures run started");

        let changed = self.pool.install(|| {
            jobs.par_iter()
                .map(|(day, lectures)| {
                    ShiftJob::new(&self.state, day, lectures, self.sequential_threshold).compute()
                })
                .reduce(|| false, |a, b| a || b)
        });

        let outcome = ShiftOutcome {
            changed,
            days: jobs.len(),
        };
        info!(
            changed = outcome.changed,
            days = outcome.days,
            "early-lectures run finished"
        );
        outcome
    }

    /// Runs [`process_early_lectures`](Self::process_early_lectures) on the
    /// tokio blocking pool.
    ///
    /// The handle is the only way to learn the outcome.  Dropping it detaches
    /// the job, which still runs to completion.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn spawn_early_lectures(self: &Arc<Self>) -> tokio::task::JoinHandle<ShiftOutcome> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.process_early_lectures())
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn lecture_at(&self, day: &str, time: &str) -> Option<Lecture> {
        self.lock().slots.get(&SlotKey::new(day, time)).cloned()
    }

    pub fn lecture_count(&self) -> usize {
        self.lock().slots.len()
    }

    /// Sorted snapshot of the active module set.
    pub fn active_modules(&self) -> Vec<String> {
        self.lock().modules.iter().cloned().collect()
    }

    /// Hour indices booked on `day`, ascending.  Off-grid times are omitted.
    pub fn booked_hours(&self, day: &str) -> Vec<usize> {
        self.lock()
            .slots
            .values()
            .filter(|l| l.day == day)
            .filter_map(|l| hour_index(&l.time))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
