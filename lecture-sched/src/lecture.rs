/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core timetable data structures.
//!
//! ```text
//! client ──(ADD LECTURE|day|time|room|module)──►  Lecture  ──►  Schedule[SlotKey]
//!                                                   ↑
//!                                   time rewritten in place by the shift job
//! ```
//!
//! The timetable is a fixed grid of [`DAYS`] × [`HOURS`].  A lecture lives
//! at exactly one [`SlotKey`]; the key is built from day and time only, so
//! two rooms can never share a slot.

use std::fmt;

// ── Fixed vocabularies ────────────────────────────────────────────────────────

/// Teaching days, in display order.
pub const DAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

/// Teaching hours, earliest first.  The shift job only ever moves a lecture
/// towards index 0 of this array.
pub const HOURS: [&str; 9] = [
    "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00",
];

/// Number of grid cells rendered by a schedule display.
pub const GRID_SIZE: usize = DAYS.len() * HOURS.len();

/// Returns `true` if `time` is exactly `HH:00` with `HH` in `00..=23`.
///
/// Hours outside the teaching window (e.g. `"08:00"`) are accepted here; they
/// are stored but never displayed or shifted.
pub fn is_valid_time(time: &str) -> bool {
    let bytes = time.as_bytes();
    if bytes.len() != 5 || &bytes[2..] != b":00" {
        return false;
    }
    if !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() {
        return false;
    }
    let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    hour <= 23
}

/// Position of `time` in [`HOURS`], or `None` for off-grid times.
pub fn hour_index(time: &str) -> Option<usize> {
    HOURS.iter().position(|h| *h == time)
}

// ── SlotKey ───────────────────────────────────────────────────────────────────

/// Schedule map key: `"<day> <time>"`.
///
/// Room is deliberately not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey(String);

impl SlotKey {
    pub fn new(day: &str, time: &str) -> Self {
        SlotKey(format!("{day} {time}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Lecture ───────────────────────────────────────────────────────────────────

/// Engine-assigned identity of a lecture.
///
/// Never sent over the wire.  Shift jobs work from a snapshot, so they need a
/// way to find a lecture again after another job has moved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LectureId(pub u64);

/// One scheduled lecture.
///
/// # Lifecycle
/// Created by a successful add, `time` rewritten only by the shift job,
/// dropped by a successful remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lecture {
    pub id: LectureId,
    pub day: String,
    pub time: String,
    pub room: String,
    pub module: String,
}

impl Lecture {
    pub fn new(
        id: LectureId,
        day: impl Into<String>,
        time: impl Into<String>,
        room: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            id,
            day: day.into(),
            time: time.into(),
            room: room.into(),
            module: module.into(),
        }
    }

    /// Key of the slot this lecture currently occupies.
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(&self.day, &self.time)
    }
}

/// Wire descriptor used inside a schedule display.
impl fmt::Display for Lecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Module: {} | Day: {} | Time: {} | Room: {}",
            self.module, self.day, self.time, self.room
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_times_are_accepted() {
        for t in ["00:00", "09:00", "14:00", "17:00", "23:00"] {
            assert!(is_valid_time(t), "{t} should be valid");
        }
    }

    #[test]
    fn off_hour_and_malformed_times_are_rejected() {
        for t in [
            "24:00", "14:30", "9:00", "14:00 ", "1400", "ab:00", "", "14:0", "-1:00", "14:000",
        ] {
            assert!(!is_valid_time(t), "{t:?} should be rejected");
        }
    }

    #[test]
    fn hour_index_covers_teaching_window_only() {
        assert_eq!(hour_index("09:00"), Some(0));
        assert_eq!(hour_index("17:00"), Some(8));
        assert_eq!(hour_index("08:00"), None);
        assert_eq!(hour_index("18:00"), None);
    }

    #[test]
    fn grid_is_five_by_nine() {
        assert_eq!(GRID_SIZE, 45);
    }

    #[test]
    fn slot_key_ignores_room() {
        let a = Lecture::new(LectureId(1), "Monday", "10:00", "R101", "CS101");
        let b = Lecture::new(LectureId(2), "Monday", "10:00", "R102", "CS102");
        assert_eq!(a.slot(), b.slot());
        assert_eq!(a.slot().as_str(), "Monday 10:00");
    }

    #[test]
    fn lecture_descriptor_format() {
        let l = Lecture::new(LectureId(7), "Friday", "16:00", "B2", "MA4001");
        assert_eq!(
            l.to_string(),
            "Module: MA4001 | Day: Friday | Time: 16:00 | Room: B2"
        );
    }
}
