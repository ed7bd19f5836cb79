/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Line protocol: `ACTION|DAY|TIME|ROOM|MODULE`.
//!
//! Every request is one line with exactly five `|`-separated fields (extra
//! fields are ignored, empty fields are allowed).  The action is matched
//! case-insensitively.  `STOP` on its own ends the session.

use std::fmt;

use thiserror::Error;

// ── Fixed literals ────────────────────────────────────────────────────────────

pub const FIELD_DELIMITER: char = '|';

pub const STOP: &str = "STOP";

/// Reply to `STOP`, sent just before the server closes the connection.
pub const TERMINATE: &str = "TERMINATE";

/// Immediate reply to `EARLY LECTURES`.  The job's outcome is never sent.
pub const SHIFT_ACK: &str = "Shifting Lectures To Earlier Timeslots";

const FIELD_COUNT: usize = 5;

// ── Action ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AddLecture,
    RemoveLecture,
    DisplaySchedule,
    EarlyLectures,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::AddLecture => "ADD LECTURE",
            Action::RemoveLecture => "REMOVE LECTURE",
            Action::DisplaySchedule => "DISPLAY SCHEDULE",
            Action::EarlyLectures => "EARLY LECTURES",
        }
    }

    /// Matches an already upper-cased action field.
    fn from_upper(action: &str) -> Option<Self> {
        match action {
            "ADD LECTURE" => Some(Action::AddLecture),
            "REMOVE LECTURE" => Some(Action::RemoveLecture),
            "DISPLAY SCHEDULE" => Some(Action::DisplaySchedule),
            "EARLY LECTURES" => Some(Action::EarlyLectures),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Stop,
    Command {
        action: Action,
        day: String,
        time: String,
        room: String,
        module: String,
    },
}

/// Request lines the gateway answers with an error and then keeps reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer than five fields.
    #[error("ERROR: Invalid request format.")]
    Malformed { fields: usize },

    /// Action outside the fixed vocabulary; carries the upper-cased text.
    #[error("Invalid action: {0}")]
    UnknownAction(String),
}

impl ProtocolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Malformed { .. } => "malformed-request",
            ProtocolError::UnknownAction(_) => "unknown-action",
        }
    }
}

impl Request {
    /// Parses one line (without its terminator).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line.eq_ignore_ascii_case(STOP) {
            return Ok(Request::Stop);
        }

        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() < FIELD_COUNT {
            return Err(ProtocolError::Malformed {
                fields: fields.len(),
            });
        }

        let action_text = fields[0].to_uppercase();
        let action =
            Action::from_upper(&action_text).ok_or(ProtocolError::UnknownAction(action_text))?;

        Ok(Request::Command {
            action,
            day: fields[1].to_string(),
            time: fields[2].to_string(),
            room: fields[3].to_string(),
            module: fields[4].to_string(),
        })
    }

    /// Convenience constructor for callers that build requests in code.
    pub fn command(action: Action, day: &str, time: &str, room: &str, module: &str) -> Self {
        Request::Command {
            action,
            day: day.to_string(),
            time: time.to_string(),
            room: room.to_string(),
            module: module.to_string(),
        }
    }

    /// Wire form of this request, without the line terminator.
    pub fn to_line(&self) -> String {
        match self {
            Request::Stop => STOP.to_string(),
            Request::Command {
                action,
                day,
                time,
                room,
                module,
            } => format!("{action}|{day}|{time}|{room}|{module}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
