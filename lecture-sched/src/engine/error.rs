/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured rejection reasons for the scheduling engine.
//!
//! The `Display` text of every variant is exactly the line sent back to the
//! client, so the gateway never re-formats an engine error.  Protocol level
//! failures (`malformed-request`, `unknown-action`) live in
//! [`ProtocolError`](crate::gateway::protocol::ProtocolError) and transport
//! failures in [`GatewayError`](crate::gateway::GatewayError).
//!
//! | Variant | Taxonomy name |
//! |---|---|
//! | `InvalidTimeFormat` | `invalid-time-format` |
//! | `RoomAlreadyBooked` | `room-already-booked` |
//! | `ModuleCapacityExceeded` | `module-capacity-exceeded` |
//! | `SlotAlreadyBooked` | `slot-already-booked` |
//! | `SlotEmpty` | `slot-empty` |

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Time is not `HH:00` in 24-hour format.
    #[error("ERROR: Lectures must be on the hour (e.g., 14:00) in 24-hour format.")]
    InvalidTimeFormat { time: String },

    /// Same room, day and time already booked.
    #[error("ERROR: Room {room} is already booked at {time} on {day}.")]
    RoomAlreadyBooked {
        day: String,
        time: String,
        room: String,
    },

    /// A new module was offered while the active set is full.
    #[error("ERROR: Cannot add more than {limit} modules.")]
    ModuleCapacityExceeded { module: String, limit: usize },

    /// The (day, time) slot is taken, whatever the room.
    #[error("ERROR: Time slot already booked.")]
    SlotAlreadyBooked { day: String, time: String },

    /// Remove target does not exist.
    #[error("ERROR: No lecture found at the specified time.")]
    SlotEmpty { day: String, time: String },
}

impl ScheduleError {
    /// Taxonomy name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleError::InvalidTimeFormat { .. } => "invalid-time-format",
            ScheduleError::RoomAlreadyBooked { .. } => "room-already-booked",
            ScheduleError::ModuleCapacityExceeded { .. } => "module-capacity-exceeded",
            ScheduleError::SlotAlreadyBooked { .. } => "slot-already-booked",
            ScheduleError::SlotEmpty { .. } => "slot-empty",
        }
    }
}
