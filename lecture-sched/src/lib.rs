/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! lecture-sched – shared weekly lecture timetable over a line protocol
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – YAML server configuration
//! ├── lecture         – Lecture record, day / hour vocabularies
//! ├── engine/         – timetable owner, add / remove / display / shift
//! │   └── shift       – parallel early-lectures divide-and-conquer
//! └── gateway/        – TCP listener and per-connection protocol loop
//!     └── protocol    – request parsing and fixed reply literals
//! ```

pub mod config;
pub mod engine;
pub mod gateway;
pub mod lecture;
