// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-log: event logging and plan rebuilding
//!
//! The [`EventLogger`] is a cycle sink that writes each cycle report as
//! one checksummed frame in a logfile. The [`PlanRebuilder`] reads the
//! frames back and replays them into a shadow plan, reproducing the
//! logged plan structure cycle by cycle. Log replay is also how offline
//! tooling inspects an execution after the fact.

pub mod errors;
pub mod logfile;
pub mod logger;
pub mod message;
pub mod rebuilder;

pub use errors::{LogError, LogReadError, RebuildError};
pub use logfile::{LogCorruption, LogValidation, Reader, Writer, FORMAT_VERSION, MAGIC};
pub use logger::EventLogger;
pub use message::{CycleEndRecord, LogMessage};
pub use rebuilder::PlanRebuilder;
