// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire packets
//!
//! Everything on an interface connection is one of these, serialized
//! as JSON behind a 4-byte big-endian length prefix. Calls are
//! answered strictly in order by `Reply` or `BadCall`; everything else
//! is pushed by the server between replies.

use crate::jobs::{JobId, JobState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_core::ArgDef;
use weft_droby::DrobyValue;

/// Version announced in the opening handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// One action the server can instantiate, advertised in its hello
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgDef>,
}

/// Severity attached to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// First packet in both directions
    Hello {
        version: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        actions: Vec<ActionDescription>,
    },
    Call {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<String>,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<DrobyValue>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        kwargs: BTreeMap<String, DrobyValue>,
    },
    Reply {
        value: DrobyValue,
    },
    /// The call could not be carried out
    BadCall {
        message: String,
    },
    CycleEnd {
        cycle_index: u64,
    },
    Notification {
        level: NotificationLevel,
        message: String,
    },
    UiEvent {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<DrobyValue>,
    },
    JobProgress {
        job: JobId,
        state: JobState,
        name: String,
    },
    /// Unhandled execution exception, marshalled
    Exception {
        exception: DrobyValue,
    },
}

impl Packet {
    /// Wire tag of this packet, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Hello { .. } => "hello",
            Packet::Call { .. } => "call",
            Packet::Reply { .. } => "reply",
            Packet::BadCall { .. } => "bad_call",
            Packet::CycleEnd { .. } => "cycle_end",
            Packet::Notification { .. } => "notification",
            Packet::UiEvent { .. } => "ui_event",
            Packet::JobProgress { .. } => "job_progress",
            Packet::Exception { .. } => "exception",
        }
    }
}

// ---- wire map helpers ----------------------------------------------------

/// Build a string-keyed entry for a [`DrobyValue::Map`]
pub(crate) fn entry(key: &str, value: DrobyValue) -> (DrobyValue, DrobyValue) {
    (
        DrobyValue::Str {
            value: key.to_string(),
        },
        value,
    )
}

/// Look up a string key in [`DrobyValue::Map`] entries
pub(crate) fn map_get<'a>(
    entries: &'a [(DrobyValue, DrobyValue)],
    key: &str,
) -> Option<&'a DrobyValue> {
    entries.iter().find_map(|(k, v)| match k {
        DrobyValue::Str { value } if value == key => Some(v),
        _ => None,
    })
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
