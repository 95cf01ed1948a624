// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log layer error types

use thiserror::Error;
use weft_core::PlanError;
use weft_droby::DrobyError;

/// Errors raised while writing a logfile
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cycle payload of {len} bytes exceeds the frame limit")]
    FrameTooLarge { len: usize },
}

/// Errors raised while reading a logfile
///
/// Truncated trailing frames are not errors: a crash can cut the last
/// frame short, and the reader reports end-of-stream instead. These
/// variants cover everything else.
#[derive(Debug, Error)]
pub enum LogReadError {
    #[error("not a weft logfile")]
    NotALogfile,

    #[error("unsupported logfile version {0}")]
    UnsupportedVersion(u32),

    #[error("corrupted frame {frame}: {reason}")]
    Corrupted { frame: u64, reason: String },

    #[error("checksum mismatch at frame {frame}")]
    ChecksumMismatch { frame: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while replaying a logfile into a shadow plan
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Read(#[from] LogReadError),

    #[error("replaying a change failed: {0}")]
    Plan(#[from] PlanError),

    #[error("resolving a logged model failed: {0}")]
    Droby(#[from] DrobyError),

    #[error("malformed {method} record: {reason}")]
    MalformedRecord { method: String, reason: String },
}
