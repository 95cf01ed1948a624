// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface error types
//!
//! Failures split along the line the protocol draws: [`ComError`] is
//! the transport giving up, [`ProtocolError`] is a peer speaking the
//! protocol wrong. Both are fatal to the connection they happen on.

use crate::jobs::{JobId, JobState};
use thiserror::Error;

/// Transport-level failure. The connection is unusable afterwards.
#[derive(Debug, Error)]
pub enum ComError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection")]
    ClosedPeer,

    #[error("write buffer full: {buffered} bytes pending, limit {limit}")]
    WriteBufferFull { buffered: usize, limit: usize },

    #[error("channel used from a thread other than its owner")]
    WrongThread,
}

/// The peer violated the wire protocol. The byte stream cannot be
/// trusted afterwards, so the connection must be dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("received a reply with no outstanding call")]
    UnexpectedReply,

    #[error("unexpected {0} packet")]
    UnexpectedPacket(&'static str),

    #[error("handshake failed: {0}")]
    BadHandshake(String),
}

/// Either kind of channel failure
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Com(#[from] ComError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Outcome of a client-side call
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Com(#[from] ComError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no reply within the call timeout")]
    Timeout,

    #[error("remote call failed: {message}")]
    Remote { message: String },

    #[error("reply was not {expected}")]
    BadReply { expected: &'static str },
}

impl From<ChannelError> for CallError {
    fn from(error: ChannelError) -> Self {
        match error {
            ChannelError::Com(error) => CallError::Com(error),
            ChannelError::Protocol(error) => CallError::Protocol(error),
        }
    }
}

/// Server-side interface failures
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("unknown interface method {0:?}")]
    UnknownMethod(String),

    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("malformed call arguments: {0}")]
    BadArguments(String),

    #[error("action {name:?} ended as {state} (job {job})")]
    FailedAction {
        name: String,
        job: JobId,
        state: JobState,
    },

    #[error("monitoring job {job} failed while job {main} was still running")]
    FailedBackgroundJob { job: JobId, main: JobId },

    #[error(transparent)]
    Plan(#[from] weft_core::PlanError),

    #[error(transparent)]
    Engine(#[from] weft_engine::EngineError),

    #[error(transparent)]
    Droby(#[from] weft_droby::DrobyError),
}
