// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-interface: the remote face of a running engine
//!
//! Clients connect over a length-prefixed JSON protocol, exchange a
//! hello, and from then on send ordered calls and receive ordered
//! replies plus the server's per-cycle broadcast: job progress,
//! notifications, exceptions and cycle-end markers. The server side
//! lives on the engine thread and pumps every connection between
//! cycles; jobs are the missions it starts and tracks on a client's
//! behalf.

pub mod actions;
pub mod binding;
pub mod channel;
pub mod client;
pub mod config;
pub mod errors;
pub mod interface;
pub mod jobs;
pub mod packet;
pub mod server;

pub use actions::{ActionFactory, ActionRegistry};
pub use binding::{Binding, BoundStream, NullBinding, NullConnector, TcpBinding, UnixBinding};
pub use channel::Channel;
pub use client::{BatchContext, BatchResult, CallCallback, CallOutcome, Client};
pub use config::InterfaceConfig;
pub use errors::{CallError, ChannelError, ComError, InterfaceError, ProtocolError};
pub use interface::Interface;
pub use jobs::{JobId, JobRecord, JobState, JobTracker, JobUpdate};
pub use packet::{ActionDescription, NotificationLevel, Packet, PROTOCOL_VERSION};
pub use server::Server;
