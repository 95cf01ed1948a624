// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! weft-droby: peer-scoped marshalling of plan objects
//!
//! Translates live plan objects into wire-safe value trees and back.
//! Each remote peer gets an [`ObjectManager`] holding the sibling maps:
//! the first dump of an object mints a stable [`DrobyId`], registers the
//! sibling, and embeds the id in the structural dump; every later dump
//! of the same object is the bare id reference. The [`TypeRegistry`]
//! dispatches custom value codecs by type tag, so application payloads
//! travel through the same tree without per-type wire code.

pub mod errors;
pub mod ids;
pub mod marshal;
pub mod object_manager;
pub mod registry;
pub mod value;

pub use errors::DrobyError;
pub use ids::{DrobyId, PeerId};
pub use marshal::Marshaller;
pub use object_manager::ObjectManager;
pub use registry::{DecodeFn, EncodeFn, TypeRegistry};
pub use value::{
    DrobyValue, EventDump, ExceptionDump, ModelDump, PlanDump, TaskDump, TAG_KEY,
};
