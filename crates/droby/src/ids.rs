// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process object identity
//!
//! A [`DrobyId`] pairs the minting peer with a peer-local sequence
//! number. Ids are stable for the lifetime of the pairing: once an
//! object has been shared under an id, every later reference to it on
//! that link uses the same id.

use serde::{Deserialize, Serialize};

/// Identity of one process on a droby link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub uuid::Uuid);

impl PeerId {
    pub fn new() -> Self {
        PeerId(uuid::Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a shared object: minting peer plus a sequence
/// number local to that peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrobyId {
    pub peer: PeerId,
    pub local: u64,
}

impl std::fmt::Display for DrobyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.peer, self.local)
    }
}
