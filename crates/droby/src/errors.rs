// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Marshalling errors

use crate::ids::DrobyId;
use thiserror::Error;
use weft_core::PlanError;

/// Errors raised while dumping or resolving marshalled values
#[derive(Debug, Error)]
pub enum DrobyError {
    /// An id reference arrived for which no sibling is known
    #[error("no local object for {0}")]
    NoLocalObject(DrobyId),

    /// A model name resolved locally, but to an object already bound to
    /// a different identity
    #[error("local model {name} is bound to a different identity than {id}")]
    MismatchingLocalConstant { name: String, id: DrobyId },

    /// A dumped model could neither be found nor reconstructed
    #[error("cannot resolve model {name}")]
    ConstantResolutionFailed { name: String },

    /// A tagged value named a codec the registry does not know
    #[error("unknown type tag {0:?}")]
    UnknownTag(String),

    /// A value does not fit the shape its tag or context requires
    #[error("malformed {tag} value: {detail}")]
    MalformedValue { tag: String, detail: String },

    #[error(transparent)]
    Plan(#[from] PlanError),
}
