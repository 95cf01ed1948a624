// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log replay into a shadow plan
//!
//! The rebuilder consumes logged cycles in order and maintains a plan
//! with the same structure the logged engine had: model records resolve
//! through a marshaller into the local constant table, change records
//! replay through [`Plan::apply`] under the origin's handles. Unknown
//! record methods are skipped with a warning so newer logfiles stay
//! readable.

use crate::errors::RebuildError;
use crate::logfile::Reader;
use crate::message::{CycleEndRecord, LogMessage, METHOD_CYCLE_END, METHOD_EXCEPTION, METHOD_MODEL};
use serde::de::DeserializeOwned;
use std::path::Path;
use weft_core::{Plan, PlanChange, PlanId};
use weft_droby::{DrobyValue, ExceptionDump, Marshaller, ModelDump, PeerId, TypeRegistry};

pub struct PlanRebuilder {
    plan: Plan,
    marshaller: Marshaller,
    source_plan: Option<PlanId>,
    cycles_applied: u64,
    last_cycle: Option<CycleEndRecord>,
    exceptions: Vec<ExceptionDump>,
}

impl Default for PlanRebuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanRebuilder {
    pub fn new() -> Self {
        Self {
            plan: Plan::new(),
            marshaller: Marshaller::new(PeerId::new(), TypeRegistry::with_builtins()),
            source_plan: None,
            cycles_applied: 0,
            last_cycle: None,
            exceptions: Vec::new(),
        }
    }

    /// Replay a whole logfile
    pub fn rebuild(path: &Path) -> Result<Self, RebuildError> {
        let mut reader = Reader::open(path)?;
        let mut rebuilder = Self::new();
        while let Some(messages) = reader.load_one_cycle()? {
            rebuilder.apply_cycle(&messages)?;
        }
        Ok(rebuilder)
    }

    /// The rebuilt plan
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }

    /// Marshaller used to resolve logged models. Registering local
    /// constants here before replay makes model records resolve to them
    /// instead of rebuilding stubs.
    pub fn marshaller_mut(&mut self) -> &mut Marshaller {
        &mut self.marshaller
    }

    pub fn cycles_applied(&self) -> u64 {
        self.cycles_applied
    }

    pub fn last_cycle(&self) -> Option<&CycleEndRecord> {
        self.last_cycle.as_ref()
    }

    /// Exceptions the logged engine raised, in log order
    pub fn exceptions(&self) -> &[ExceptionDump] {
        &self.exceptions
    }

    /// Replay one cycle frame
    pub fn apply_cycle(&mut self, messages: &[LogMessage]) -> Result<(), RebuildError> {
        for message in messages {
            self.apply_message(message)?;
        }
        Ok(())
    }

    fn apply_message(&mut self, message: &LogMessage) -> Result<(), RebuildError> {
        if self.source_plan.is_none() {
            // Adopt the origin's plan identity before anything is applied
            self.source_plan = Some(message.plan);
            self.plan = Plan::with_id(message.plan);
        }

        match message.method.as_str() {
            METHOD_MODEL => {
                let dump: ModelDump = parse(message)?;
                let model = self.marshaller.local_model(&DrobyValue::Model(dump))?;
                self.plan.register_model(model);
            }
            METHOD_EXCEPTION => {
                let dump: ExceptionDump = parse(message)?;
                self.exceptions.push(dump);
            }
            METHOD_CYCLE_END => {
                let record: CycleEndRecord = parse(message)?;
                self.cycles_applied += 1;
                self.last_cycle = Some(record);
            }
            _ => match serde_json::from_value::<PlanChange>(message.args.clone()) {
                Ok(change) => self.plan.apply(&change)?,
                Err(error) => {
                    tracing::warn!(method = %message.method, error = %error, "skipping unknown log record");
                }
            },
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(message: &LogMessage) -> Result<T, RebuildError> {
    serde_json::from_value(message.args.clone()).map_err(|error| RebuildError::MalformedRecord {
        method: message.method.clone(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
#[path = "rebuilder_tests.rs"]
mod tests;
