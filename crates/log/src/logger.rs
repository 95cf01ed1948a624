// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event logger sink
//!
//! Plugged into the engine as a cycle sink, the logger turns each cycle
//! report into one logfile frame. Models are dumped once, right before
//! the first task record that needs them, so replay can resolve every
//! model from the stream alone. Frames are written whole at cycle end;
//! closing the logger never leaves a partial cycle behind.

use crate::errors::LogError;
use crate::logfile::Writer;
use crate::message::{CycleEndRecord, LogMessage};
use std::path::Path;
use weft_core::{Plan, PlanChange};
use weft_droby::{DrobyValue, Marshaller};
use weft_engine::{CycleReport, CycleSink, SinkError};

pub struct EventLogger {
    writer: Writer,
    marshaller: Marshaller,
}

impl EventLogger {
    pub fn create(path: &Path, marshaller: Marshaller) -> Result<Self, LogError> {
        Ok(Self {
            writer: Writer::create(path)?,
            marshaller,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.frames_written()
    }

    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    fn cycle_messages(
        &mut self,
        report: &CycleReport,
        plan: &Plan,
    ) -> Result<Vec<LogMessage>, LogError> {
        let plan_id = plan.id();
        let mut messages = Vec::with_capacity(report.changes.len() + 1);

        for change in &report.changes {
            if let PlanChange::TaskAdded { model, .. } = change {
                if !self.marshaller.model_registered(model) {
                    match plan.model(model) {
                        Ok(resolved) => {
                            if let DrobyValue::Model(dump) = self.marshaller.dump_model(resolved) {
                                messages.push(LogMessage::model(
                                    plan_id,
                                    report.end_time,
                                    &dump,
                                )?);
                            }
                        }
                        Err(error) => {
                            tracing::warn!(model = %model, error = %error, "model missing from the plan registry, not logged");
                        }
                    }
                }
            }
            messages.push(LogMessage::change(plan_id, report.end_time, change)?);
        }

        for exception in &report.exceptions {
            if let DrobyValue::Exception(dump) = self.marshaller.dump_exception(exception) {
                messages.push(LogMessage::exception(plan_id, exception.error.time, &dump)?);
            }
        }

        messages.push(LogMessage::cycle_end(
            plan_id,
            &CycleEndRecord {
                cycle_index: report.cycle_index,
                start_time: report.start_time,
                end_time: report.end_time,
                stats: report.stats,
            },
        )?);
        Ok(messages)
    }
}

impl CycleSink for EventLogger {
    fn cycle_end(&mut self, report: &CycleReport, plan: &Plan) -> Result<(), SinkError> {
        let messages = self.cycle_messages(report, plan)?;
        self.writer.append_cycle(&messages)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.writer.sync()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
