// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface client
//!
//! Calls go out in order and are answered in order: a reply always
//! resolves the oldest outstanding call, and a reply with no
//! outstanding call is a protocol violation. Synchronous calls wait up
//! to the call timeout; a call that timed out leaves a placeholder in
//! the queue so the late reply is discarded instead of shifting every
//! later callback by one. Packets the server pushes between replies
//! (notifications, job progress, cycle ends, exceptions) are queued
//! for the application to take.

use crate::channel::Channel;
use crate::config::InterfaceConfig;
use crate::errors::{CallError, ProtocolError};
use crate::jobs::{JobId, JobState};
use crate::packet::{entry, map_get, ActionDescription, NotificationLevel, Packet, PROTOCOL_VERSION};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use weft_droby::DrobyValue;

/// What a call resolved to
pub type CallOutcome = Result<DrobyValue, CallError>;

/// Callback invoked when an asynchronous call resolves
pub type CallCallback = Box<dyn FnOnce(CallOutcome) + Send>;

enum PendingCall {
    /// A synchronous call waiting in [`Client::call`]
    Sync,
    /// A synchronous call that timed out; its reply is dropped
    Discard,
    Async(CallCallback),
}

pub struct Client<S> {
    channel: Channel<S>,
    server_version: u32,
    actions: Vec<ActionDescription>,
    pending: VecDeque<PendingCall>,
    notifications: VecDeque<(NotificationLevel, String)>,
    ui_events: VecDeque<(String, Vec<DrobyValue>)>,
    job_progress: VecDeque<(JobId, JobState, String)>,
    exceptions: VecDeque<DrobyValue>,
    cycle_index: Option<u64>,
    call_timeout: Duration,
}

// Manual impl: pending calls hold boxed callbacks, which have no Debug
impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_version", &self.server_version)
            .field("actions", &self.actions)
            .field("pending_calls", &self.pending.len())
            .field("cycle_index", &self.cycle_index)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Complete the handshake over an established stream
    pub async fn connect(stream: S, config: &InterfaceConfig) -> Result<Self, CallError> {
        let mut channel =
            Channel::with_limits(stream, config.max_frame_length, config.max_write_buffer);
        channel
            .write_packet(&Packet::Hello {
                version: PROTOCOL_VERSION,
                actions: Vec::new(),
            })
            .await?;
        channel.flush().await?;
        match channel.read_packet(Some(config.call_timeout)).await? {
            Some(Packet::Hello { version, actions }) => Ok(Self {
                channel,
                server_version: version,
                actions,
                pending: VecDeque::new(),
                notifications: VecDeque::new(),
                ui_events: VecDeque::new(),
                job_progress: VecDeque::new(),
                exceptions: VecDeque::new(),
                cycle_index: None,
                call_timeout: config.call_timeout,
            }),
            Some(other) => Err(ProtocolError::UnexpectedPacket(other.kind()).into()),
            None => Err(CallError::Timeout),
        }
    }

    pub fn server_version(&self) -> u32 {
        self.server_version
    }

    /// Actions the server advertised in its hello
    pub fn actions(&self) -> &[ActionDescription] {
        &self.actions
    }

    /// Index of the last cycle-end seen
    pub fn last_cycle(&self) -> Option<u64> {
        self.cycle_index
    }

    /// Calls still waiting for a reply
    pub fn pending_calls(&self) -> usize {
        self.pending
            .iter()
            .filter(|call| !matches!(call, PendingCall::Discard))
            .count()
    }

    pub fn take_notifications(&mut self) -> Vec<(NotificationLevel, String)> {
        self.notifications.drain(..).collect()
    }

    pub fn take_ui_events(&mut self) -> Vec<(String, Vec<DrobyValue>)> {
        self.ui_events.drain(..).collect()
    }

    pub fn take_job_progress(&mut self) -> Vec<(JobId, JobState, String)> {
        self.job_progress.drain(..).collect()
    }

    pub fn take_exceptions(&mut self) -> Vec<DrobyValue> {
        self.exceptions.drain(..).collect()
    }

    // ---- calls ---------------------------------------------------------

    /// Send a call and wait for its reply, up to the call timeout
    pub async fn call(
        &mut self,
        path: &[&str],
        method: &str,
        args: Vec<DrobyValue>,
        kwargs: BTreeMap<String, DrobyValue>,
    ) -> Result<DrobyValue, CallError> {
        self.send_call(path, method, args, kwargs).await?;
        self.pending.push_back(PendingCall::Sync);
        let deadline = tokio::time::Instant::now() + self.call_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.channel.read_packet(Some(remaining)).await {
                Ok(Some(packet)) => {
                    if let Some(outcome) = self.consume(packet)? {
                        return outcome;
                    }
                }
                Ok(None) => {
                    self.abandon_sync_call();
                    return Err(CallError::Timeout);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Queue a call whose reply is delivered to `callback` during a
    /// later poll. Callbacks fire strictly in call order.
    pub async fn async_call(
        &mut self,
        path: &[&str],
        method: &str,
        args: Vec<DrobyValue>,
        kwargs: BTreeMap<String, DrobyValue>,
        callback: CallCallback,
    ) -> Result<(), CallError> {
        self.send_call(path, method, args, kwargs).await?;
        self.pending.push_back(PendingCall::Async(callback));
        Ok(())
    }

    /// Drain whatever the server has pushed, resolving queued calls in
    /// order
    pub async fn poll(&mut self) -> Result<(), CallError> {
        loop {
            match self.channel.read_packet(Some(Duration::ZERO)).await {
                Ok(Some(packet)) => {
                    self.consume(packet)?;
                }
                Ok(None) => return Ok(()),
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn send_call(
        &mut self,
        path: &[&str],
        method: &str,
        args: Vec<DrobyValue>,
        kwargs: BTreeMap<String, DrobyValue>,
    ) -> Result<(), CallError> {
        let packet = Packet::Call {
            path: path.iter().map(|part| part.to_string()).collect(),
            method: method.to_string(),
            args,
            kwargs,
        };
        self.channel.write_packet(&packet).await?;
        self.channel.flush().await?;
        Ok(())
    }

    /// Route one inbound packet. Returns the outcome when it resolved
    /// the active synchronous call.
    fn consume(&mut self, packet: Packet) -> Result<Option<CallOutcome>, CallError> {
        match packet {
            Packet::Reply { value } => self.resolve(Ok(value)),
            Packet::BadCall { message } => self.resolve(Err(CallError::Remote { message })),
            Packet::CycleEnd { cycle_index } => {
                self.cycle_index = Some(cycle_index);
                Ok(None)
            }
            Packet::Notification { level, message } => {
                self.notifications.push_back((level, message));
                Ok(None)
            }
            Packet::UiEvent { name, args } => {
                self.ui_events.push_back((name, args));
                Ok(None)
            }
            Packet::JobProgress { job, state, name } => {
                self.job_progress.push_back((job, state, name));
                Ok(None)
            }
            Packet::Exception { exception } => {
                self.exceptions.push_back(exception);
                Ok(None)
            }
            Packet::Hello { .. } => Err(ProtocolError::UnexpectedPacket("hello").into()),
            Packet::Call { .. } => Err(ProtocolError::UnexpectedPacket("call").into()),
        }
    }

    fn resolve(&mut self, outcome: CallOutcome) -> Result<Option<CallOutcome>, CallError> {
        match self.pending.pop_front() {
            None => Err(ProtocolError::UnexpectedReply.into()),
            Some(PendingCall::Discard) => Ok(None),
            Some(PendingCall::Async(callback)) => {
                callback(outcome);
                Ok(None)
            }
            Some(PendingCall::Sync) => Ok(Some(outcome)),
        }
    }

    /// Turn the active sync marker into a discard slot so the late
    /// reply does not resolve a later call
    fn abandon_sync_call(&mut self) {
        for call in self.pending.iter_mut().rev() {
            if matches!(call, PendingCall::Sync) {
                *call = PendingCall::Discard;
                return;
            }
        }
    }

    // ---- job conveniences ----------------------------------------------

    pub async fn start_job(
        &mut self,
        action: &str,
        kwargs: BTreeMap<String, DrobyValue>,
    ) -> Result<JobId, CallError> {
        let value = self
            .call(
                &[],
                "start_job",
                vec![DrobyValue::Str {
                    value: action.to_string(),
                }],
                kwargs,
            )
            .await?;
        job_from_value(&value)
    }

    pub async fn drop_job(&mut self, job: JobId) -> Result<(), CallError> {
        self.void_call("drop_job", job).await
    }

    pub async fn kill_job(&mut self, job: JobId) -> Result<(), CallError> {
        self.void_call("kill_job", job).await
    }

    async fn void_call(&mut self, method: &str, job: JobId) -> Result<(), CallError> {
        let value = self
            .call(
                &[],
                method,
                vec![DrobyValue::Int {
                    value: job.0 as i64,
                }],
                BTreeMap::new(),
            )
            .await?;
        match value {
            DrobyValue::Null => Ok(()),
            _ => Err(CallError::BadReply { expected: "null" }),
        }
    }

    /// Jobs the server is tracking, as (id, action name, state)
    pub async fn jobs(&mut self) -> Result<Vec<(JobId, String, JobState)>, CallError> {
        let value = self.call(&[], "jobs", Vec::new(), BTreeMap::new()).await?;
        let DrobyValue::Array { items } = value else {
            return Err(CallError::BadReply {
                expected: "an array of jobs",
            });
        };
        items.iter().map(parse_job_summary).collect()
    }

    pub fn create_batch(&self) -> BatchContext {
        BatchContext::default()
    }

    /// Send every accumulated batch call in one round trip
    pub async fn process_batch(&mut self, batch: BatchContext) -> Result<BatchResult, CallError> {
        let value = self
            .call(
                &[],
                "process_batch",
                vec![DrobyValue::Array {
                    items: batch.into_entries(),
                }],
                BTreeMap::new(),
            )
            .await?;
        BatchResult::parse(value)
    }
}

fn job_from_value(value: &DrobyValue) -> Result<JobId, CallError> {
    match value {
        DrobyValue::Int { value } if *value >= 0 => Ok(JobId(*value as u64)),
        _ => Err(CallError::BadReply {
            expected: "a job id",
        }),
    }
}

fn parse_job_summary(item: &DrobyValue) -> Result<(JobId, String, JobState), CallError> {
    let DrobyValue::Map { entries } = item else {
        return Err(CallError::BadReply {
            expected: "a job summary map",
        });
    };
    let Some(id) = map_get(entries, "id") else {
        return Err(CallError::BadReply {
            expected: "a job id",
        });
    };
    let Some(DrobyValue::Str { value: name }) = map_get(entries, "name") else {
        return Err(CallError::BadReply {
            expected: "a job name",
        });
    };
    let state = match map_get(entries, "state") {
        Some(DrobyValue::Str { value }) => JobState::from_name(value),
        _ => None,
    };
    let Some(state) = state else {
        return Err(CallError::BadReply {
            expected: "a job state",
        });
    };
    Ok((job_from_value(id)?, name.clone(), state))
}

/// Accumulates job calls to run in one round trip
#[derive(Default)]
pub struct BatchContext {
    calls: Vec<(String, Vec<DrobyValue>, BTreeMap<String, DrobyValue>)>,
}

impl BatchContext {
    pub fn start_job(&mut self, action: &str, kwargs: BTreeMap<String, DrobyValue>) {
        self.calls.push((
            "start_job".to_string(),
            vec![DrobyValue::Str {
                value: action.to_string(),
            }],
            kwargs,
        ));
    }

    pub fn drop_job(&mut self, job: JobId) {
        self.push_job_call("drop_job", job);
    }

    pub fn kill_job(&mut self, job: JobId) {
        self.push_job_call("kill_job", job);
    }

    fn push_job_call(&mut self, method: &str, job: JobId) {
        self.calls.push((
            method.to_string(),
            vec![DrobyValue::Int {
                value: job.0 as i64,
            }],
            BTreeMap::new(),
        ));
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn into_entries(self) -> Vec<DrobyValue> {
        self.calls
            .into_iter()
            .map(|(method, args, kwargs)| DrobyValue::Map {
                entries: vec![
                    entry("method", DrobyValue::Str { value: method }),
                    entry("args", DrobyValue::Array { items: args }),
                    entry(
                        "kwargs",
                        DrobyValue::Map {
                            entries: kwargs
                                .into_iter()
                                .map(|(key, value)| (DrobyValue::Str { value: key }, value))
                                .collect(),
                        },
                    ),
                ],
            })
            .collect()
    }
}

/// Per-call outcomes of a processed batch, keyed by call index
pub struct BatchResult {
    results: Vec<Result<DrobyValue, String>>,
}

impl BatchResult {
    fn parse(value: DrobyValue) -> Result<Self, CallError> {
        let DrobyValue::Array { items } = value else {
            return Err(CallError::BadReply {
                expected: "an array of batch results",
            });
        };
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let DrobyValue::Map { entries } = item else {
                return Err(CallError::BadReply {
                    expected: "a batch result map",
                });
            };
            match map_get(&entries, "status") {
                Some(DrobyValue::Str { value }) if value == "ok" => {
                    let value = map_get(&entries, "value")
                        .cloned()
                        .unwrap_or(DrobyValue::Null);
                    results.push(Ok(value));
                }
                Some(DrobyValue::Str { value }) if value == "error" => {
                    let message = match map_get(&entries, "message") {
                        Some(DrobyValue::Str { value }) => value.clone(),
                        _ => "unknown error".to_string(),
                    };
                    results.push(Err(message));
                }
                _ => {
                    return Err(CallError::BadReply {
                        expected: "a batch result status",
                    });
                }
            }
        }
        Ok(Self { results })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn result(&self, index: usize) -> Option<&Result<DrobyValue, String>> {
        self.results.get(index)
    }

    /// The job id a successful `start_job` entry returned
    pub fn job_id(&self, index: usize) -> Option<JobId> {
        match self.results.get(index) {
            Some(Ok(value)) => job_from_value(value).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
