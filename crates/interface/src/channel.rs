// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet framing over an async byte stream
//!
//! Frames are a 4-byte big-endian length followed by the JSON packet.
//! Reads decode incrementally so a poll never blocks on a half
//! received frame. Writes go through an internal buffer: whatever the
//! socket does not accept immediately stays queued until the next
//! write or an explicit flush, and the buffer running past its limit
//! is a [`ComError`] rather than a stall.
//!
//! A channel belongs to the thread that created it. Using it from
//! another thread is a [`ComError::WrongThread`]; tests that must move
//! a channel across threads call [`Channel::reset_thread_guard`].

use crate::errors::{ChannelError, ComError, ProtocolError};
use crate::packet::Packet;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_WRITE_BUFFER: usize = 4 * 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

/// Where the incremental decoder is in the current frame
enum DecodeState {
    /// Waiting for the length prefix
    Head,
    /// Waiting for a payload of this many bytes
    Data(usize),
}

pub struct Channel<S> {
    stream: S,
    read_buf: Vec<u8>,
    decode: DecodeState,
    write_buf: Vec<u8>,
    max_frame_length: usize,
    max_write_buffer: usize,
    owner: ThreadId,
}

impl<S> Channel<S> {
    /// Bytes queued but not yet accepted by the socket
    pub fn buffered_bytes(&self) -> usize {
        self.write_buf.len()
    }

    /// Re-bind the channel to the calling thread
    pub fn reset_thread_guard(&mut self) {
        self.owner = thread::current().id();
    }

    fn guard(&self) -> Result<(), ComError> {
        if thread::current().id() == self.owner {
            Ok(())
        } else {
            Err(ComError::WrongThread)
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Channel<S> {
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, DEFAULT_MAX_FRAME_LENGTH, DEFAULT_MAX_WRITE_BUFFER)
    }

    pub fn with_limits(stream: S, max_frame_length: usize, max_write_buffer: usize) -> Self {
        Self {
            stream,
            read_buf: Vec::new(),
            decode: DecodeState::Head,
            write_buf: Vec::new(),
            max_frame_length,
            max_write_buffer,
            owner: thread::current().id(),
        }
    }

    /// Read one packet. `None` blocks until a packet arrives or the
    /// peer goes away; `Some(t)` waits at most `t`, with a zero
    /// duration polling what is already buffered. Returns `Ok(None)`
    /// when the wait ran out.
    pub async fn read_packet(
        &mut self,
        wait: Option<Duration>,
    ) -> Result<Option<Packet>, ChannelError> {
        self.guard()?;
        let deadline = wait.map(|t| tokio::time::Instant::now() + t);
        loop {
            if let Some(packet) = self.decode_next()? {
                return Ok(Some(packet));
            }
            let mut chunk = [0u8; READ_CHUNK];
            let read = match deadline {
                None => self.stream.read(&mut chunk).await.map_err(io_error)?,
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.stream.read(&mut chunk)).await {
                        Ok(result) => result.map_err(io_error)?,
                        Err(_) => return Ok(None),
                    }
                }
            };
            if read == 0 {
                return Err(ComError::ClosedPeer.into());
            }
            self.read_buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn decode_next(&mut self) -> Result<Option<Packet>, ChannelError> {
        loop {
            match self.decode {
                DecodeState::Head => {
                    if self.read_buf.len() < 4 {
                        return Ok(None);
                    }
                    let len = u32::from_be_bytes([
                        self.read_buf[0],
                        self.read_buf[1],
                        self.read_buf[2],
                        self.read_buf[3],
                    ]) as usize;
                    self.read_buf.drain(..4);
                    if len > self.max_frame_length {
                        return Err(ProtocolError::FrameTooLarge {
                            len,
                            limit: self.max_frame_length,
                        }
                        .into());
                    }
                    self.decode = DecodeState::Data(len);
                }
                DecodeState::Data(len) => {
                    if self.read_buf.len() < len {
                        return Ok(None);
                    }
                    let payload: Vec<u8> = self.read_buf.drain(..len).collect();
                    self.decode = DecodeState::Head;
                    let packet =
                        serde_json::from_slice(&payload).map_err(ProtocolError::Malformed)?;
                    return Ok(Some(packet));
                }
            }
        }
    }

    /// Queue a packet and push whatever the socket accepts without
    /// blocking. Fails with [`ComError::WriteBufferFull`] when the
    /// queued bytes would run past the limit; the packet is not
    /// buffered in that case.
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<(), ChannelError> {
        self.guard()?;
        let payload = serde_json::to_vec(packet).map_err(ProtocolError::Malformed)?;
        if payload.len() > self.max_frame_length {
            return Err(ProtocolError::FrameTooLarge {
                len: payload.len(),
                limit: self.max_frame_length,
            }
            .into());
        }
        self.push_pending().await?;
        if self.write_buf.len() + 4 + payload.len() > self.max_write_buffer {
            return Err(ComError::WriteBufferFull {
                buffered: self.write_buf.len(),
                limit: self.max_write_buffer,
            }
            .into());
        }
        let len = payload.len() as u32;
        self.write_buf.extend_from_slice(&len.to_be_bytes());
        self.write_buf.extend_from_slice(&payload);
        self.push_pending().await
    }

    /// Write buffered bytes until the socket stops accepting them
    async fn push_pending(&mut self) -> Result<(), ChannelError> {
        while !self.write_buf.is_empty() {
            let write = self.stream.write(&self.write_buf);
            let wrote = match tokio::time::timeout(Duration::ZERO, write).await {
                Ok(result) => result.map_err(io_error)?,
                // The socket would block; keep the rest queued
                Err(_) => return Ok(()),
            };
            if wrote == 0 {
                return Err(ComError::ClosedPeer.into());
            }
            self.write_buf.drain(..wrote);
        }
        Ok(())
    }

    /// Block until everything buffered has reached the socket
    pub async fn flush(&mut self) -> Result<(), ChannelError> {
        self.guard()?;
        if !self.write_buf.is_empty() {
            self.stream
                .write_all(&self.write_buf)
                .await
                .map_err(io_error)?;
            self.write_buf.clear();
        }
        self.stream.flush().await.map_err(io_error)?;
        Ok(())
    }
}

fn io_error(error: std::io::Error) -> ComError {
    match error.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::UnexpectedEof => ComError::ClosedPeer,
        _ => ComError::Io(error),
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
