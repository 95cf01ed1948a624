// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logfile framing
//!
//! A logfile starts with a magic string and a format version, followed
//! by cycle frames: `[u32 BE payload length][JSON payload][u32 BE
//! crc32]`. The payload is the JSON array of the cycle's messages.
//! Frames are appended whole; a crash can truncate the trailing frame
//! but never interleave two frames, so the reader treats an incomplete
//! trailing frame as end-of-stream and anything else as corruption.

use crate::errors::{LogError, LogReadError};
use crate::message::LogMessage;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write as _};
use std::path::{Path, PathBuf};

pub const MAGIC: [u8; 8] = *b"WEFTLOG\0";
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on one cycle's payload
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Appends cycle frames to a logfile
pub struct Writer {
    path: PathBuf,
    file: BufWriter<File>,
    frames_written: u64,
}

impl Writer {
    /// Create a fresh logfile, writing the header
    pub fn create(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_be_bytes())?;
        file.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            frames_written: 0,
        })
    }

    /// Append one complete cycle frame
    pub fn append_cycle(&mut self, messages: &[LogMessage]) -> Result<(), LogError> {
        let payload = serde_json::to_vec(messages)?;
        if payload.len() > MAX_FRAME_LEN as usize {
            return Err(LogError::FrameTooLarge { len: payload.len() });
        }
        let checksum = crc32fast::hash(&payload);
        self.file.write_all(&(payload.len() as u32).to_be_bytes())?;
        self.file.write_all(&payload)?;
        self.file.write_all(&checksum.to_be_bytes())?;
        self.file.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush buffers and sync the file to disk
    pub fn sync(&mut self) -> Result<(), LogError> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// How far a fixed-size read got
enum ChunkRead {
    Full,
    Eof,
    Truncated,
}

fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<ChunkRead> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(if filled == 0 {
                ChunkRead::Eof
            } else {
                ChunkRead::Truncated
            });
        }
        filled += n;
    }
    Ok(ChunkRead::Full)
}

/// Reads cycle frames back from a logfile
pub struct Reader {
    file: BufReader<File>,
    frame_index: u64,
}

impl Reader {
    /// Open a logfile, verifying its header
    pub fn open(path: &Path) -> Result<Self, LogReadError> {
        let mut file = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 8];
        match read_chunk(&mut file, &mut magic)? {
            ChunkRead::Full if magic == MAGIC => {}
            _ => return Err(LogReadError::NotALogfile),
        }
        let mut version = [0u8; 4];
        let ChunkRead::Full = read_chunk(&mut file, &mut version)? else {
            return Err(LogReadError::NotALogfile);
        };
        let version = u32::from_be_bytes(version);
        if version != FORMAT_VERSION {
            return Err(LogReadError::UnsupportedVersion(version));
        }
        Ok(Self {
            file,
            frame_index: 0,
        })
    }

    /// Index of the next frame to be read
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Read the next cycle frame
    ///
    /// Returns `Ok(None)` at end-of-stream, including after a truncated
    /// trailing frame. Complete frames that fail the checksum or do not
    /// parse are corruption and return an error.
    pub fn load_one_cycle(&mut self) -> Result<Option<Vec<LogMessage>>, LogReadError> {
        let frame = self.frame_index;

        let mut len = [0u8; 4];
        match read_chunk(&mut self.file, &mut len)? {
            ChunkRead::Full => {}
            ChunkRead::Eof | ChunkRead::Truncated => return Ok(None),
        }
        let len = u32::from_be_bytes(len);
        if len > MAX_FRAME_LEN {
            return Err(LogReadError::Corrupted {
                frame,
                reason: format!("frame length {len} exceeds the limit"),
            });
        }

        let mut payload = vec![0u8; len as usize];
        let ChunkRead::Full = read_chunk(&mut self.file, &mut payload)? else {
            return Ok(None);
        };

        let mut checksum = [0u8; 4];
        let ChunkRead::Full = read_chunk(&mut self.file, &mut checksum)? else {
            return Ok(None);
        };
        if crc32fast::hash(&payload) != u32::from_be_bytes(checksum) {
            return Err(LogReadError::ChecksumMismatch { frame });
        }

        let messages = serde_json::from_slice(&payload).map_err(|e| LogReadError::Corrupted {
            frame,
            reason: e.to_string(),
        })?;
        self.frame_index += 1;
        Ok(Some(messages))
    }

    /// Read every remaining complete frame
    pub fn load_all(&mut self) -> Result<Vec<Vec<LogMessage>>, LogReadError> {
        let mut cycles = Vec::new();
        while let Some(messages) = self.load_one_cycle()? {
            cycles.push(messages);
        }
        Ok(cycles)
    }

    /// Scan a logfile and summarize its contents
    pub fn validate(path: &Path) -> Result<LogValidation, LogReadError> {
        let mut reader = Self::open(path)?;
        let mut valid_cycles = 0u64;
        let mut messages = 0u64;
        let mut corruption = None;

        loop {
            match reader.load_one_cycle() {
                Ok(Some(cycle)) => {
                    valid_cycles += 1;
                    messages += cycle.len() as u64;
                }
                Ok(None) => break,
                Err(error) => {
                    corruption = Some(LogCorruption {
                        frame: reader.frame_index(),
                        reason: error.to_string(),
                    });
                    break;
                }
            }
        }

        Ok(LogValidation {
            valid_cycles,
            messages,
            corruption,
        })
    }
}

/// Summary of a logfile scan
#[derive(Debug)]
pub struct LogValidation {
    pub valid_cycles: u64,
    pub messages: u64,
    pub corruption: Option<LogCorruption>,
}

/// First corruption found in a logfile
#[derive(Debug)]
pub struct LogCorruption {
    pub frame: u64,
    pub reason: String,
}

#[cfg(test)]
#[path = "logfile_tests.rs"]
mod tests;
