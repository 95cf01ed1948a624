// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface configuration

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tunables shared by servers, clients and their channels
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// How long a synchronous call waits for its reply
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    /// Upper bound on a single wire frame
    pub max_frame_length: usize,
    /// Unsent bytes a channel may hold before writes fail
    pub max_write_buffer: usize,
    /// Fail the server pass on a dispatch error instead of logging it
    pub abort_on_exception: bool,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            max_frame_length: 8 * 1024 * 1024,
            max_write_buffer: 4 * 1024 * 1024,
            abort_on_exception: false,
        }
    }
}

impl InterfaceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
