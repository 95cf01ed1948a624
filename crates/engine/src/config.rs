// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tunables for the execution engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target length of one cycle
    #[serde(with = "humantime_serde")]
    pub cycle_length: Duration,
    /// Worker threads backing the promise pool
    pub promise_workers: usize,
    /// How many cycles teardown may take before giving up
    pub teardown_max_cycles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_length: Duration::from_millis(100),
            promise_workers: 2,
            teardown_max_cycles: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
