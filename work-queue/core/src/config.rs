// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ConfigError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Tuning for the coordinator's event loop and work-list retrieval.
/// Every field may be omitted from the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Readiness notifications retrieved per poll call
    pub max_events: usize,
    /// Upper bound on one poll wait, so a stop request is seen promptly
    pub poll_timeout_ms: u64,
    /// Liveness deadline, re-armed on every received message
    pub client_timeout_ms: u64,
    /// Size of the single read that makes up one message
    pub read_buffer_size: usize,
    pub work_source_timeout_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_events: 64,
            poll_timeout_ms: 1000,
            client_timeout_ms: 5000,
            read_buffer_size: 512,
            work_source_timeout_secs: 30,
        }
    }
}

impl CoordinatorConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    pub fn work_source_timeout(&self) -> Duration {
        Duration::from_secs(self.work_source_timeout_secs)
    }
}

/// Tuning for the worker process
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub heartbeat_interval_ms: u64,
    /// Bounded wait for readability, after which the stop flag is checked
    pub read_timeout_ms: u64,
    /// Delay before connecting to the coordinator
    pub startup_delay_ms: u64,
    pub process_timeout_secs: u64,
    pub read_buffer_size: usize,
    /// Host prefix counted by the default item processor
    pub target_host: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            read_timeout_ms: 10_000,
            startup_delay_ms: 1000,
            process_timeout_secs: 30,
            read_buffer_size: 512,
            target_host: "google.ru/".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }
}

/// Loads a JSON config file
pub fn load_config<T: DeserializeOwned>(path: &str) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
