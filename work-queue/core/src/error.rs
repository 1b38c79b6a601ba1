// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::io;
use std::time::Duration;

/// Failures while bringing the coordinator's listening endpoint up.
/// Any of these aborts startup before the event loop runs.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to create listening socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    #[error("failed to create poll instance: {0}")]
    Poll(#[source] io::Error),

    #[error("failed to register listening socket: {0}")]
    Register(#[source] io::Error),

    #[error("event loop is not started")]
    NotStarted,

    #[error("waiting for readiness failed: {0}")]
    Wait(#[source] io::Error),
}

/// Failures scoped to a single worker connection. These never leave the
/// event loop; they end the connection with a `Disconnected` event.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("failed to create liveness timer: {0}")]
    Timer(#[source] io::Error),

    #[error("failed to register connection: {0}")]
    Register(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("write would block after {sent} of {total} bytes")]
    WriteStalled { sent: usize, total: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkSourceError {
    #[error("failed to read work list from '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to fetch work list from '{url}': {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("processing did not finish within {0:?}")]
    Timeout(Duration),

    #[error("processing task failed: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
