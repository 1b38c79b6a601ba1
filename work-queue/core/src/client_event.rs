// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Monotonically increasing identity handed out by the multiplexer on accept
pub type WorkerId = usize;

/// Abstract event produced by the multiplexer for every readiness notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A worker connection was accepted and registered
    Connected { worker_id: WorkerId },
    /// The connection is gone: orderly close, hangup, read/write error or liveness timeout
    Disconnected { worker_id: WorkerId },
    /// One read worth of bytes arrived from the worker
    MessageReceived { worker_id: WorkerId, payload: Vec<u8> },
}

impl ClientEvent {
    pub fn worker_id(&self) -> WorkerId {
        match self {
            ClientEvent::Connected { worker_id }
            | ClientEvent::Disconnected { worker_id }
            | ClientEvent::MessageReceived { worker_id, .. } => *worker_id,
        }
    }
}
