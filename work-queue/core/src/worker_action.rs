// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

/// Response to a client event, executed by the multiplexer against the connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WorkerAction {
    /// Write these bytes to the worker socket
    SendMessage(Vec<u8>),
    /// Evict the connection and report it as disconnected
    Disconnect,
    /// Do nothing
    #[default]
    Noop,
    /// Stop the event loop
    Exit,
}
