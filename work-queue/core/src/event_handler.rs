// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{ClientEvent, WorkerAction};

/// Decision function driven by the event multiplexer: called synchronously,
/// exactly once per event, and its action is applied before the next one
pub trait EventHandler {
    fn decide(&mut self, event: ClientEvent) -> WorkerAction;
}

impl<F> EventHandler for F
where
    F: FnMut(ClientEvent) -> WorkerAction,
{
    fn decide(&mut self, event: ClientEvent) -> WorkerAction {
        (self)(event)
    }
}
