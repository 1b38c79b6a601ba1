// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{
    ClientEvent, EventHandler, ProtocolMessage, WorkSource, WorkSourceError, WorkerAction,
    WorkerId,
};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Work queue, assignments, heartbeat counters and the running aggregate.
///
/// Every work item is either queued or assigned to exactly one worker; an
/// item leaves both only when its worker reports a result.
#[derive(Debug, Default)]
pub struct WorkCoordinator {
    work_left: VecDeque<String>,
    assigned_work: HashMap<WorkerId, String>,
    heartbeats: HashMap<WorkerId, u32>,
    aggregate: u64,
}

impl WorkCoordinator {
    pub fn new<I>(work: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            work_left: work.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Fills the queue from the source, in the order it returns the items
    pub fn from_source(source: &dyn WorkSource) -> Result<Self, WorkSourceError> {
        Ok(Self::new(source.fetch()?))
    }

    /// Pops the queue head for `worker_id`, unless the queue is empty or the
    /// worker already holds an item
    pub fn assign_work(&mut self, worker_id: WorkerId) -> Option<String> {
        if self.assigned_work.contains_key(&worker_id) {
            return None;
        }

        let work = self.work_left.pop_front()?;
        self.assigned_work.insert(worker_id, work.clone());
        Some(work)
    }

    pub fn finish_work(&mut self, worker_id: WorkerId) {
        self.assigned_work.remove(&worker_id);
    }

    /// Returns the worker's unfinished item, if any, to the back of the queue
    pub fn remove_worker(&mut self, worker_id: WorkerId) {
        if let Some(work) = self.assigned_work.remove(&worker_id) {
            info!("Requeueing '{}' from worker {}", work, worker_id);
            self.work_left.push_back(work);
        }
    }

    pub fn work_finished(&self) -> bool {
        self.work_left.is_empty() && self.assigned_work.is_empty()
    }

    /// Counts one heartbeat and returns the new total for the worker
    pub fn heartbeat(&mut self, worker_id: WorkerId) -> u32 {
        let count = self.heartbeats.entry(worker_id).or_insert(0);
        *count += 1;
        *count
    }

    pub fn aggregate(&self) -> u64 {
        self.aggregate
    }

    pub fn work_left(&self) -> impl Iterator<Item = &str> {
        self.work_left.iter().map(String::as_str)
    }

    pub fn queue_len(&self) -> usize {
        self.work_left.len()
    }

    pub fn assigned(&self, worker_id: WorkerId) -> Option<&str> {
        self.assigned_work.get(&worker_id).map(String::as_str)
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned_work.len()
    }

    pub fn heartbeats(&self, worker_id: WorkerId) -> u32 {
        self.heartbeats.get(&worker_id).copied().unwrap_or(0)
    }

    /// Maps one client event to the action the multiplexer should take.
    /// Once all work is done every event is answered with `Exit`.
    pub fn decide(&mut self, event: ClientEvent) -> WorkerAction {
        if self.work_finished() {
            return WorkerAction::Exit;
        }

        match event {
            // Work is only handed out once the worker has proven it is alive
            ClientEvent::Connected { worker_id } => {
                debug!("Worker {} connected", worker_id);
                WorkerAction::Noop
            }
            ClientEvent::MessageReceived { worker_id, payload } => {
                match ProtocolMessage::decode(&payload) {
                    Some(ProtocolMessage::Result(count)) => self.on_result(worker_id, count),
                    Some(ProtocolMessage::Heartbeat) => self.on_heartbeat(worker_id),
                    Some(ProtocolMessage::Work(_)) => {
                        debug!("Ignoring work message sent by worker {}", worker_id);
                        WorkerAction::Noop
                    }
                    None => {
                        debug!("Dropping undecodable message from worker {}", worker_id);
                        WorkerAction::Noop
                    }
                }
            }
            ClientEvent::Disconnected { worker_id } => {
                info!("Worker {} disconnected", worker_id);
                self.remove_worker(worker_id);
                self.heartbeats.remove(&worker_id);
                WorkerAction::Noop
            }
        }
    }

    fn on_result(&mut self, worker_id: WorkerId, count: u64) -> WorkerAction {
        self.aggregate = self.aggregate.saturating_add(count);
        if let Some(work) = self.assigned_work.get(&worker_id) {
            info!("Worker {} finished '{}' with {}", worker_id, work, count);
        }
        self.finish_work(worker_id);

        if self.work_finished() {
            info!("All work finished, aggregate {}", self.aggregate);
            return WorkerAction::Exit;
        }

        self.send_next_work(worker_id)
    }

    fn on_heartbeat(&mut self, worker_id: WorkerId) -> WorkerAction {
        if self.heartbeat(worker_id) > 1 {
            self.send_next_work(worker_id)
        } else {
            WorkerAction::Noop
        }
    }

    fn send_next_work(&mut self, worker_id: WorkerId) -> WorkerAction {
        match self.assign_work(worker_id) {
            Some(work) => {
                info!("Assigning '{}' to worker {}", work, worker_id);
                WorkerAction::SendMessage(ProtocolMessage::Work(work).encode())
            }
            None => WorkerAction::Noop,
        }
    }
}

impl EventHandler for WorkCoordinator {
    fn decide(&mut self, event: ClientEvent) -> WorkerAction {
        WorkCoordinator::decide(self, event)
    }
}
