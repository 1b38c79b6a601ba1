// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{Connection, WorkerId};
use mio::{Registry, Token};
use std::collections::HashMap;

/// Live connections, reachable by worker id, by data socket token and by
/// liveness timer token
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<WorkerId, Connection>,
    by_socket: HashMap<Token, WorkerId>,
    by_timer: HashMap<Token, WorkerId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection) {
        let id = connection.id();
        self.by_socket.insert(connection.socket_token(), id);
        self.by_timer.insert(connection.timer_token(), id);
        self.connections.insert(id, connection);
    }

    pub fn by_socket(&self, token: Token) -> Option<WorkerId> {
        self.by_socket.get(&token).copied()
    }

    pub fn by_timer(&self, token: Token) -> Option<WorkerId> {
        self.by_timer.get(&token).copied()
    }

    pub fn get(&self, id: WorkerId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: WorkerId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Drops both lookup entries and hands the connection back, still open.
    /// Removing an id that is not present returns `None`.
    pub fn remove(&mut self, id: WorkerId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        self.by_socket.remove(&connection.socket_token());
        self.by_timer.remove(&connection.timer_token());
        Some(connection)
    }

    /// Removes the connection, deregisters it from the poll set and closes
    /// both descriptors. Returns false if it was already gone.
    pub fn close(&mut self, id: WorkerId, registry: &Registry) -> bool {
        match self.remove(id) {
            Some(mut connection) => {
                connection.deregister(registry);
                true
            }
            None => false,
        }
    }

    /// Closes every tracked connection
    pub fn close_all(&mut self, registry: &Registry) {
        for (_, mut connection) in self.connections.drain() {
            connection.deregister(registry);
        }
        self.by_socket.clear();
        self.by_timer.clear();
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
