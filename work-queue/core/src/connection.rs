// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{LivenessTimer, WorkerId};
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};

/// One accepted worker: its data socket plus its liveness timer.
/// Dropping it closes both descriptors.
#[derive(Debug)]
pub struct Connection {
    id: WorkerId,
    stream: TcpStream,
    timer: LivenessTimer,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(id: WorkerId, stream: TcpStream, timer: LivenessTimer, peer: SocketAddr) -> Self {
        Self {
            id,
            stream,
            timer,
            peer,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn socket_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn timer_fd(&self) -> RawFd {
        self.timer.raw_fd()
    }

    pub fn ip_address(&self) -> IpAddr {
        self.peer.ip()
    }

    pub fn port(&self) -> u16 {
        self.peer.port()
    }

    pub fn stream(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn timer(&self) -> &LivenessTimer {
        &self.timer
    }

    /// Readiness token of the data socket. Tokens derive from the worker id,
    /// which is never reused while a poll instance lives, so a notification
    /// queued for a closed connection cannot reach a newer one that got the
    /// same descriptor numbers.
    pub fn socket_token(&self) -> Token {
        Token(self.id * 2)
    }

    /// Readiness token of the liveness timer
    pub fn timer_token(&self) -> Token {
        Token(self.id * 2 + 1)
    }

    /// Registers the socket and the timer for edge-triggered read readiness
    pub(crate) fn register(&mut self, registry: &Registry) -> io::Result<()> {
        let socket_token = self.socket_token();
        let timer_token = self.timer_token();
        registry.register(&mut self.stream, socket_token, Interest::READABLE)?;
        if let Err(e) = registry.register(&mut self.timer, timer_token, Interest::READABLE) {
            let _ = registry.deregister(&mut self.stream);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn deregister(&mut self, registry: &Registry) {
        // Closing the descriptors removes them from the poll set anyway
        let _ = registry.deregister(&mut self.stream);
        let _ = registry.deregister(&mut self.timer);
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} ({}:{}, socket fd {}, timer fd {})",
            self.id,
            self.ip_address(),
            self.port(),
            self.socket_fd(),
            self.timer_fd()
        )
    }
}
