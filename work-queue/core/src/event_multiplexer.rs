// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{
    ClientEvent, Connection, ConnectionError, ConnectionRegistry, CoordinatorConfig,
    EventHandler, LivenessTimer, SetupError, ShutdownSignal, WorkerAction, WorkerId,
};
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::{debug, info, warn};

const LISTEN_BACKLOG: i32 = 1024;

// Connection tokens are `2 * id` and `2 * id + 1`
const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Resources that exist between `start` and the end of `run`
struct Endpoint {
    poll: Poll,
    listener: TcpListener,
}

/// Single-threaded readiness loop over one listening socket and, per
/// accepted worker, a data socket plus a liveness timer.
///
/// Every readiness notification becomes one [`ClientEvent`], which is handed
/// to the [`EventHandler`]; the returned [`WorkerAction`] is applied before
/// the next notification is looked at.
///
/// Framing is one read per message: a single read of at most
/// `read_buffer_size` bytes is delivered as one `MessageReceived`. Messages
/// that coalesce or split across reads are not reassembled.
pub struct EventMultiplexer {
    config: CoordinatorConfig,
    shutdown: ShutdownSignal,
    next_worker_id: WorkerId,
    connections: ConnectionRegistry,
    endpoint: Option<Endpoint>,
}

impl EventMultiplexer {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownSignal::new(),
            next_worker_id: 0,
            connections: ConnectionRegistry::new(),
            endpoint: None,
        }
    }

    /// Handle that stops the loop from another thread or a signal handler
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Binds the listening socket on every address family available, creates
    /// the poll instance and marks the multiplexer as running
    pub fn start(&mut self, port: u16) -> Result<SocketAddr, SetupError> {
        let listener = bind_listener(port)?;
        let poll = Poll::new().map_err(SetupError::Poll)?;

        let mut listener = TcpListener::from_std(listener);
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(SetupError::Register)?;

        let local_addr = listener.local_addr().map_err(SetupError::Socket)?;
        info!("Listening on {}", local_addr);

        self.endpoint = Some(Endpoint { poll, listener });
        self.shutdown.reset();
        Ok(local_addr)
    }

    /// Requests the loop to stop after the current batch of notifications
    pub fn stop(&self) {
        self.shutdown.shutdown();
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs until `stop` is called or the handler answers `Exit`, then
    /// releases every connection and the listening socket. The multiplexer
    /// can be started again afterwards.
    pub fn run<H: EventHandler>(&mut self, handler: &mut H) -> Result<(), SetupError> {
        let Some(mut endpoint) = self.endpoint.take() else {
            return Err(SetupError::NotStarted);
        };

        let result = self.event_loop(&mut endpoint, handler);
        self.teardown(endpoint);
        result
    }

    fn event_loop<H: EventHandler>(
        &mut self,
        endpoint: &mut Endpoint,
        handler: &mut H,
    ) -> Result<(), SetupError> {
        let mut events = Events::with_capacity(self.config.max_events.max(1));

        while !self.shutdown.is_cancelled() {
            if let Err(e) = endpoint
                .poll
                .poll(&mut events, Some(self.config.poll_timeout()))
            {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(SetupError::Wait(e));
            }

            // The whole batch is applied even if a stop arrives midway
            for event in events.iter() {
                if event.token() == LISTENER_TOKEN {
                    for worker_id in self.accept_connections(endpoint) {
                        self.dispatch(endpoint, handler, ClientEvent::Connected { worker_id });
                    }
                } else {
                    self.handle_descriptor_event(endpoint, handler, event);
                }
            }
        }

        Ok(())
    }

    fn handle_descriptor_event<H: EventHandler>(
        &mut self,
        endpoint: &mut Endpoint,
        handler: &mut H,
        event: &Event,
    ) {
        let token = event.token();

        if let Some(worker_id) = self.connections.by_socket(token) {
            if event.is_error() || (event.is_read_closed() && !event.is_readable()) {
                debug!("Worker {} hung up", worker_id);
                let client_event = self.disconnect(endpoint, worker_id);
                self.dispatch(endpoint, handler, client_event);
                return;
            }

            // No further edge follows a read-side close, so keep reading to EOF
            while let Some(client_event) = self.read_message(endpoint, worker_id) {
                self.dispatch(endpoint, handler, client_event);
                if !event.is_read_closed() || !self.connections.contains(worker_id) {
                    break;
                }
            }
        } else if let Some(worker_id) = self.connections.by_timer(token) {
            if let Some(connection) = self.connections.get(worker_id) {
                if let Err(e) = connection.timer().drain() {
                    debug!("Draining liveness timer of worker {} failed: {}", worker_id, e);
                }
            }
            info!("Worker {} missed its liveness deadline", worker_id);
            let client_event = self.disconnect(endpoint, worker_id);
            self.dispatch(endpoint, handler, client_event);
        } else {
            debug!("Ignoring readiness for closed connection ({:?})", token);
        }
    }

    fn dispatch<H: EventHandler>(
        &mut self,
        endpoint: &mut Endpoint,
        handler: &mut H,
        client_event: ClientEvent,
    ) {
        let worker_id = client_event.worker_id();
        let action = handler.decide(client_event);
        self.apply(endpoint, handler, worker_id, action);
    }

    /// Accepts until the listener would block. A connection that cannot be
    /// set up is dropped without affecting the loop.
    fn accept_connections(&mut self, endpoint: &mut Endpoint) -> Vec<WorkerId> {
        let mut accepted = Vec::new();

        loop {
            let (stream, peer) = match endpoint.listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e)
                    if e.kind() == ErrorKind::Interrupted
                        || e.kind() == ErrorKind::ConnectionAborted =>
                {
                    continue
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    break;
                }
            };

            match self.register_connection(endpoint, stream, peer) {
                Ok(worker_id) => accepted.push(worker_id),
                Err(e) => warn!("Dropping connection from {}: {}", peer, e),
            }
        }

        accepted
    }

    fn register_connection(
        &mut self,
        endpoint: &mut Endpoint,
        stream: mio::net::TcpStream,
        peer: SocketAddr,
    ) -> Result<WorkerId, ConnectionError> {
        let timer =
            LivenessTimer::new(self.config.client_timeout()).map_err(ConnectionError::Timer)?;
        let mut connection = Connection::new(self.next_worker_id, stream, timer, peer);
        connection
            .register(endpoint.poll.registry())
            .map_err(ConnectionError::Register)?;

        self.next_worker_id += 1;
        info!("Accepted {}", connection);
        let worker_id = connection.id();
        self.connections.insert(connection);
        Ok(worker_id)
    }

    /// One bounded read. Positive length is one message and re-arms the
    /// liveness deadline; zero length or a hard error is a disconnect;
    /// a spurious wakeup produces no event.
    fn read_message(
        &mut self,
        endpoint: &mut Endpoint,
        worker_id: WorkerId,
    ) -> Option<ClientEvent> {
        let connection = self.connections.get_mut(worker_id)?;
        let mut buffer = vec![0u8; self.config.read_buffer_size.max(1)];

        match connection.stream().read(&mut buffer) {
            Ok(0) => {
                info!("Worker {} closed the connection", worker_id);
                Some(self.disconnect(endpoint, worker_id))
            }
            Ok(n) => {
                if let Err(e) = connection.timer().reset() {
                    warn!("Re-arming liveness timer of worker {} failed: {}", worker_id, e);
                }
                buffer.truncate(n);
                debug!("Worker {} sent {} bytes", worker_id, n);
                Some(ClientEvent::MessageReceived {
                    worker_id,
                    payload: buffer,
                })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                None
            }
            Err(e) => {
                warn!("Worker {}: {}", worker_id, ConnectionError::Read(e));
                Some(self.disconnect(endpoint, worker_id))
            }
        }
    }

    /// Closes the connection and returns the event that reports it
    fn disconnect(&mut self, endpoint: &mut Endpoint, worker_id: WorkerId) -> ClientEvent {
        self.connections.close(worker_id, endpoint.poll.registry());
        ClientEvent::Disconnected { worker_id }
    }

    fn apply<H: EventHandler>(
        &mut self,
        endpoint: &mut Endpoint,
        handler: &mut H,
        worker_id: WorkerId,
        action: WorkerAction,
    ) {
        match action {
            WorkerAction::SendMessage(message) => {
                let Some(connection) = self.connections.get_mut(worker_id) else {
                    debug!("Worker {} is gone, dropping outgoing message", worker_id);
                    return;
                };
                if let Err(e) = write_message(connection.stream(), &message) {
                    warn!("Evicting worker {}: {}", worker_id, e);
                    self.evict(endpoint, handler, worker_id);
                }
            }
            WorkerAction::Disconnect => {
                info!("Disconnecting worker {}", worker_id);
                self.evict(endpoint, handler, worker_id);
            }
            WorkerAction::Exit => self.shutdown.shutdown(),
            WorkerAction::Noop => {}
        }
    }

    /// Closes the connection and reports the disconnect back to the handler.
    /// The connection no longer exists, so only an `Exit` answer has effect.
    fn evict<H: EventHandler>(
        &mut self,
        endpoint: &mut Endpoint,
        handler: &mut H,
        worker_id: WorkerId,
    ) {
        if !self.connections.close(worker_id, endpoint.poll.registry()) {
            return;
        }
        if handler.decide(ClientEvent::Disconnected { worker_id }) == WorkerAction::Exit {
            self.shutdown.shutdown();
        }
    }

    fn teardown(&mut self, mut endpoint: Endpoint) {
        let open = self.connections.len();
        self.connections.close_all(endpoint.poll.registry());
        let _ = endpoint.poll.registry().deregister(&mut endpoint.listener);
        drop(endpoint);

        self.next_worker_id = 0;
        info!("Event loop stopped, released {} connection(s)", open);
    }
}

/// Writes until the whole message is out. There is no cursor kept across
/// readiness cycles, so a write that would block counts as a failure.
fn write_message(
    stream: &mut mio::net::TcpStream,
    message: &[u8],
) -> Result<(), ConnectionError> {
    let mut sent = 0;
    while sent < message.len() {
        match stream.write(&message[sent..]) {
            Ok(0) => {
                return Err(ConnectionError::Write(io::Error::from(ErrorKind::WriteZero)));
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(ConnectionError::WriteStalled {
                    sent,
                    total: message.len(),
                });
            }
            Err(e) => return Err(ConnectionError::Write(e)),
        }
    }
    Ok(())
}

/// Dual-stack listener on `[::]:port`, falling back to `0.0.0.0:port` when
/// IPv6 is unavailable
fn bind_listener(port: u16) -> Result<std::net::TcpListener, SetupError> {
    let (socket, address) = match Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP)) {
        Ok(socket) => {
            // Accept v4-mapped peers on the same socket
            if let Err(e) = socket.set_only_v6(false) {
                warn!("Listener stays IPv6-only, clearing IPV6_V6ONLY failed: {}", e);
            }
            (socket, SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)))
        }
        Err(e) => {
            debug!("IPv6 socket unavailable ({}), using IPv4", e);
            let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
                .map_err(SetupError::Socket)?;
            (socket, SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        }
    };

    socket.set_reuse_address(true).map_err(SetupError::Socket)?;
    socket
        .bind(&address.into())
        .map_err(|source| SetupError::Bind { port, source })?;
    socket.listen(LISTEN_BACKLOG).map_err(SetupError::Listen)?;
    socket.set_nonblocking(true).map_err(SetupError::Socket)?;

    Ok(socket.into())
}
