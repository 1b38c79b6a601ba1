// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{ItemProcessor, ProcessError, ProtocolMessage, WorkerConfig, WorkerError};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Both the heartbeat task and the request loop write to the socket; every
/// write holds this lock for its full duration so frames never interleave
type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Worker side of the protocol: heartbeats on a timer, processes every
/// `Work` it receives with the injected [`ItemProcessor`] and answers with a
/// `Result`.
pub struct WorkerClient<P: ItemProcessor> {
    config: WorkerConfig,
    processor: Arc<P>,
    cancellation_token: CancellationToken,
}

impl<P: ItemProcessor> WorkerClient<P> {
    pub fn new(config: WorkerConfig, processor: P) -> Self {
        Self {
            config,
            processor: Arc::new(processor),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Connects and serves work until the coordinator goes away or the
    /// token is cancelled. Returns the number of items processed.
    pub async fn run(self, host: &str, port: u16) -> Result<usize, WorkerError> {
        sleep(self.config.startup_delay()).await;

        let address = format!("{}:{}", host, port);
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| WorkerError::Connect {
                address: address.clone(),
                source,
            })?;
        info!("Connected to coordinator at {}", address);

        let (reader, writer) = stream.into_split();
        let writer: SharedWriter = Arc::new(Mutex::new(writer));

        let heartbeat = self.spawn_heartbeat(writer.clone());
        let processed = self.serve(reader, writer).await;

        self.cancellation_token.cancel();
        if let Err(e) = heartbeat.await {
            warn!("Heartbeat task failed: {}", e);
        }

        info!("Worker stopped after {} item(s)", processed);
        Ok(processed)
    }

    fn spawn_heartbeat(&self, writer: SharedWriter) -> JoinHandle<()> {
        let interval = self.config.heartbeat_interval();
        let token = self.cancellation_token.clone();
        let message = ProtocolMessage::Heartbeat.encode();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(interval) => {}
                }

                if let Err(e) = writer.lock().await.write_all(&message).await {
                    debug!("Heartbeat write failed: {}", e);
                    token.cancel();
                    break;
                }
            }
        })
    }

    async fn serve(&self, reader: OwnedReadHalf, writer: SharedWriter) -> usize {
        let mut processed = 0;

        while !self.cancellation_token.is_cancelled() {
            match timeout(self.config.read_timeout(), reader.readable()).await {
                Err(_) => continue,
                Ok(Err(e)) => {
                    warn!("Waiting for coordinator failed: {}", e);
                    break;
                }
                Ok(Ok(())) => {}
            }

            let received = match read_message(&reader, self.config.read_buffer_size) {
                Ok(Some(received)) => received,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Coordinator connection ended: {}", e);
                    break;
                }
            };

            let Some(ProtocolMessage::Work(work)) = ProtocolMessage::decode(&received) else {
                info!("Coordinator sent no work, stopping");
                break;
            };

            debug!("Processing '{}'", work);
            let count = match self.process(work.clone()).await {
                Ok(count) => count,
                Err(e) => {
                    warn!("Processing '{}' failed: {}", work, e);
                    break;
                }
            };

            let response = ProtocolMessage::Result(count).encode();
            if let Err(e) = writer.lock().await.write_all(&response).await {
                warn!("Sending result failed: {}", e);
                break;
            }
            info!("Reported {} for '{}'", count, work);
            processed += 1;
        }

        processed
    }

    async fn process(&self, work: String) -> Result<u64, ProcessError> {
        let processor = self.processor.clone();
        let limit = self.config.process_timeout();
        let task = tokio::task::spawn_blocking(move || processor.process(&work));

        match timeout(limit, task).await {
            Err(_) => Err(ProcessError::Timeout(limit)),
            Ok(Err(e)) => Err(ProcessError::Panicked(e.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

/// Reads one message: keeps reading while the buffer comes back full.
/// `Ok(None)` is a spurious wakeup; end of stream is an error.
fn read_message(reader: &OwnedReadHalf, buffer_size: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut message = Vec::new();

    loop {
        match reader.try_read(&mut buffer) {
            Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                message.extend_from_slice(&buffer[..n]);
                if n < buffer.len() {
                    return Ok(Some(message));
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Ok(if message.is_empty() { None } else { Some(message) });
            }
            Err(e) => return Err(e),
        }
    }
}
