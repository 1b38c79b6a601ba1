// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use work_queue_core::{ProcessError, WorkerClient, WorkerConfig, WorkerError};

fn test_config() -> WorkerConfig {
    WorkerConfig {
        heartbeat_interval_ms: 50,
        read_timeout_ms: 100,
        startup_delay_ms: 0,
        process_timeout_secs: 1,
        ..WorkerConfig::default()
    }
}

fn token_length(token: &str) -> Result<u64, ProcessError> {
    Ok(token.len() as u64)
}

/// Reads from the worker until `pattern` shows up or the stream ends
async fn read_until(stream: &mut TcpStream, pattern: &str) -> String {
    let mut received = String::new();
    let mut buffer = [0u8; 512];

    let read = async {
        while !received.contains(pattern) {
            match stream.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.push_str(&String::from_utf8_lossy(&buffer[..n])),
            }
        }
    };
    let _ = timeout(Duration::from_secs(5), read).await;
    received
}

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

// ============================================================
// request loop
// ============================================================

#[tokio::test]
async fn test_worker_processes_work_and_reports_result() {
    let (listener, port) = listen().await;
    let client = WorkerClient::new(test_config(), token_length);
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (mut stream, _) = listener.accept().await.unwrap();
    assert!(read_until(&mut stream, "H:").await.contains("H:"));

    stream.write_all(b"W:hello").await.unwrap();
    let received = read_until(&mut stream, "R:5").await;
    assert!(received.contains("R:5"), "got {:?}", received);

    drop(stream);
    let processed = worker.await.unwrap().unwrap();
    assert_eq!(processed, 1);
}

#[tokio::test]
async fn test_worker_handles_consecutive_items() {
    let (listener, port) = listen().await;
    let client = WorkerClient::new(test_config(), token_length);
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (mut stream, _) = listener.accept().await.unwrap();

    stream.write_all(b"W:ab").await.unwrap();
    assert!(read_until(&mut stream, "R:2").await.contains("R:2"));
    stream.write_all(b"W:abcd").await.unwrap();
    assert!(read_until(&mut stream, "R:4").await.contains("R:4"));

    drop(stream);
    assert_eq!(worker.await.unwrap().unwrap(), 2);
}

#[tokio::test]
async fn test_worker_stops_on_non_work_message() {
    let (listener, port) = listen().await;
    let client = WorkerClient::new(test_config(), token_length);
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (mut stream, _) = listener.accept().await.unwrap();
    stream.write_all(b"H:").await.unwrap();

    let processed = timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker should stop")
        .unwrap()
        .unwrap();
    assert_eq!(processed, 0);
}

#[tokio::test]
async fn test_worker_drops_item_when_processing_fails() {
    let (listener, port) = listen().await;
    let failing = |_token: &str| -> Result<u64, ProcessError> {
        Err(ProcessError::Other("unreachable list".to_string()))
    };
    let client = WorkerClient::new(test_config(), failing);
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (mut stream, _) = listener.accept().await.unwrap();
    stream.write_all(b"W:x").await.unwrap();

    // The worker closes the connection without reporting a result
    let received = read_until(&mut stream, "R:").await;
    assert!(!received.contains("R:"));
    assert_eq!(worker.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn test_worker_gives_up_on_slow_processing() {
    let (listener, port) = listen().await;
    let slow = |_token: &str| -> Result<u64, ProcessError> {
        std::thread::sleep(Duration::from_secs(2));
        Ok(1)
    };
    let client = WorkerClient::new(test_config(), slow);
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (mut stream, _) = listener.accept().await.unwrap();
    stream.write_all(b"W:x").await.unwrap();

    let received = read_until(&mut stream, "R:").await;
    assert!(!received.contains("R:"));
    assert_eq!(worker.await.unwrap().unwrap(), 0);
}

// ============================================================
// heartbeats and lifecycle
// ============================================================

#[tokio::test]
async fn test_worker_sends_periodic_heartbeats() {
    let (listener, port) = listen().await;
    let client = WorkerClient::new(test_config(), token_length);
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (mut stream, _) = listener.accept().await.unwrap();
    let received = read_until(&mut stream, "H:H:H:").await;
    assert!(received.matches("H:").count() >= 3, "got {:?}", received);

    drop(stream);
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_worker_stops_when_cancelled() {
    let (listener, port) = listen().await;
    let client = WorkerClient::new(test_config(), token_length);
    let token = client.cancellation_token();
    let worker = tokio::spawn(async move { client.run("127.0.0.1", port).await });

    let (_stream, _) = listener.accept().await.unwrap();
    token.cancel();

    let processed = timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker should observe cancellation")
        .unwrap()
        .unwrap();
    assert_eq!(processed, 0);
}

#[tokio::test]
async fn test_worker_connect_failure() {
    let (listener, port) = listen().await;
    drop(listener);

    let client = WorkerClient::new(test_config(), token_length);
    let result = client.run("127.0.0.1", port).await;

    assert!(matches!(result, Err(WorkerError::Connect { .. })));
}
