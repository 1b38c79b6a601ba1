// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod client_event;
pub use client_event::{ClientEvent, WorkerId};

mod worker_action;
pub use worker_action::WorkerAction;

mod protocol_message;
pub use protocol_message::ProtocolMessage;

mod error;
pub use error::{ConfigError, ConnectionError, ProcessError, SetupError, WorkSourceError, WorkerError};

mod config;
pub use config::{load_config, CoordinatorConfig, WorkerConfig};

mod shutdown_signal;
pub use shutdown_signal::ShutdownSignal;

mod liveness_timer;
pub use liveness_timer::LivenessTimer;

mod connection;
pub use connection::Connection;

mod connection_registry;
pub use connection_registry::ConnectionRegistry;

mod event_handler;
pub use event_handler::EventHandler;

mod event_multiplexer;
pub use event_multiplexer::EventMultiplexer;

mod work_coordinator;
pub use work_coordinator::WorkCoordinator;

pub mod work_source;
pub use work_source::{FileWorkSource, HttpWorkSource, StaticWorkSource, WorkSource};

pub mod item_processor;
pub use item_processor::{count_host_occurrences, HostOccurrenceCounter, ItemProcessor};

mod worker_client;
pub use worker_client::WorkerClient;
