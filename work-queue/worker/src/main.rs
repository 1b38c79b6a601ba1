// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use work_queue_core::{load_config, HostOccurrenceCounter, WorkerClient, WorkerConfig};

/// Connects to the coordinator at HOST:PORT and processes the work it hands out
#[derive(Debug, Parser)]
#[command(name = "work-queue-worker")]
struct Args {
    host: String,

    port: u16,

    /// Optional JSON tuning file
    #[arg(long)]
    config: Option<String>,
}

fn load_worker_config(path: Option<&str>) -> WorkerConfig {
    let Some(path) = path else {
        return WorkerConfig::default();
    };

    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            error!("Using default configuration...");
            WorkerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_worker_config(args.config.as_deref());

    let processor =
        HostOccurrenceCounter::new(config.target_host.clone(), config.process_timeout());
    let client = WorkerClient::new(config, processor);

    let ctrl_c_token = client.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, initiating shutdown");
            ctrl_c_token.cancel();
        }
    });

    match client.run(&args.host, args.port).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}
