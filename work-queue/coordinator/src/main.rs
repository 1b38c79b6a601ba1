// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use work_queue_core::{
    load_config, CoordinatorConfig, EventMultiplexer, FileWorkSource, HttpWorkSource,
    WorkCoordinator, WorkSource,
};

/// Distributes a work list across the workers that connect to PORT and
/// prints the sum of their results
#[derive(Debug, Parser)]
#[command(name = "work-queue-coordinator")]
struct Args {
    /// HTTP(S) URL or file path of the newline separated work list
    work_source: String,

    /// TCP port workers connect to
    port: u16,

    /// Optional JSON tuning file
    #[arg(long)]
    config: Option<String>,
}

fn load_coordinator_config(path: Option<&str>) -> CoordinatorConfig {
    let Some(path) = path else {
        return CoordinatorConfig::default();
    };

    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            error!("Using default configuration...");
            CoordinatorConfig::default()
        }
    }
}

fn work_source(location: &str, config: &CoordinatorConfig) -> Box<dyn WorkSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpWorkSource::new(location, config.work_source_timeout()))
    } else {
        Box::new(FileWorkSource::new(location))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_coordinator_config(args.config.as_deref());

    let source = work_source(&args.work_source, &config);
    let mut coordinator = match WorkCoordinator::from_source(source.as_ref()) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Loaded {} work items", coordinator.queue_len());

    let mut multiplexer = EventMultiplexer::new(config);
    if let Err(e) = multiplexer.start(args.port) {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let shutdown = multiplexer.shutdown_signal();
    if let Err(e) = ctrlc::set_handler(move || shutdown.shutdown()) {
        error!("Failed to install signal handler: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = multiplexer.run(&mut coordinator) {
        error!("Event loop failed: {}", e);
    }

    println!("{}", coordinator.aggregate());
    ExitCode::SUCCESS
}
