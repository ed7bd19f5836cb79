/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use lecture_sched::config::ServerConfig;
use lecture_sched::engine::ScheduleEngine;
use lecture_sched::gateway;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Lecture timetable server.
///
/// Example:
///   lecture-sched -p 1234 --config server.yaml
#[derive(Debug, Parser)]
#[command(
    name = "lecture-sched",
    about = "Lecture timetable server",
    long_about = None,
)]
struct Cli {
    /// Address to listen on (overrides `server.bind`).
    #[arg(short = 'b', long = "bind")]
    bind: Option<String>,

    /// TCP port for the line protocol (overrides `server.port`).
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Maximum simultaneously served clients (overrides `server.max_connections`).
    #[arg(short = 'm', long = "max-connections")]
    max_connections: Option<usize>,

    /// Threads in the early-lectures shift pool, 0 = one per CPU
    /// (overrides `shift.workers`).
    #[arg(short = 'w', long = "shift-workers")]
    shift_workers: Option<usize>,

    /// Path to the YAML server configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layers CLI flags over the (possibly default) file configuration.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max) = self.max_connections {
            config.server.max_connections = max;
        }
        if let Some(workers) = self.shift_workers {
            config.shift.workers = workers;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("lecture-sched starting up...");

    let cli = Cli::parse();

    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => match ServerConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load server configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {:#}", e);
        process::exit(1);
    }

    info!(
        address         = %config.server.address(),
        max_connections = config.server.max_connections,
        shift_workers   = config.shift.worker_count(),
        threshold       = config.shift.sequential_threshold,
        "Configuration"
    );

    // ── Engine + listener ─────────────────────────────────────────────────────
    let engine = match ScheduleEngine::new(&config.shift) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("Failed to start schedule engine: {:#}", e);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(config.server.address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.server.address(), e);
            process::exit(1);
        }
    };

    tokio::select! {
        result = gateway::serve(listener, engine, config.server.max_connections) => {
            if let Err(e) = result {
                error!("Server error: {:#}", e);
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, stopping server");
        }
    }
}
