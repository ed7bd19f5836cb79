//! Server configuration loading.
//!
//! All settings have defaults, so the server runs without any file.  An
//! optional YAML file can override them, and CLI flags in `main.rs` override
//! the file.
//!
//! The expected YAML structure is:
//! ```yaml
//! server:
//!   bind: "0.0.0.0"
//!   port: 1234
//!   max_connections: 1024
//! shift:
//!   workers: 0              # 0 = one worker per available CPU
//!   sequential_threshold: 3
//! ```

use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Well-known protocol port.
pub const DEFAULT_PORT: u16 = 1234;

pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Upper bound on simultaneously served client connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Lecture lists at or below this length are shifted sequentially.
pub const DEFAULT_SEQUENTIAL_THRESHOLD: usize = 3;

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_sequential_threshold() -> usize {
    DEFAULT_SEQUENTIAL_THRESHOLD
}

// ── Public data structures ────────────────────────────────────────────────────

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connections beyond this many wait in the accept queue.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl ListenConfig {
    /// `host:port` string accepted by `TcpListener::bind`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Settings for the early-lectures worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShiftConfig {
    /// Worker threads in the shift pool.  `0` sizes the pool to the
    /// available hardware parallelism.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_sequential_threshold")]
    pub sequential_threshold: usize,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            sequential_threshold: default_sequential_threshold(),
        }
    }
}

impl ShiftConfig {
    /// Resolved pool size (never zero).
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub shift: ShiftConfig,
}

impl ServerConfig {
    /// Parses `path` as YAML, filling absent fields with defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is structurally
    /// invalid, or a value fails [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading server configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        // An empty file deserialises to `null`; treat it as "all defaults".
        let config: ServerConfig = if content.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        config.validate()?;

        debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Rejects values that would leave the server unable to make progress.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            bail!("server.max_connections must be at least 1");
        }
        if self.shift.sequential_threshold == 0 {
            bail!("shift.sequential_threshold must be at least 1");
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
