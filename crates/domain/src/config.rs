//! Configuration structures
//!
//! Loaded by the infra config loader from environment variables or a
//! JSON/TOML file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LOOKAHEAD_HOURS, DEFAULT_LOOKBACK_HOURS};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Periodic sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Six-field cron expression for the poll schedule.
    pub cron_expression: String,
    /// User ids to poll for.
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: u32,
}

/// Google Calendar API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Per-user OAuth refresh tokens (user id → token).
    #[serde(default)]
    pub refresh_tokens: HashMap<String, String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:8700".to_string() }
    }
}

fn default_true() -> bool {
    true
}

fn default_lookback_hours() -> u32 {
    DEFAULT_LOOKBACK_HOURS
}

fn default_lookahead_hours() -> u32 {
    DEFAULT_LOOKAHEAD_HOURS
}
