//! Configuration loader
//!
//! Loads service configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `AQADEMIQ_DB_PATH`: Database file path
//! - `AQADEMIQ_DB_POOL_SIZE`: Connection pool size
//! - `AQADEMIQ_SYNC_CRON`: Six-field cron expression for the poll schedule
//! - `AQADEMIQ_SYNC_USERS`: Comma-separated user ids to poll
//! - `AQADEMIQ_SYNC_ENABLED`: Whether sync is enabled (true/false)
//! - `AQADEMIQ_SYNC_LOOKBACK_HOURS` / `AQADEMIQ_SYNC_LOOKAHEAD_HOURS`:
//!   initial poll window (optional)
//! - `AQADEMIQ_GOOGLE_CLIENT_ID` / `AQADEMIQ_GOOGLE_CLIENT_SECRET`: OAuth
//!   client credentials
//! - `AQADEMIQ_GOOGLE_REFRESH_TOKENS`: `user=token` pairs, comma-separated
//! - `AQADEMIQ_BIND_ADDR`: HTTP listen address (optional)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aqademiq_domain::constants::{DEFAULT_LOOKAHEAD_HOURS, DEFAULT_LOOKBACK_HOURS};
use aqademiq_domain::{
    AqademiqError, Config, DatabaseConfig, GoogleConfig, Result, ServerConfig, SyncConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `AqademiqError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Returns an error
/// if any are missing.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("AQADEMIQ_DB_PATH")?;
    let db_pool_size = env_var("AQADEMIQ_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| AqademiqError::Config(format!("Invalid pool size: {e}")))
    })?;

    let cron_expression = env_var("AQADEMIQ_SYNC_CRON")?;
    let users = std::env::var("AQADEMIQ_SYNC_USERS")
        .ok()
        .map(|raw| {
            raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
        })
        .unwrap_or_default();
    let sync_enabled = env_bool("AQADEMIQ_SYNC_ENABLED", true);
    let lookback_hours = env_u32("AQADEMIQ_SYNC_LOOKBACK_HOURS", DEFAULT_LOOKBACK_HOURS)?;
    let lookahead_hours = env_u32("AQADEMIQ_SYNC_LOOKAHEAD_HOURS", DEFAULT_LOOKAHEAD_HOURS)?;

    let client_id = env_var("AQADEMIQ_GOOGLE_CLIENT_ID")?;
    let client_secret = env_var("AQADEMIQ_GOOGLE_CLIENT_SECRET")?;
    let refresh_tokens = std::env::var("AQADEMIQ_GOOGLE_REFRESH_TOKENS")
        .ok()
        .map(|raw| parse_refresh_tokens(&raw))
        .transpose()?
        .unwrap_or_default();

    let server = match std::env::var("AQADEMIQ_BIND_ADDR") {
        Ok(bind_addr) => ServerConfig { bind_addr },
        Err(_) => ServerConfig::default(),
    };

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        sync: SyncConfig {
            cron_expression,
            users,
            enabled: sync_enabled,
            lookback_hours,
            lookahead_hours,
        },
        google: GoogleConfig { client_id, client_secret, refresh_tokens },
        server,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AqademiqError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AqademiqError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AqademiqError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AqademiqError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AqademiqError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AqademiqError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, up to two parent levels, and the
/// executable's directory for `config.{json,toml}` / `aqademiq.{json,toml}`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("aqademiq.json"),
            cwd.join("aqademiq.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("aqademiq.json"),
                exe_dir.join("aqademiq.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Parse `user=token` pairs from a comma-separated env value.
fn parse_refresh_tokens(raw: &str) -> Result<HashMap<String, String>> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (user, token) = pair.split_once('=').ok_or_else(|| {
            AqademiqError::Config(format!("Invalid refresh token entry (want user=token): {pair}"))
        })?;
        tokens.insert(user.trim().to_string(), token.trim().to_string());
    }
    Ok(tokens)
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        AqademiqError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_u32(key: &str, default: u32) -> Result<u32> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|e| AqademiqError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
