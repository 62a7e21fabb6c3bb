//! Configuration module for the backup service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bcup_core::{BackupConfig, BcupError};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Backup storage settings; each project gets a directory below `backup_dir`
    pub backup: BackupConfig,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Requests allowed per client and window; 0 disables limiting
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables (and a `.env` file).
    pub fn from_env() -> bcup_core::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> bcup_core::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BCUP_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| BcupError::validation(format!("Invalid BCUP_BIND_ADDR: {e}")))?;

        let backup_dir: PathBuf = lookup("BCUP_BACKUP_DIR")
            .unwrap_or_else(|| "./backups".to_string())
            .into();

        let log_level = lookup("BCUP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_json = lookup("BCUP_LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let rate_limit = parse_number(&lookup, "BCUP_RATE_LIMIT", 100)?;
        let rate_window = Duration::from_secs(parse_number(&lookup, "BCUP_RATE_WINDOW_SECS", 3600)?);

        let config = Self {
            bind_addr,
            backup: BackupConfig::new(backup_dir),
            log_level,
            log_json,
            rate_limit,
            rate_window,
        };
        config.backup.validate()?;
        Ok(config)
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> bcup_core::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BcupError::validation(format!("Invalid {key}: {e}"))),
    }
}
