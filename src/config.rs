// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Default sheet holding the appended activity log.
pub const DEFAULT_LOGS_RANGE: &str = "Logs!A:D";
/// Default roster range (`team, activity id, activity name`).
pub const DEFAULT_CONFIG_RANGE: &str = "CONFIG!A:C";
/// Default team list range.
pub const DEFAULT_TEAMS_RANGE: &str = "CONFIG!A:A";
/// Name of the single periodic sync timer.
pub const DEFAULT_SYNC_ALARM_NAME: &str = "activityTrackerSync";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Spreadsheet that holds the roster and the activity log
    pub spreadsheet_id: String,
    /// Minutes between scheduled flushes
    pub sync_interval_minutes: u64,
    /// Timer name (persisted so restarts can find it)
    pub sync_alarm_name: String,
    /// Days of sync history kept for fallback reconciliation
    pub sync_history_retention_days: i64,
    /// Days a cached roster is considered fresh
    pub roster_cache_days: i64,
    pub logs_range: String,
    pub config_range: String,
    pub teams_range: String,
    /// JSON document backing the local store
    pub data_path: PathBuf,
    /// Server port
    pub port: u16,
    /// Origin of the UI process allowed by CORS
    pub ui_origin: String,

    // --- Identity ---
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_refresh_token: Option<String>,
    /// Fixed bearer token (local development)
    pub google_access_token: Option<String>,
    pub google_user_email: Option<String>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            spreadsheet_id: "test-spreadsheet".to_string(),
            sync_interval_minutes: 15,
            sync_alarm_name: DEFAULT_SYNC_ALARM_NAME.to_string(),
            sync_history_retention_days: 7,
            roster_cache_days: 30,
            logs_range: DEFAULT_LOGS_RANGE.to_string(),
            config_range: DEFAULT_CONFIG_RANGE.to_string(),
            teams_range: DEFAULT_TEAMS_RANGE.to_string(),
            data_path: PathBuf::from("data/test_activity_tally.json"),
            port: 8080,
            ui_origin: "http://localhost:5173".to_string(),
            google_client_id: None,
            google_client_secret: None,
            google_refresh_token: None,
            google_access_token: Some("test_access_token".to_string()),
            google_user_email: Some("test@example.com".to_string()),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            spreadsheet_id: env::var("SPREADSHEET_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SPREADSHEET_ID"))?,
            sync_interval_minutes: parse_or("SYNC_INTERVAL_MINUTES", 15)?,
            sync_alarm_name: env::var("SYNC_ALARM_NAME")
                .unwrap_or_else(|_| DEFAULT_SYNC_ALARM_NAME.to_string()),
            sync_history_retention_days: parse_or("SYNC_HISTORY_RETENTION_DAYS", 7)?,
            roster_cache_days: parse_or("ROSTER_CACHE_DAYS", 30)?,
            logs_range: env::var("LOGS_RANGE").unwrap_or_else(|_| DEFAULT_LOGS_RANGE.to_string()),
            config_range: env::var("CONFIG_RANGE")
                .unwrap_or_else(|_| DEFAULT_CONFIG_RANGE.to_string()),
            teams_range: env::var("TEAMS_RANGE")
                .unwrap_or_else(|_| DEFAULT_TEAMS_RANGE.to_string()),
            data_path: env::var("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/activity_tally.json")),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            ui_origin: env::var("UI_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string()),

            google_client_id: optional("GOOGLE_CLIENT_ID"),
            google_client_secret: optional("GOOGLE_CLIENT_SECRET"),
            google_refresh_token: optional("GOOGLE_REFRESH_TOKEN"),
            google_access_token: optional("GOOGLE_ACCESS_TOKEN"),
            google_user_email: optional("GOOGLE_USER_EMAIL"),
        };

        if config.sync_interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: "SYNC_INTERVAL_MINUTES",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(config)
    }

    /// Scheduled flush period.
    pub fn sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync_interval_minutes * 60)
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("cannot parse {:?}", raw),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
