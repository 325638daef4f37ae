// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Proplink conversation engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Proplink configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProplinkConfig {
    /// Engine identity and behavior settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Transport connection and delivery settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// OTP verification settings.
    #[serde(default)]
    pub otp: OtpConfig,

    /// Intent classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Engine identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Display name of the engine.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Country calling code used to canonicalize sender phone numbers.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Minimum characters an incident description must have.
    #[serde(default = "default_min_description_len")]
    pub min_description_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
            country_code: default_country_code(),
            min_description_len: default_min_description_len(),
        }
    }
}

fn default_engine_name() -> String {
    "proplink".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_country_code() -> String {
    "27".to_string()
}

fn default_min_description_len() -> usize {
    10
}

/// Transport connection and outbound delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Session identifier for this account's connection.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Seconds to wait before reconnecting after a non-logout closure.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Seconds between disconnect and connect in an explicit reconnect.
    #[serde(default = "default_reconnect_pause_secs")]
    pub reconnect_pause_secs: u64,

    /// Maximum delivery attempts per outbound send.
    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,

    /// Base backoff delay between retries in milliseconds (doubles per attempt).
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            reconnect_pause_secs: default_reconnect_pause_secs(),
            max_send_attempts: default_max_send_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_session_id() -> String {
    "main".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_reconnect_pause_secs() -> u64 {
    1
}

fn default_max_send_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("proplink").join("proplink.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("proplink.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// OTP verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OtpConfig {
    /// Seconds an issued code stays valid.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl_secs(),
        }
    }
}

fn default_code_ttl_secs() -> u64 {
    600
}

/// Intent classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Confidence below which a classification forces explicit confirmation.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.7
}
