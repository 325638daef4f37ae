// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./proplink.toml` > `~/.config/proplink/proplink.toml`
//! > `/etc/proplink/proplink.toml` with environment variable overrides via
//! `PROPLINK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ProplinkConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/proplink/proplink.toml` (system-wide)
/// 3. `~/.config/proplink/proplink.toml` (user XDG config)
/// 4. `./proplink.toml` (local directory)
/// 5. `PROPLINK_*` environment variables
pub fn load_config() -> Result<ProplinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProplinkConfig::default()))
        .merge(Toml::file("/etc/proplink/proplink.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("proplink/proplink.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("proplink.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ProplinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProplinkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ProplinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProplinkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `PROPLINK_TRANSPORT_MAX_SEND_ATTEMPTS`
/// must map to `transport.max_send_attempts`, not `transport.max.send.attempts`.
fn env_provider() -> Env {
    Env::prefixed("PROPLINK_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: PROPLINK_STORAGE_DATABASE_PATH -> "storage_database_path"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("transport_", "transport.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("otp_", "otp.", 1)
            .replacen("classifier_", "classifier.", 1);
        mapped.into()
    })
}
