// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Proplink conversation engine.
//!
//! TOML files merged through Figment with `PROPLINK_` environment variable
//! overrides. See [`loader`] for the merge hierarchy.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ProplinkConfig;
