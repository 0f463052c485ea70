// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Wagate gateway.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides via the `WAGATE_` prefix.

#![allow(clippy::result_large_err)]

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{QueueConfig, ServerConfig, SessionConfig, StorageConfig, WagateConfig};

use wagate_core::WagateError;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<WagateConfig, WagateError> {
    let config = loader::load_config().map_err(|e| WagateError::Config(e.to_string()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from an explicit path and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<WagateConfig, WagateError> {
    let config =
        loader::load_config_from_path(path).map_err(|e| WagateError::Config(e.to_string()))?;
    validation::validate_config(&config)?;
    Ok(config)
}
