// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for values figment cannot check.

use wagate_core::WagateError;

use crate::model::WagateConfig;

/// Validate a loaded configuration.
///
/// Figment guarantees types; this pass checks ranges and relationships.
pub fn validate_config(config: &WagateConfig) -> Result<(), WagateError> {
    if config.message_queue.concurrency == 0 {
        return Err(WagateError::Config(
            "message_queue.concurrency must be at least 1".to_string(),
        ));
    }
    if config.webhook_queue.concurrency == 0 {
        return Err(WagateError::Config(
            "webhook_queue.concurrency must be at least 1".to_string(),
        ));
    }
    if config.message_queue.rate_per_sec == 0 || config.webhook_queue.rate_per_sec == 0 {
        return Err(WagateError::Config(
            "queue rate_per_sec must be at least 1".to_string(),
        ));
    }
    if config.message_queue.max_attempts == 0 || config.webhook_queue.max_attempts == 0 {
        return Err(WagateError::Config(
            "queue max_attempts must be at least 1".to_string(),
        ));
    }
    if config.session.reconnect_cap_secs == 0 {
        return Err(WagateError::Config(
            "session.reconnect_cap_secs must be at least 1".to_string(),
        ));
    }
    if config.storage.database_path.is_empty() {
        return Err(WagateError::Config(
            "storage.database_path must not be empty".to_string(),
        ));
    }
    if config.server.api_key.as_deref() == Some("") {
        return Err(WagateError::Config(
            "server.api_key must not be an empty string".to_string(),
        ));
    }
    Ok(())
}
