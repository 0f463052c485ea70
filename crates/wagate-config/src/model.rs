// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model with strict field validation.
//!
//! Every section derives `deny_unknown_fields` so a typo in a TOML key fails
//! loudly at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WagateConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub message_queue: QueueConfig,
    pub webhook_queue: QueueConfig,
}

impl Default for WagateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            message_queue: QueueConfig::default(),
            webhook_queue: QueueConfig::webhook_defaults(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Shared secret expected in the `X-API-Key` header. When unset, the API
    /// rejects every request (fail-closed).
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_key: None,
        }
    }
}

/// Filesystem and database locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// SQLite database file path.
    pub database_path: String,
    /// Directory holding per-session transport credential material.
    pub auth_dir: String,
    /// Directory holding transient upload blobs owned by file jobs.
    pub upload_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/wagate.db".to_string(),
            auth_dir: "data/auth".to_string(),
            upload_dir: "data/uploads".to_string(),
        }
    }
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    /// Consecutive failed reconnection attempts before a session is parked
    /// in STOPPED_ERROR.
    pub max_reconnect_attempts: u32,
    /// Ceiling on the exponential reconnection delay, in seconds.
    pub reconnect_cap_secs: u64,
    /// Inter-session delay during boot-time restore, in milliseconds.
    pub restore_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 10,
            reconnect_cap_secs: 300,
            restore_delay_ms: 500,
        }
    }
}

/// Worker execution policy for one durable queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct QueueConfig {
    /// Maximum jobs in flight at once.
    pub concurrency: usize,
    /// Global ceiling on job starts per second.
    pub rate_per_sec: u32,
    /// Attempt budget before a job is marked terminally failed.
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            rate_per_sec: 10,
            max_attempts: 3,
        }
    }
}

impl QueueConfig {
    /// Defaults for the webhook delivery queue, which tolerates longer
    /// customer-side outages than the transport-bound message queue.
    pub fn webhook_defaults() -> Self {
        Self {
            concurrency: 10,
            rate_per_sec: 50,
            max_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = WagateConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.message_queue.concurrency, 5);
        assert_eq!(config.message_queue.rate_per_sec, 10);
        assert_eq!(config.message_queue.max_attempts, 3);
        assert_eq!(config.session.max_reconnect_attempts, 10);
        assert_eq!(config.session.reconnect_cap_secs, 300);
        assert_eq!(config.session.restore_delay_ms, 500);
        assert_eq!(config.webhook_queue.concurrency, 10);
        assert_eq!(config.webhook_queue.rate_per_sec, 50);
        assert_eq!(config.webhook_queue.max_attempts, 5);
    }

    #[test]
    fn webhook_queue_defaults() {
        let q = QueueConfig::webhook_defaults();
        assert_eq!(q.concurrency, 10);
        assert_eq!(q.rate_per_sec, 50);
        assert_eq!(q.max_attempts, 5);
    }
}
