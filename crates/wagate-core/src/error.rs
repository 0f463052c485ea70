// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Wagate gateway.

use thiserror::Error;

/// The primary error type used across all Wagate crates.
#[derive(Debug, Error)]
pub enum WagateError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport errors (connection failure, send failure, protocol rejection).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A requested resource (session, template, job) does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Session id exists but the supplied webhook URL does not match the
    /// stored one. Prevents reuse of another tenant's session id.
    #[error("session id exists but ownership verification failed: {session_id}")]
    Ownership { session_id: String },

    /// Client input was missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WagateError {
    /// Stable machine-readable error code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            WagateError::Config(_) => "CONFIG_ERROR",
            WagateError::Storage { .. } => "STORAGE_ERROR",
            WagateError::Transport { .. } => "TRANSPORT_ERROR",
            WagateError::NotFound { .. } => "NOT_FOUND",
            WagateError::Ownership { .. } => "FORBIDDEN",
            WagateError::Validation(_) => "VALIDATION_ERROR",
            WagateError::Timeout { .. } => "TIMEOUT",
            WagateError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}
