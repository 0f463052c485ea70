// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Wagate gateway.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed CRUD operations for
//! sessions, templates, message logs, and the two crash-safe job queues
//! (outbound messages and webhook deliveries).

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;

/// Name of the outbound-message queue in the `queue` table.
pub const OUTBOUND_QUEUE: &str = "outbound";
