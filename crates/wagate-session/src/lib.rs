// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle orchestration.
//!
//! The [`SessionManager`] owns the mapping between durable session rows and
//! live transport connections: starting and restoring sessions, driving the
//! QR pairing state machine from transport events, scheduling bounded-backoff
//! reconnection after transient drops, and tearing sessions down on stop and
//! logout. Every observable state change is persisted before the matching
//! webhook event is enqueued, so a crash never produces a notification for a
//! state that was not recorded.

mod connection;
pub mod manager;
pub mod store;

pub use manager::SessionManager;
pub use store::{LiveSession, SessionSnapshot, SessionStore};
