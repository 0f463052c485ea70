// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wagate gateway.
//!
//! This crate provides the error type, shared domain types (session status,
//! outbound jobs, webhook event names), and the backoff helper used by the
//! retry and reconnection paths throughout the workspace.

pub mod backoff;
pub mod error;
pub mod types;

pub use error::WagateError;
pub use types::{directions, webhook_events, MediaType, OutboundJob, SessionStatus};
