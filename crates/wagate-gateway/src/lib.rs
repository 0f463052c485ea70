// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API gateway built on axum.
//!
//! Exposes session lifecycle, message sending, template CRUD, and message-log
//! endpoints under `/api`, all behind `X-API-Key` auth (fail-closed). Send
//! endpoints only admit and enqueue; delivery happens in the queue workers.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod qr;
pub mod request_id;
pub mod server;

pub use server::{build_router, start_server, AppState};
