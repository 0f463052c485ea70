// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message pipeline.
//!
//! The HTTP layer never talks to the transport directly: send requests become
//! [`wagate_core::OutboundJob`]s on the durable queue, and the
//! [`MessageWorker`] drains that queue against a concurrency limit and a
//! global rate gate. The [`MessageSender`] resolves the live connection and
//! performs one delivery attempt; retry policy stays in the worker.

pub mod sender;
pub mod worker;

pub use sender::MessageSender;
pub use worker::{submit, MessageWorker};
