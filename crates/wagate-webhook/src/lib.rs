// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event fan-out for the Wagate gateway.
//!
//! Session lifecycle and inbound-message events are enqueued as durable
//! delivery jobs by the [`WebhookDispatcher`] and posted to the customer's
//! endpoint by the [`WebhookWorker`]. Enqueueing is fire-and-forget from the
//! caller's perspective: retries, backoff, and terminal-failure retention all
//! happen on the worker side.

pub mod dispatcher;
pub mod worker;

pub use dispatcher::WebhookDispatcher;
pub use worker::WebhookWorker;
