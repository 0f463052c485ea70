// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.

use wagate_core::SessionStatus;

/// A durable session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub webhook_url: Option<String>,
    pub status: SessionStatus,
    pub protocol_identity: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A message template with `{{var}}` placeholders.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub language: String,
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A message-log row (inbound or outbound).
#[derive(Debug, Clone)]
pub struct MessageLog {
    pub id: i64,
    pub session_id: String,
    pub direction: String,
    pub message_id: Option<String>,
    pub recipient: Option<String>,
    pub message_type: Option<String>,
    pub content_preview: Option<String>,
    pub status: Option<String>,
    pub timestamp: String,
}

/// Insert form for a message-log row (id and timestamp are assigned by SQLite).
#[derive(Debug, Clone, Default)]
pub struct NewMessageLog {
    pub session_id: String,
    pub direction: String,
    pub message_id: Option<String>,
    pub recipient: Option<String>,
    pub message_type: Option<String>,
    pub content_preview: Option<String>,
    pub status: Option<String>,
}

/// An entry on the durable outbound-message queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A webhook delivery job. Terminally failed rows are retained.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub id: i64,
    pub session_id: Option<String>,
    pub webhook_url: String,
    pub event_type: String,
    pub payload: String,
    pub event_timestamp: String,
    pub request_id: Option<String>,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub last_attempt_at: Option<String>,
    pub created_at: String,
}

/// Outcome of marking a queue entry as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The entry was rescheduled for another attempt.
    Retrying { attempts: i64 },
    /// The attempt budget is exhausted; the entry is terminally failed.
    Terminal,
}

impl FailOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailOutcome::Terminal)
    }
}
