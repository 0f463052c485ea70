// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared domain types for sessions, outbound jobs, and webhook events.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Durable lifecycle status of a session.
///
/// The wire form (`Display`/`FromStr`, serde) is SCREAMING_SNAKE_CASE to match
/// the values persisted in the `sessions.status` column and surfaced over the
/// HTTP API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Connecting,
    ScanningQr,
    Connected,
    Disconnected,
    Stopped,
    StoppedError,
}

impl SessionStatus {
    /// Whether a session in this durable state should be restored at boot.
    pub fn is_restorable(&self) -> bool {
        !matches!(self, SessionStatus::Stopped | SessionStatus::StoppedError)
    }
}

/// Declared media type for URL-referenced media sends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Document,
}

/// A job on the durable outbound-message queue.
///
/// Serialized as JSON into the `queue.payload` column. The `type` tag matches
/// the four send operations exposed by the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundJob {
    Text {
        session_id: String,
        to: String,
        message: String,
    },
    Media {
        session_id: String,
        to: String,
        media_type: MediaType,
        media_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    /// A local-file send. The blob at `path` is owned by this job until a
    /// terminal outcome; the worker deletes it exactly once.
    File {
        session_id: String,
        to: String,
        path: String,
        mime_type: String,
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Template {
        session_id: String,
        to: String,
        template_name: String,
        #[serde(default)]
        variables: std::collections::HashMap<String, String>,
    },
}

impl OutboundJob {
    pub fn session_id(&self) -> &str {
        match self {
            OutboundJob::Text { session_id, .. }
            | OutboundJob::Media { session_id, .. }
            | OutboundJob::File { session_id, .. }
            | OutboundJob::Template { session_id, .. } => session_id,
        }
    }

    /// Message type label used in `message_logs.message_type`.
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundJob::Text { .. } => "text",
            OutboundJob::Media { .. } => "media",
            OutboundJob::File { .. } => "file",
            OutboundJob::Template { .. } => "template",
        }
    }
}

/// Webhook event names delivered to customer endpoints.
pub mod webhook_events {
    pub const QR_CODE: &str = "qr_code";
    pub const CONNECTION_UPDATE: &str = "connection_update";
    pub const MESSAGE_RECEIVED: &str = "message_received";
}

/// Direction labels for `message_logs.direction`.
pub mod directions {
    pub const INCOMING: &str = "incoming";
    pub const OUTGOING: &str = "outgoing";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn session_status_wire_form_round_trips() {
        for (status, wire) in [
            (SessionStatus::Connecting, "CONNECTING"),
            (SessionStatus::ScanningQr, "SCANNING_QR"),
            (SessionStatus::Connected, "CONNECTED"),
            (SessionStatus::Disconnected, "DISCONNECTED"),
            (SessionStatus::Stopped, "STOPPED"),
            (SessionStatus::StoppedError, "STOPPED_ERROR"),
        ] {
            assert_eq!(status.to_string(), wire);
            assert_eq!(SessionStatus::from_str(wire).unwrap(), status);
        }
    }

    #[test]
    fn restorable_excludes_stopped_states() {
        assert!(SessionStatus::Connecting.is_restorable());
        assert!(SessionStatus::Connected.is_restorable());
        assert!(SessionStatus::Disconnected.is_restorable());
        assert!(!SessionStatus::Stopped.is_restorable());
        assert!(!SessionStatus::StoppedError.is_restorable());
    }

    #[test]
    fn outbound_job_serializes_with_type_tag() {
        let job = OutboundJob::Text {
            session_id: "s1".into(),
            to: "123@c.us".into(),
            message: "hello".into(),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""type":"text""#));

        let parsed: OutboundJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
        assert_eq!(parsed.session_id(), "s1");
        assert_eq!(parsed.message_type(), "text");
    }

    #[test]
    fn media_job_omits_missing_caption() {
        let job = OutboundJob::Media {
            session_id: "s1".into(),
            to: "123@c.us".into(),
            media_type: MediaType::Image,
            media_url: "https://example.com/pic.png".into(),
            caption: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(!json.contains("caption"));
        assert!(json.contains(r#""media_type":"image""#));
    }

    #[test]
    fn template_job_defaults_empty_variables() {
        let json = r#"{"type":"template","session_id":"s1","to":"1@c.us","template_name":"welcome"}"#;
        let parsed: OutboundJob = serde_json::from_str(json).unwrap();
        match parsed {
            OutboundJob::Template { variables, .. } => assert!(variables.is_empty()),
            other => panic!("unexpected job: {other:?}"),
        }
    }
}
