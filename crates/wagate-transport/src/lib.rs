// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport abstraction over the underlying chat protocol.
//!
//! The gateway drives the protocol through two narrow traits: [`Transport`]
//! opens one connection per session, and [`TransportHandle`] exposes the send
//! and teardown primitives of a live connection. Lifecycle is reported as a
//! stream of [`TransportEvent`]s consumed by the session layer. The wire
//! protocol itself (framing, pairing cryptography) is an external collaborator
//! and is not implemented here.

pub mod loopback;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wagate_core::{MediaType, WagateError};

/// Why a connection closed, as reported by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The identity was logged out (from the phone or another device).
    /// Terminal: reconnecting with the same credentials cannot succeed.
    LoggedOut,
    /// The socket dropped or the server closed the stream.
    ConnectionLost,
    /// The server asked for a reconnect (restart required).
    RestartRequired,
    /// Keepalive timed out.
    TimedOut,
}

impl DisconnectReason {
    /// Whether the session layer should schedule an automatic reconnection.
    pub fn should_reconnect(&self) -> bool {
        !matches!(self, DisconnectReason::LoggedOut)
    }
}

/// An inbound message decrypted by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    pub text: Option<String>,
    pub message_type: String,
    pub timestamp: String,
}

/// Lifecycle and message events for one session's connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A pairing QR payload was issued. May repeat as codes rotate.
    Qr(String),
    /// The connection is open and authenticated.
    Open { identity: String },
    /// The connection closed.
    Close { reason: DisconnectReason },
    /// An inbound message arrived.
    Message(InboundMessage),
}

/// Payload shapes accepted by [`TransportHandle::send`].
///
/// Mirrors the protocol's message content union: plain text, URL-referenced
/// media, and raw byte payloads whose shape was selected from the content
/// type.
#[derive(Debug, Clone)]
pub enum OutboundContent {
    Text {
        text: String,
    },
    MediaUrl {
        media_type: MediaType,
        url: String,
        caption: Option<String>,
    },
    Image {
        bytes: Vec<u8>,
        mime_type: String,
        caption: Option<String>,
    },
    Video {
        bytes: Vec<u8>,
        mime_type: String,
        caption: Option<String>,
    },
    Audio {
        bytes: Vec<u8>,
        mime_type: String,
    },
    Document {
        bytes: Vec<u8>,
        mime_type: String,
        file_name: String,
        caption: Option<String>,
    },
}

/// Receipt returned by a successful send.
#[derive(Debug, Clone)]
pub struct MessageReceipt {
    pub message_id: String,
}

/// A live connection plus its event stream.
///
/// The handle is shared (the session store and the message worker both hold
/// it); the event receiver is consumed exclusively by the connection handler.
pub struct TransportSession {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Factory for per-session protocol connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection for `session_id`, loading or creating credential
    /// material under `auth_dir`.
    async fn connect(
        &self,
        session_id: &str,
        auth_dir: &Path,
    ) -> Result<TransportSession, WagateError>;
}

/// Send and teardown primitives of one live connection.
#[async_trait]
pub trait TransportHandle: Send + Sync + 'static {
    /// Send one message to `to`. No retries at this layer.
    async fn send(&self, to: &str, content: OutboundContent)
        -> Result<MessageReceipt, WagateError>;

    /// Revoke the credentials server-side. The connection is unusable after.
    async fn logout(&self) -> Result<(), WagateError>;

    /// Close the connection without revoking credentials.
    async fn close(&self);
}
