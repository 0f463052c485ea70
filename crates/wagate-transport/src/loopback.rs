// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process transport used for development wiring and integration tests.
//!
//! Pairing succeeds instantly: the connection emits one QR payload followed by
//! an `Open` event, and every send is recorded and acknowledged. Credential
//! material is a single marker file under the session's auth directory so the
//! logout cleanup path is observable on disk.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wagate_core::WagateError;

use crate::{
    DisconnectReason, MessageReceipt, OutboundContent, Transport, TransportEvent, TransportHandle,
    TransportSession,
};

const CREDS_FILE: &str = "creds.json";

/// Development transport: pairs instantly and records outbound sends.
#[derive(Default)]
pub struct LoopbackTransport;

impl LoopbackTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(
        &self,
        session_id: &str,
        auth_dir: &Path,
    ) -> Result<TransportSession, WagateError> {
        let creds_path = auth_dir.join(CREDS_FILE);
        let first_pairing = !creds_path.exists();
        tokio::fs::write(&creds_path, b"{}")
            .await
            .map_err(|e| WagateError::Transport {
                message: format!("failed to persist credentials for {session_id}"),
                source: Some(Box::new(e)),
            })?;

        let (events_tx, events) = mpsc::channel(64);
        let handle = Arc::new(LoopbackHandle {
            session_id: session_id.to_string(),
            events_tx: events_tx.clone(),
            sent: Mutex::new(Vec::new()),
        });

        let identity = format!("{session_id}@loopback");
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            if first_pairing {
                let qr = format!("loopback-pairing:{session_id}:{}", uuid::Uuid::new_v4());
                if events_tx.send(TransportEvent::Qr(qr)).await.is_err() {
                    return;
                }
            }
            let _ = events_tx.send(TransportEvent::Open { identity }).await;
        });

        Ok(TransportSession { handle, events })
    }
}

/// Live handle for a loopback connection.
pub struct LoopbackHandle {
    session_id: String,
    events_tx: mpsc::Sender<TransportEvent>,
    sent: Mutex<Vec<(String, OutboundContent)>>,
}

impl LoopbackHandle {
    /// Messages sent through this handle, in order.
    pub fn sent(&self) -> Vec<(String, OutboundContent)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl TransportHandle for LoopbackHandle {
    async fn send(
        &self,
        to: &str,
        content: OutboundContent,
    ) -> Result<MessageReceipt, WagateError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((to.to_string(), content));
        Ok(MessageReceipt {
            message_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn logout(&self) -> Result<(), WagateError> {
        tracing::debug!(session_id = %self.session_id, "loopback logout");
        let _ = self
            .events_tx
            .send(TransportEvent::Close {
                reason: DisconnectReason::LoggedOut,
            })
            .await;
        Ok(())
    }

    async fn close(&self) {
        let _ = self
            .events_tx
            .send(TransportEvent::Close {
                reason: DisconnectReason::ConnectionLost,
            })
            .await;
    }
}
