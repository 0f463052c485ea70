// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session event loop and reconnection scheduling.
//!
//! Each live session has exactly one handler task consuming its transport
//! events in order. The handler holds only a `Weak` reference to the manager:
//! when the manager is dropped at shutdown, in-flight handlers wind down
//! instead of keeping it alive.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use wagate_core::backoff::exponential_delay;
use wagate_core::{directions, webhook_events, SessionStatus};
use wagate_storage::models::NewMessageLog;
use wagate_storage::queries::{messages, sessions};
use wagate_transport::{DisconnectReason, InboundMessage, TransportEvent};

use crate::manager::SessionManager;

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const PREVIEW_MAX: usize = 120;

pub(crate) fn spawn_event_loop(
    manager: &Arc<SessionManager>,
    session_id: String,
    events: mpsc::Receiver<TransportEvent>,
) {
    let weak = Arc::downgrade(manager);
    tokio::spawn(run_event_loop(weak, session_id, events));
}

async fn run_event_loop(
    manager: Weak<SessionManager>,
    session_id: String,
    mut events: mpsc::Receiver<TransportEvent>,
) {
    let close_reason = loop {
        let Some(event) = events.recv().await else {
            // Channel dropped without a Close: treat as a transient loss.
            break DisconnectReason::ConnectionLost;
        };
        let Some(manager) = manager.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Qr(code) => manager.on_qr(&session_id, code).await,
            TransportEvent::Open { identity } => manager.on_open(&session_id, identity).await,
            TransportEvent::Message(message) => manager.on_message(&session_id, message).await,
            TransportEvent::Close { reason } => break reason,
        }
    };

    if let Some(manager) = manager.upgrade() {
        manager.on_close(&session_id, close_reason).await;
    }
}

impl SessionManager {
    async fn on_qr(&self, session_id: &str, code: String) {
        tracing::info!(session_id, "pairing code issued");
        self.store.set_qr(session_id, code.clone());
        let webhook_url = self.live_webhook_url(session_id);

        if let Err(e) =
            sessions::update_status(&self.db, session_id, SessionStatus::ScanningQr, None).await
        {
            tracing::error!(session_id, error = %e, "failed to persist SCANNING_QR");
        }
        self.notify(
            session_id,
            webhook_url.as_deref(),
            webhook_events::QR_CODE,
            json!({ "qr": code }),
        )
        .await;
    }

    async fn on_open(&self, session_id: &str, identity: String) {
        tracing::info!(session_id, identity = %identity, "session connected");
        self.store.set_connected(session_id, identity.clone());
        let webhook_url = self.live_webhook_url(session_id);

        if let Err(e) = sessions::update_status(
            &self.db,
            session_id,
            SessionStatus::Connected,
            Some(&identity),
        )
        .await
        {
            tracing::error!(session_id, error = %e, "failed to persist CONNECTED");
        }
        self.notify(
            session_id,
            webhook_url.as_deref(),
            webhook_events::CONNECTION_UPDATE,
            json!({ "status": SessionStatus::Connected, "identity": identity }),
        )
        .await;
    }

    async fn on_message(&self, session_id: &str, message: InboundMessage) {
        tracing::debug!(
            session_id,
            message_id = %message.id,
            from = %message.from,
            "inbound message"
        );
        let preview = message.text.as_deref().map(|text| {
            let mut preview: String = text.chars().take(PREVIEW_MAX).collect();
            if preview.len() < text.len() {
                preview.push('…');
            }
            preview
        });

        let log = NewMessageLog {
            session_id: session_id.to_string(),
            direction: directions::INCOMING.to_string(),
            message_id: Some(message.id.clone()),
            recipient: Some(message.from.clone()),
            message_type: Some(message.message_type.clone()),
            content_preview: preview,
            status: None,
        };
        if let Err(e) = messages::insert(&self.db, &log).await {
            tracing::error!(session_id, error = %e, "failed to log inbound message");
        }

        let webhook_url = self.live_webhook_url(session_id);
        self.notify(
            session_id,
            webhook_url.as_deref(),
            webhook_events::MESSAGE_RECEIVED,
            json!({
                "messageId": message.id,
                "from": message.from,
                "text": message.text,
                "messageType": message.message_type,
                "messageTimestamp": message.timestamp,
            }),
        )
        .await;
    }

    async fn on_close(self: &Arc<Self>, session_id: &str, reason: DisconnectReason) {
        let _lifecycle = self.lifecycle.lock().await;
        // No live entry means stop or logout already tore this session down.
        let Some(live) = self.store.remove(session_id) else {
            tracing::debug!(session_id, "close for torn-down session ignored");
            return;
        };
        tracing::info!(session_id, ?reason, "connection closed");

        if !reason.should_reconnect() {
            // Logged out remotely: the credentials are dead. Erase them so a
            // future start pairs from scratch.
            let auth_dir = self.auth_dir(session_id);
            if let Err(e) = tokio::fs::remove_dir_all(&auth_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(session_id, error = %e, "failed to remove credential directory");
                }
            }
            self.persist_and_notify(
                session_id,
                live.webhook_url.as_deref(),
                SessionStatus::Disconnected,
                json!({ "status": SessionStatus::Disconnected, "reason": "logged_out" }),
            )
            .await;
            return;
        }

        let attempts = live.reconnect_attempts;
        if attempts >= self.config.max_reconnect_attempts {
            tracing::warn!(session_id, attempts, "reconnection budget exhausted");
            self.persist_and_notify(
                session_id,
                live.webhook_url.as_deref(),
                SessionStatus::StoppedError,
                json!({ "status": SessionStatus::StoppedError, "attempts": attempts }),
            )
            .await;
            return;
        }

        self.persist_and_notify(
            session_id,
            live.webhook_url.as_deref(),
            SessionStatus::Disconnected,
            json!({ "status": SessionStatus::Disconnected }),
        )
        .await;
        self.schedule_reconnect(session_id, attempts);
    }

    /// Sleep out the backoff window, then retry the connection. `attempts`
    /// counts the reconnections already consumed.
    fn schedule_reconnect(self: &Arc<Self>, session_id: &str, attempts: u32) {
        let delay = exponential_delay(
            attempts,
            RECONNECT_BASE,
            Duration::from_secs(self.config.reconnect_cap_secs),
        );
        tracing::info!(
            session_id,
            attempt = attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "reconnection scheduled"
        );

        let weak = Arc::downgrade(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };
            manager.try_reconnect(&session_id, attempts).await;
        });
    }

    async fn try_reconnect(self: &Arc<Self>, session_id: &str, attempts: u32) {
        // Deliberate teardown wins over a pending reconnect: the lifecycle
        // lock orders this re-check after any stop or logout in flight, and
        // keeps a new teardown out until the connection attempt is done.
        let _lifecycle = self.lifecycle.lock().await;
        let row = match sessions::get(&self.db, session_id).await {
            Ok(Some(row)) if row.status.is_restorable() => row,
            Ok(_) => {
                tracing::debug!(session_id, "reconnect abandoned, session was torn down");
                return;
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "reconnect status check failed");
                return;
            }
        };
        if self.store.contains(session_id) {
            return;
        }

        match self
            .spawn_connection(session_id, row.webhook_url.clone(), attempts + 1)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                let consumed = attempts + 1;
                tracing::warn!(session_id, attempts = consumed, error = %e, "reconnect failed");
                if consumed >= self.config.max_reconnect_attempts {
                    self.persist_and_notify(
                        session_id,
                        row.webhook_url.as_deref(),
                        SessionStatus::StoppedError,
                        json!({ "status": SessionStatus::StoppedError, "attempts": consumed }),
                    )
                    .await;
                } else {
                    self.schedule_reconnect(session_id, consumed);
                }
            }
        }
    }

    fn live_webhook_url(&self, session_id: &str) -> Option<String> {
        self.store
            .snapshot(session_id)
            .and_then(|snapshot| snapshot.webhook_url)
    }

    async fn persist_and_notify(
        &self,
        session_id: &str,
        webhook_url: Option<&str>,
        status: SessionStatus,
        data: serde_json::Value,
    ) {
        if let Err(e) = sessions::update_status(&self.db, session_id, status, None).await {
            tracing::error!(session_id, error = %e, "failed to persist {status}");
        }
        self.notify(session_id, webhook_url, webhook_events::CONNECTION_UPDATE, data)
            .await;
    }

    async fn notify(
        &self,
        session_id: &str,
        webhook_url: Option<&str>,
        event: &str,
        data: serde_json::Value,
    ) {
        if let Err(e) = self
            .dispatcher
            .dispatch(session_id, webhook_url, event, data)
            .await
        {
            tracing::error!(session_id, event, error = %e, "failed to enqueue webhook");
        }
    }
}
