// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session manager: public lifecycle operations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wagate_config::SessionConfig;
use wagate_core::{SessionStatus, WagateError};
use wagate_storage::models::Session;
use wagate_storage::queries::sessions;
use wagate_storage::Database;
use wagate_transport::{Transport, TransportSession};
use wagate_webhook::WebhookDispatcher;

use crate::connection;
use crate::store::{LiveSession, SessionSnapshot, SessionStore};

/// Orchestrates session lifecycle across the durable store, the in-memory
/// registry, and the transport.
pub struct SessionManager {
    pub(crate) db: Database,
    pub(crate) store: Arc<SessionStore>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) dispatcher: WebhookDispatcher,
    pub(crate) config: SessionConfig,
    /// Serializes lifecycle transitions (start, stop, logout, close handling,
    /// reconnection) so a teardown cannot interleave with a scheduled
    /// reconnection between its durable-row re-check and the new connection.
    pub(crate) lifecycle: tokio::sync::Mutex<()>,
    auth_root: PathBuf,
}

/// Session ids become directory names and queue keys, so the accepted
/// alphabet is deliberately narrow.
pub fn validate_session_id(session_id: &str) -> Result<(), WagateError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 64
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(WagateError::Validation(format!(
            "invalid session id {session_id:?}: expected 1-64 characters from [A-Za-z0-9_-]"
        )))
    }
}

impl SessionManager {
    pub fn new(
        db: Database,
        transport: Arc<dyn Transport>,
        dispatcher: WebhookDispatcher,
        config: SessionConfig,
        auth_root: impl Into<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            store: Arc::new(SessionStore::new()),
            transport,
            dispatcher,
            config,
            lifecycle: tokio::sync::Mutex::new(()),
            auth_root: auth_root.into(),
        })
    }

    /// Shared registry of live sessions. Send paths resolve handles here.
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Start a session: create or adopt the durable row, open a transport
    /// connection, and begin consuming its events.
    ///
    /// Starting an already-live session is a no-op that returns its current
    /// state. A session id that exists with a different webhook URL belongs
    /// to someone else and is rejected.
    pub async fn start(
        self: &Arc<Self>,
        session_id: &str,
        webhook_url: Option<String>,
    ) -> Result<SessionSnapshot, WagateError> {
        validate_session_id(session_id)?;
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(snapshot) = self.store.snapshot(session_id) {
            verify_ownership(session_id, snapshot.webhook_url.as_deref(), webhook_url.as_deref())?;
            return Ok(snapshot);
        }

        let effective_url = match sessions::get(&self.db, session_id).await? {
            Some(row) => {
                verify_ownership(session_id, row.webhook_url.as_deref(), webhook_url.as_deref())?;
                match (row.webhook_url, webhook_url) {
                    (None, Some(url)) => {
                        sessions::set_webhook_url(&self.db, session_id, Some(&url)).await?;
                        Some(url)
                    }
                    (existing, _) => existing,
                }
            }
            None => {
                sessions::create(
                    &self.db,
                    session_id,
                    webhook_url.as_deref(),
                    SessionStatus::Connecting,
                )
                .await?;
                webhook_url
            }
        };

        self.spawn_connection(session_id, effective_url, 0).await?;
        tracing::info!(session_id, "session started");

        Ok(self
            .store
            .snapshot(session_id)
            .unwrap_or(SessionSnapshot {
                session_id: session_id.to_string(),
                status: SessionStatus::Connecting,
                webhook_url: None,
                qr: None,
                identity: None,
            }))
    }

    /// Open a transport connection for an existing durable session and wire
    /// up its event loop. Used by start, restore, and reconnection.
    pub(crate) async fn spawn_connection(
        self: &Arc<Self>,
        session_id: &str,
        webhook_url: Option<String>,
        reconnect_attempts: u32,
    ) -> Result<(), WagateError> {
        let auth_dir = self.auth_root.join(session_id);
        tokio::fs::create_dir_all(&auth_dir)
            .await
            .map_err(|e| WagateError::Internal(format!("cannot create auth dir: {e}")))?;

        let TransportSession { handle, events } =
            self.transport.connect(session_id, &auth_dir).await?;

        self.store.insert(
            session_id,
            LiveSession {
                handle,
                status: SessionStatus::Connecting,
                webhook_url,
                qr: None,
                identity: None,
                reconnect_attempts,
            },
        );
        sessions::update_status(&self.db, session_id, SessionStatus::Connecting, None).await?;

        connection::spawn_event_loop(self, session_id.to_string(), events);
        Ok(())
    }

    /// Stop a session without revoking its credentials. A later start resumes
    /// the existing pairing.
    ///
    /// The live entry is removed before the handle is closed, so the Close
    /// event the transport emits finds no entry and schedules nothing. The
    /// lifecycle lock is held across the durable status write, so a pending
    /// reconnection always observes the STOPPED row and abandons.
    pub async fn stop(&self, session_id: &str) -> Result<(), WagateError> {
        let _lifecycle = self.lifecycle.lock().await;
        let live = self.store.remove(session_id);
        let row = sessions::get(&self.db, session_id).await?;
        if live.is_none() && row.is_none() {
            return Err(WagateError::NotFound {
                resource: "session",
                id: session_id.to_string(),
            });
        }

        if let Some(live) = live {
            live.handle.close().await;
        }
        sessions::update_status(&self.db, session_id, SessionStatus::Stopped, None).await?;
        tracing::info!(session_id, "session stopped");
        Ok(())
    }

    /// Log a session out and erase it: revoke credentials server-side, delete
    /// the credential directory and the durable row.
    ///
    /// Local erasure happens even when the remote revocation fails; the
    /// transport error is propagated afterwards so the caller still sees it.
    pub async fn logout(&self, session_id: &str) -> Result<(), WagateError> {
        let _lifecycle = self.lifecycle.lock().await;
        let live = self.store.remove(session_id);
        let row = sessions::get(&self.db, session_id).await?;
        if live.is_none() && row.is_none() {
            return Err(WagateError::NotFound {
                resource: "session",
                id: session_id.to_string(),
            });
        }

        let revocation = match live {
            Some(live) => live.handle.logout().await,
            None => Ok(()),
        };

        let auth_dir = self.auth_root.join(session_id);
        if let Err(e) = tokio::fs::remove_dir_all(&auth_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session_id, error = %e, "failed to remove credential directory");
            }
        }
        sessions::delete(&self.db, session_id).await?;
        tracing::info!(session_id, "session logged out");

        revocation
    }

    /// Current state of one session: the live view when connected, the
    /// durable row otherwise.
    pub async fn status(&self, session_id: &str) -> Result<SessionSnapshot, WagateError> {
        if let Some(snapshot) = self.store.snapshot(session_id) {
            return Ok(snapshot);
        }
        match sessions::get(&self.db, session_id).await? {
            Some(row) => Ok(snapshot_from_row(row)),
            None => Err(WagateError::NotFound {
                resource: "session",
                id: session_id.to_string(),
            }),
        }
    }

    /// All known sessions, with live state overlaid on durable rows.
    pub async fn list(&self) -> Result<Vec<SessionSnapshot>, WagateError> {
        let rows = sessions::list(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                self.store
                    .snapshot(&row.session_id)
                    .unwrap_or_else(|| snapshot_from_row(row))
            })
            .collect())
    }

    /// Reopen every restorable session at boot, throttled so a large tenant
    /// count does not stampede the transport.
    pub async fn restore(self: &Arc<Self>) -> Result<usize, WagateError> {
        let rows = sessions::find_restorable(&self.db).await?;
        let total = rows.len();
        if total == 0 {
            return Ok(0);
        }
        tracing::info!(total, "restoring sessions");

        let throttle = Duration::from_millis(self.config.restore_delay_ms);
        let mut restored = 0;
        for row in rows {
            let guard = self.lifecycle.lock().await;
            if self.store.contains(&row.session_id) {
                continue;
            }
            match self
                .spawn_connection(&row.session_id, row.webhook_url.clone(), 0)
                .await
            {
                Ok(()) => restored += 1,
                Err(e) => {
                    tracing::warn!(session_id = %row.session_id, error = %e, "restore failed");
                    sessions::update_status(
                        &self.db,
                        &row.session_id,
                        SessionStatus::StoppedError,
                        None,
                    )
                    .await?;
                }
            }
            drop(guard);
            tokio::time::sleep(throttle).await;
        }
        Ok(restored)
    }

    pub(crate) fn auth_dir(&self, session_id: &str) -> PathBuf {
        self.auth_root.join(session_id)
    }
}

fn snapshot_from_row(row: Session) -> SessionSnapshot {
    SessionSnapshot {
        session_id: row.session_id,
        status: row.status,
        webhook_url: row.webhook_url,
        qr: None,
        identity: row.protocol_identity,
    }
}

fn verify_ownership(
    session_id: &str,
    existing: Option<&str>,
    provided: Option<&str>,
) -> Result<(), WagateError> {
    match (existing, provided) {
        (Some(existing), Some(provided)) if existing != provided => Err(WagateError::Ownership {
            session_id: session_id.to_string(),
        }),
        _ => Ok(()),
    }
}
