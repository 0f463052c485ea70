// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory registry of live sessions.
//!
//! One entry per session with an open (or opening) transport connection.
//! Removal from the store is the signal that a teardown was deliberate: the
//! connection handler ignores a Close event whose session is already gone.

use std::sync::Arc;

use dashmap::DashMap;
use wagate_core::SessionStatus;
use wagate_transport::TransportHandle;

/// Live state for one session with an open connection.
pub struct LiveSession {
    pub handle: Arc<dyn TransportHandle>,
    pub status: SessionStatus,
    pub webhook_url: Option<String>,
    pub qr: Option<String>,
    pub identity: Option<String>,
    /// Consecutive failed reconnection attempts. Reset to zero on Open.
    pub reconnect_attempts: u32,
}

/// Point-in-time view of a session, live or durable-only.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub webhook_url: Option<String>,
    pub qr: Option<String>,
    pub identity: Option<String>,
}

/// Concurrent map of live sessions, shared by the manager, the connection
/// handlers, and the message worker.
#[derive(Default)]
pub struct SessionStore {
    inner: DashMap<String, LiveSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: &str, live: LiveSession) {
        self.inner.insert(session_id.to_string(), live);
    }

    pub fn remove(&self, session_id: &str) -> Option<LiveSession> {
        self.inner.remove(session_id).map(|(_, live)| live)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.inner.get(session_id).map(|live| SessionSnapshot {
            session_id: session_id.to_string(),
            status: live.status,
            webhook_url: live.webhook_url.clone(),
            qr: live.qr.clone(),
            identity: live.identity.clone(),
        })
    }

    pub fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.inner.get(session_id).map(|live| live.status)
    }

    /// The live handle, regardless of connection state.
    pub fn handle(&self, session_id: &str) -> Option<Arc<dyn TransportHandle>> {
        self.inner.get(session_id).map(|live| Arc::clone(&live.handle))
    }

    /// The live handle, only while the session is CONNECTED. Send paths use
    /// this so messages are never pushed into a pairing or draining session.
    pub fn connected_handle(&self, session_id: &str) -> Option<Arc<dyn TransportHandle>> {
        self.inner.get(session_id).and_then(|live| {
            (live.status == SessionStatus::Connected).then(|| Arc::clone(&live.handle))
        })
    }

    pub fn set_status(&self, session_id: &str, status: SessionStatus) {
        if let Some(mut live) = self.inner.get_mut(session_id) {
            live.status = status;
        }
    }

    /// Record a fresh pairing code and move to SCANNING_QR.
    pub fn set_qr(&self, session_id: &str, qr: String) {
        if let Some(mut live) = self.inner.get_mut(session_id) {
            live.qr = Some(qr);
            live.status = SessionStatus::ScanningQr;
        }
    }

    /// Mark the session CONNECTED: record the identity, clear the pairing
    /// code, and reset the reconnection counter.
    pub fn set_connected(&self, session_id: &str, identity: String) {
        if let Some(mut live) = self.inner.get_mut(session_id) {
            live.status = SessionStatus::Connected;
            live.identity = Some(identity);
            live.qr = None;
            live.reconnect_attempts = 0;
        }
    }

    pub fn reconnect_attempts(&self, session_id: &str) -> Option<u32> {
        self.inner.get(session_id).map(|live| live.reconnect_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wagate_core::WagateError;
    use wagate_transport::{MessageReceipt, OutboundContent};

    struct NullHandle;

    #[async_trait]
    impl TransportHandle for NullHandle {
        async fn send(
            &self,
            _to: &str,
            _content: OutboundContent,
        ) -> Result<MessageReceipt, WagateError> {
            Ok(MessageReceipt {
                message_id: "m1".into(),
            })
        }

        async fn logout(&self) -> Result<(), WagateError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    fn live() -> LiveSession {
        LiveSession {
            handle: Arc::new(NullHandle),
            status: SessionStatus::Connecting,
            webhook_url: None,
            qr: None,
            identity: None,
            reconnect_attempts: 0,
        }
    }

    #[test]
    fn connected_handle_requires_connected_status() {
        let store = SessionStore::new();
        store.insert("s1", live());

        assert!(store.handle("s1").is_some());
        assert!(store.connected_handle("s1").is_none());

        store.set_connected("s1", "s1@loopback".into());
        assert!(store.connected_handle("s1").is_some());
    }

    #[test]
    fn set_connected_clears_pairing_state() {
        let mut entry = live();
        entry.reconnect_attempts = 3;
        let store = SessionStore::new();
        store.insert("s1", entry);
        store.set_qr("s1", "pairing-data".into());

        let snap = store.snapshot("s1").unwrap();
        assert_eq!(snap.status, SessionStatus::ScanningQr);
        assert_eq!(snap.qr.as_deref(), Some("pairing-data"));

        store.set_connected("s1", "s1@loopback".into());
        let snap = store.snapshot("s1").unwrap();
        assert_eq!(snap.status, SessionStatus::Connected);
        assert!(snap.qr.is_none());
        assert_eq!(snap.identity.as_deref(), Some("s1@loopback"));
        assert_eq!(store.reconnect_attempts("s1"), Some(0));
    }

    #[test]
    fn remove_returns_the_live_entry() {
        let store = SessionStore::new();
        store.insert("s1", live());
        assert!(store.remove("s1").is_some());
        assert!(store.remove("s1").is_none());
        assert!(store.is_empty());
    }
}
