// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enqueue-side API for webhook deliveries.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use wagate_config::QueueConfig;
use wagate_core::WagateError;
use wagate_storage::queries::webhooks::{self, NewDelivery};
use wagate_storage::Database;

/// Fans session events out to the durable webhook delivery queue.
///
/// The delivery payload is frozen here: the event name and timestamp are
/// merged into the event data at enqueue time, so every retry of a delivery
/// posts byte-identical JSON.
#[derive(Clone)]
pub struct WebhookDispatcher {
    db: Database,
    max_attempts: i64,
}

impl WebhookDispatcher {
    pub fn new(db: Database, config: &QueueConfig) -> Self {
        Self {
            db,
            max_attempts: config.max_attempts as i64,
        }
    }

    /// Enqueue one event for delivery. A session without a configured webhook
    /// URL produces no job; returns the delivery row id otherwise.
    pub async fn dispatch(
        &self,
        session_id: &str,
        webhook_url: Option<&str>,
        event: &str,
        data: Value,
    ) -> Result<Option<i64>, WagateError> {
        let Some(url) = webhook_url else {
            tracing::debug!(session_id, event, "no webhook url configured, skipping dispatch");
            return Ok(None);
        };

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut body = match data {
            Value::Object(map) => Value::Object(map),
            other => json!({ "data": other }),
        };
        let obj = body.as_object_mut().expect("body is an object");
        obj.insert("event".to_string(), Value::String(event.to_string()));
        obj.insert("sessionId".to_string(), Value::String(session_id.to_string()));
        obj.insert("timestamp".to_string(), Value::String(timestamp.clone()));

        let payload =
            serde_json::to_string(&body).map_err(|e| WagateError::Internal(e.to_string()))?;

        let id = webhooks::enqueue(
            &self.db,
            NewDelivery {
                session_id: Some(session_id.to_string()),
                webhook_url: url.to_string(),
                event_type: event.to_string(),
                payload,
                event_timestamp: timestamp,
                request_id: Some(request_id),
                max_attempts: self.max_attempts,
            },
        )
        .await?;

        tracing::debug!(session_id, event, delivery_id = id, "webhook delivery enqueued");
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wagate_core::webhook_events;

    async fn setup() -> (Database, WebhookDispatcher, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let dispatcher = WebhookDispatcher::new(db.clone(), &QueueConfig::webhook_defaults());
        (db, dispatcher, dir)
    }

    #[tokio::test]
    async fn dispatch_freezes_event_envelope() {
        let (db, dispatcher, _dir) = setup().await;

        let id = dispatcher
            .dispatch(
                "s1",
                Some("https://example.com/hook"),
                webhook_events::QR_CODE,
                json!({ "qr": "pairing-data" }),
            )
            .await
            .unwrap()
            .unwrap();

        let job = wagate_storage::queries::webhooks::dequeue_due(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.event_type, "qr_code");
        assert_eq!(job.max_attempts, 5);

        let body: Value = serde_json::from_str(&job.payload).unwrap();
        assert_eq!(body["event"], "qr_code");
        assert_eq!(body["sessionId"], "s1");
        assert_eq!(body["qr"], "pairing-data");
        assert_eq!(body["timestamp"], job.event_timestamp.as_str());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_without_url_is_a_noop() {
        let (db, dispatcher, _dir) = setup().await;

        let result = dispatcher
            .dispatch("s1", None, webhook_events::CONNECTION_UPDATE, json!({}))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(wagate_storage::queries::webhooks::dequeue_due(&db)
            .await
            .unwrap()
            .is_none());

        db.close().await.unwrap();
    }
}
