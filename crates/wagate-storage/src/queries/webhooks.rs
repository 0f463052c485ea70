// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook delivery queue operations.
//!
//! Same crash-safe shape as the outbound queue, but rows carry the target
//! URL, event name, and the event timestamp fixed at enqueue time so retried
//! deliveries replay an identical payload. Terminally failed rows are
//! retained for inspection and manual redelivery.

use rusqlite::params;
use wagate_core::WagateError;

use crate::database::Database;
use crate::models::{FailOutcome, WebhookDelivery};

const DELIVERY_COLUMNS: &str = "id, session_id, webhook_url, event_type, payload, event_timestamp,
     request_id, status, attempts, max_attempts, available_at, locked_until,
     last_attempt_at, created_at";

fn delivery_from_row(row: &rusqlite::Row<'_>) -> Result<WebhookDelivery, rusqlite::Error> {
    Ok(WebhookDelivery {
        id: row.get(0)?,
        session_id: row.get(1)?,
        webhook_url: row.get(2)?,
        event_type: row.get(3)?,
        payload: row.get(4)?,
        event_timestamp: row.get(5)?,
        request_id: row.get(6)?,
        status: row.get(7)?,
        attempts: row.get(8)?,
        max_attempts: row.get(9)?,
        available_at: row.get(10)?,
        locked_until: row.get(11)?,
        last_attempt_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

/// Parameters for enqueueing a webhook delivery.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub session_id: Option<String>,
    pub webhook_url: String,
    pub event_type: String,
    pub payload: String,
    pub event_timestamp: String,
    pub request_id: Option<String>,
    pub max_attempts: i64,
}

/// Enqueue a delivery. Returns the auto-generated row ID.
pub async fn enqueue(db: &Database, delivery: NewDelivery) -> Result<i64, WagateError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO webhook_deliveries
                 (session_id, webhook_url, event_type, payload, event_timestamp,
                  request_id, max_attempts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    delivery.session_id,
                    delivery.webhook_url,
                    delivery.event_type,
                    delivery.payload,
                    delivery.event_timestamp,
                    delivery.request_id,
                    delivery.max_attempts,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next due delivery, marking it "processing" with a lock timeout.
pub async fn dequeue_due(db: &Database) -> Result<Option<WebhookDelivery>, WagateError> {
    db.connection()
        .call(|conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {DELIVERY_COLUMNS}
                     FROM webhook_deliveries
                     WHERE status = 'pending'
                       AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY id ASC
                     LIMIT 1"
                ))?;
                stmt.query_row([], delivery_from_row)
            };

            match result {
                Ok(delivery) => {
                    tx.execute(
                        "UPDATE webhook_deliveries SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes')
                         WHERE id = ?1",
                        params![delivery.id],
                    )?;
                    tx.commit()?;

                    Ok(Some(WebhookDelivery {
                        status: "processing".to_string(),
                        ..delivery
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a delivery as successfully delivered.
pub async fn ack(db: &Database, id: i64) -> Result<(), WagateError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE webhook_deliveries SET status = 'delivered',
                 locked_until = NULL,
                 last_attempt_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a delivery attempt as failed.
///
/// Exhausted deliveries stay in the table as "failed" rather than being
/// purged, so operators can inspect and manually redeliver them.
pub async fn fail(db: &Database, id: i64, retry_delay_secs: i64) -> Result<FailOutcome, WagateError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM webhook_deliveries WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            if new_attempts >= max_attempts {
                conn.execute(
                    "UPDATE webhook_deliveries SET status = 'failed', attempts = ?1,
                     locked_until = NULL,
                     last_attempt_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![new_attempts, id],
                )?;
                Ok(FailOutcome::Terminal)
            } else {
                conn.execute(
                    "UPDATE webhook_deliveries SET status = 'pending', attempts = ?1,
                     locked_until = NULL,
                     available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+' || ?2 || ' seconds'),
                     last_attempt_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    params![new_attempts, retry_delay_secs, id],
                )?;
                Ok(FailOutcome::Retrying {
                    attempts: new_attempts,
                })
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Release deliveries whose processing lock has expired (worker crashed or
/// was killed mid-flight) back to pending.
pub async fn release_expired(db: &Database) -> Result<usize, WagateError> {
    db.connection()
        .call(|conn| {
            let released = conn.execute(
                "UPDATE webhook_deliveries SET status = 'pending', locked_until = NULL
                 WHERE status = 'processing'
                   AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                [],
            )?;
            Ok(released)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminally failed deliveries, newest first.
pub async fn list_failed(db: &Database, limit: i64) -> Result<Vec<WebhookDelivery>, WagateError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DELIVERY_COLUMNS}
                 FROM webhook_deliveries
                 WHERE status = 'failed'
                 ORDER BY id DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], delivery_from_row)?;
            let mut deliveries = Vec::new();
            for row in rows {
                deliveries.push(row?);
            }
            Ok(deliveries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_delivery(event: &str) -> NewDelivery {
        NewDelivery {
            session_id: Some("s1".to_string()),
            webhook_url: "https://example.com/hook".to_string(),
            event_type: event.to_string(),
            payload: r#"{"sessionId":"s1"}"#.to_string(),
            event_timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            request_id: None,
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn enqueue_dequeue_ack_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, make_delivery("qr_code")).await.unwrap();

        let delivery = dequeue_due(&db).await.unwrap().unwrap();
        assert_eq!(delivery.id, id);
        assert_eq!(delivery.event_type, "qr_code");
        assert_eq!(delivery.status, "processing");
        assert_eq!(delivery.event_timestamp, "2026-01-01T00:00:00.000Z");

        ack(&db, id).await.unwrap();
        assert!(dequeue_due(&db).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_deliveries_are_retained() {
        let (db, _dir) = setup_db().await;

        let mut delivery = make_delivery("connection_update");
        delivery.max_attempts = 2;
        let id = enqueue(&db, delivery).await.unwrap();

        for _ in 0..2 {
            let _d = dequeue_due(&db).await.unwrap().unwrap();
            let _ = fail(&db, id, 0).await.unwrap();
        }

        let failed = list_failed(&db, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert_eq!(failed[0].attempts, 2);

        // Retained, but no longer eligible for dequeue.
        assert!(dequeue_due(&db).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retry_preserves_payload_and_event_timestamp() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, make_delivery("qr_code")).await.unwrap();

        let first = dequeue_due(&db).await.unwrap().unwrap();
        fail(&db, id, 0).await.unwrap();
        let second = dequeue_due(&db).await.unwrap().unwrap();

        // A replayed delivery carries identical payload and timestamp; only
        // the attempt count moves.
        assert_eq!(first.payload, second.payload);
        assert_eq!(first.event_timestamp, second.event_timestamp);
        assert_eq!(second.attempts, first.attempts + 1);

        db.close().await.unwrap();
    }
}
