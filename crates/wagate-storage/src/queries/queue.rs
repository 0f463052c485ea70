// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe outbound-message processing.
//!
//! Retry scheduling lives in `available_at`: a failed entry goes back to
//! `pending` with `available_at` pushed into the future, so the worker's
//! dequeue loop naturally applies the backoff.

use rusqlite::params;
use wagate_core::WagateError;

use crate::database::Database;
use crate::models::{FailOutcome, QueueEntry};

const ENTRY_COLUMNS: &str = "id, queue_name, payload, status, attempts, max_attempts,
     available_at, locked_until, created_at, updated_at";

fn entry_from_row(row: &rusqlite::Row<'_>) -> Result<QueueEntry, rusqlite::Error> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        available_at: row.get(6)?,
        locked_until: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: i64,
) -> Result<i64, WagateError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next due entry from the named queue.
///
/// Atomically selects the oldest pending entry whose `available_at` has
/// passed and marks it as "processing" with a 5-minute lock timeout.
/// Returns `None` if nothing is due.
pub async fn dequeue_due(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, WagateError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            // Use a transaction to atomically find + update the next due entry.
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS}
                     FROM queue
                     WHERE queue_name = ?1 AND status = 'pending'
                       AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY id ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![queue_name], entry_from_row)
            };

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![entry.id],
                    )?;
                    tx.commit()?;

                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        ..entry
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

/// Acknowledge successful processing of a queue entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), WagateError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed',
                 locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a queue entry as failed.
///
/// Increments attempts. If the budget is exhausted the entry goes terminal
/// ("failed"); otherwise it returns to "pending" with `available_at` pushed
/// `retry_delay_secs` into the future.
pub async fn fail(db: &Database, id: i64, retry_delay_secs: i64) -> Result<FailOutcome, WagateError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            if new_attempts >= max_attempts {
                conn.execute(
                    "UPDATE queue SET status = 'failed', attempts = ?1,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![new_attempts, id],
                )?;
                Ok(FailOutcome::Terminal)
            } else {
                conn.execute(
                    "UPDATE queue SET status = 'pending', attempts = ?1,
                     locked_until = NULL,
                     available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+' || ?2 || ' seconds'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
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

/// Release entries whose processing lock has expired (worker crashed or was
/// killed mid-flight) back to pending.
pub async fn release_expired(db: &Database, queue_name: &str) -> Result<usize, WagateError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let released = conn.execute(
                "UPDATE queue SET status = 'pending', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE queue_name = ?1 AND status = 'processing'
                   AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![queue_name],
            )?;
            Ok(released)
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

    async fn status_of(db: &Database, id: i64) -> String {
        db.connection()
            .call(move |conn| {
                let s = conn.query_row(
                    "SELECT status FROM queue WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                Ok::<_, rusqlite::Error>(s)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "outbound", r#"{"msg":"hello"}"#, 3).await.unwrap();
        assert!(id > 0);

        let entry = dequeue_due(&db, "outbound").await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert_eq!(entry.queue_name, "outbound");
        assert_eq!(entry.payload, r#"{"msg":"hello"}"#);

        // Queue should be empty now (no more pending).
        assert!(dequeue_due(&db, "outbound").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_marks_completed() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue_due(&db, "test").await.unwrap().unwrap();

        ack(&db, id).await.unwrap();
        assert_eq!(status_of(&db, id).await, "completed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_with_zero_delay_allows_immediate_retry() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue_due(&db, "test").await.unwrap().unwrap();

        let outcome = fail(&db, id, 0).await.unwrap();
        assert_eq!(outcome, FailOutcome::Retrying { attempts: 1 });

        let entry = dequeue_due(&db, "test").await.unwrap().unwrap();
        assert_eq!(entry.attempts, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_with_delay_defers_retry() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue_due(&db, "test").await.unwrap().unwrap();

        // One-hour backoff: the entry is pending but not yet due.
        fail(&db, id, 3600).await.unwrap();
        assert_eq!(status_of(&db, id).await, "pending");
        assert!(dequeue_due(&db, "test").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_goes_terminal_at_max_attempts() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();

        for attempt in 1..=3i64 {
            let _entry = dequeue_due(&db, "test").await.unwrap().unwrap();
            let outcome = fail(&db, id, 0).await.unwrap();
            if attempt < 3 {
                assert_eq!(outcome, FailOutcome::Retrying { attempts: attempt });
            } else {
                assert_eq!(outcome, FailOutcome::Terminal);
            }
        }

        assert_eq!(status_of(&db, id).await, "failed");
        assert!(dequeue_due(&db, "test").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn release_expired_reclaims_stale_locks() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "test", "payload", 3).await.unwrap();
        let _entry = dequeue_due(&db, "test").await.unwrap().unwrap();

        // A fresh lock is not reclaimable.
        assert_eq!(release_expired(&db, "test").await.unwrap(), 0);

        // Simulate a crashed worker by backdating the lock.
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE queue SET locked_until = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![id],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert_eq!(release_expired(&db, "test").await.unwrap(), 1);
        let entry = dequeue_due(&db, "test").await.unwrap().unwrap();
        assert_eq!(entry.id, id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_empty_queue_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(dequeue_due(&db, "nonexistent").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn queues_are_isolated_by_name() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "a", "payload-a", 3).await.unwrap();

        assert!(dequeue_due(&db, "b").await.unwrap().is_none());
        let entry = dequeue_due(&db, "a").await.unwrap().unwrap();
        assert_eq!(entry.payload, "payload-a");

        db.close().await.unwrap();
    }
}
