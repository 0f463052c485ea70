// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.

use rusqlite::params;
use wagate_core::{SessionStatus, WagateError};

use crate::database::Database;
use crate::models::Session;

fn session_from_row(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    let status: String = row.get(2)?;
    let status = status.parse::<SessionStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Session {
        session_id: row.get(0)?,
        webhook_url: row.get(1)?,
        status,
        protocol_identity: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const SESSION_COLUMNS: &str =
    "session_id, webhook_url, status, protocol_identity, created_at, updated_at";

/// Create a new session row.
pub async fn create(
    db: &Database,
    session_id: &str,
    webhook_url: Option<&str>,
    status: SessionStatus,
) -> Result<(), WagateError> {
    let session_id = session_id.to_string();
    let webhook_url = webhook_url.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, webhook_url, status) VALUES (?1, ?2, ?3)",
                params![session_id, webhook_url, status.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by id.
pub async fn get(db: &Database, session_id: &str) -> Result<Option<Session>, WagateError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"
            ))?;
            let result = stmt.query_row(params![session_id], session_from_row);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all sessions, newest first.
pub async fn list(db: &Database) -> Result<Vec<Session>, WagateError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], session_from_row)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Sessions eligible for boot-time restore (status not STOPPED/STOPPED_ERROR).
pub async fn find_restorable(db: &Database) -> Result<Vec<Session>, WagateError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status != 'STOPPED' AND status != 'STOPPED_ERROR'
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map([], session_from_row)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update a session's status, optionally recording the protocol identity
/// resolved at CONNECTED.
pub async fn update_status(
    db: &Database,
    session_id: &str,
    status: SessionStatus,
    protocol_identity: Option<&str>,
) -> Result<(), WagateError> {
    let session_id = session_id.to_string();
    let protocol_identity = protocol_identity.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            match protocol_identity {
                Some(identity) => {
                    conn.execute(
                        "UPDATE sessions SET status = ?1, protocol_identity = ?2,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE session_id = ?3",
                        params![status.to_string(), identity, session_id],
                    )?;
                }
                None => {
                    conn.execute(
                        "UPDATE sessions SET status = ?1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE session_id = ?2",
                        params![status.to_string(), session_id],
                    )?;
                }
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record or replace the session's webhook URL.
pub async fn set_webhook_url(
    db: &Database,
    session_id: &str,
    webhook_url: Option<&str>,
) -> Result<(), WagateError> {
    let session_id = session_id.to_string();
    let webhook_url = webhook_url.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET webhook_url = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE session_id = ?2",
                params![webhook_url, session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a session row (logout path).
pub async fn delete(db: &Database, session_id: &str) -> Result<(), WagateError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM sessions WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
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

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let (db, _dir) = setup_db().await;

        create(&db, "s1", Some("https://example.com/hook"), SessionStatus::Connecting)
            .await
            .unwrap();

        let session = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(session.session_id, "s1");
        assert_eq!(session.webhook_url.as_deref(), Some("https://example.com/hook"));
        assert_eq!(session.status, SessionStatus::Connecting);
        assert!(session.protocol_identity.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get(&db, "no-such-session").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_status_records_identity() {
        let (db, _dir) = setup_db().await;
        create(&db, "s1", None, SessionStatus::Connecting).await.unwrap();

        update_status(&db, "s1", SessionStatus::Connected, Some("5511999@s.net"))
            .await
            .unwrap();

        let session = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
        assert_eq!(session.protocol_identity.as_deref(), Some("5511999@s.net"));

        // Status-only update must not clear the identity.
        update_status(&db, "s1", SessionStatus::Disconnected, None)
            .await
            .unwrap();
        let session = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Disconnected);
        assert_eq!(session.protocol_identity.as_deref(), Some("5511999@s.net"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_restorable_skips_stopped_states() {
        let (db, _dir) = setup_db().await;
        create(&db, "live", None, SessionStatus::Connected).await.unwrap();
        create(&db, "paused", None, SessionStatus::Connecting).await.unwrap();
        create(&db, "stopped", None, SessionStatus::Connecting).await.unwrap();
        create(&db, "errored", None, SessionStatus::Connecting).await.unwrap();
        update_status(&db, "stopped", SessionStatus::Stopped, None).await.unwrap();
        update_status(&db, "errored", SessionStatus::StoppedError, None).await.unwrap();

        let restorable = find_restorable(&db).await.unwrap();
        let ids: Vec<_> = restorable.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["live", "paused"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (db, _dir) = setup_db().await;
        create(&db, "s1", None, SessionStatus::Connecting).await.unwrap();
        delete(&db, "s1").await.unwrap();
        assert!(get(&db, "s1").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
