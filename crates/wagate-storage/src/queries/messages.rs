// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-log operations.

use rusqlite::params;
use wagate_core::WagateError;

use crate::database::Database;
use crate::models::{MessageLog, NewMessageLog};

const LOG_COLUMNS: &str = "id, session_id, direction, message_id, recipient, message_type,
     content_preview, status, timestamp";

fn log_from_row(row: &rusqlite::Row<'_>) -> Result<MessageLog, rusqlite::Error> {
    Ok(MessageLog {
        id: row.get(0)?,
        session_id: row.get(1)?,
        direction: row.get(2)?,
        message_id: row.get(3)?,
        recipient: row.get(4)?,
        message_type: row.get(5)?,
        content_preview: row.get(6)?,
        status: row.get(7)?,
        timestamp: row.get(8)?,
    })
}

/// Insert a message-log row.
pub async fn insert(db: &Database, log: &NewMessageLog) -> Result<(), WagateError> {
    let log = log.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO message_logs
                 (session_id, direction, message_id, recipient, message_type, content_preview, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    log.session_id,
                    log.direction,
                    log.message_id,
                    log.recipient,
                    log.message_type,
                    log.content_preview,
                    log.status,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Recent message events, newest first, optionally filtered by session.
pub async fn find_recent(
    db: &Database,
    session_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<MessageLog>, WagateError> {
    let session_id = session_id.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut logs = Vec::new();
            match &session_id {
                Some(sid) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {LOG_COLUMNS} FROM message_logs
                         WHERE session_id = ?1
                         ORDER BY timestamp DESC, id DESC
                         LIMIT ?2 OFFSET ?3"
                    ))?;
                    let rows = stmt.query_map(params![sid, limit, offset], log_from_row)?;
                    for row in rows {
                        logs.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {LOG_COLUMNS} FROM message_logs
                         ORDER BY timestamp DESC, id DESC
                         LIMIT ?1 OFFSET ?2"
                    ))?;
                    let rows = stmt.query_map(params![limit, offset], log_from_row)?;
                    for row in rows {
                        logs.push(row?);
                    }
                }
            }
            Ok(logs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
