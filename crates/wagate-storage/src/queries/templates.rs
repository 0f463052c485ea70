// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template CRUD operations, keyed by unique name.

use rusqlite::params;
use wagate_core::WagateError;

use crate::database::Database;
use crate::models::Template;

const TEMPLATE_COLUMNS: &str = "id, name, content, language, category, created_at, updated_at";

fn template_from_row(row: &rusqlite::Row<'_>) -> Result<Template, rusqlite::Error> {
    Ok(Template {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        language: row.get(3)?,
        category: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Create a template. Fails on a duplicate name (UNIQUE constraint).
pub async fn create(
    db: &Database,
    name: &str,
    content: &str,
    language: Option<&str>,
    category: Option<&str>,
) -> Result<Template, WagateError> {
    let name = name.to_string();
    let content = content.to_string();
    let language = language.unwrap_or("en").to_string();
    let category = category.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO templates (name, content, language, category)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, content, language, category],
            )?;
            let id = conn.last_insert_rowid();
            let template = conn.query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
                params![id],
                template_from_row,
            )?;
            Ok(template)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a template by name.
pub async fn get_by_name(db: &Database, name: &str) -> Result<Option<Template>, WagateError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE name = ?1"),
                params![name],
                template_from_row,
            );
            match result {
                Ok(template) => Ok(Some(template)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all templates, newest first.
pub async fn list(db: &Database) -> Result<Vec<Template>, WagateError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], template_from_row)?;
            let mut templates = Vec::new();
            for row in rows {
                templates.push(row?);
            }
            Ok(templates)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update a template's fields; `None` leaves the stored value unchanged.
///
/// Returns the updated template, or `None` if the name does not exist.
pub async fn update(
    db: &Database,
    name: &str,
    content: Option<&str>,
    language: Option<&str>,
    category: Option<&str>,
) -> Result<Option<Template>, WagateError> {
    let name = name.to_string();
    let content = content.map(|s| s.to_string());
    let language = language.map(|s| s.to_string());
    let category = category.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE templates
                 SET content = COALESCE(?1, content),
                     language = COALESCE(?2, language),
                     category = COALESCE(?3, category),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE name = ?4",
                params![content, language, category, name],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let result = conn.query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE name = ?1"),
                params![name],
                template_from_row,
            );
            match result {
                Ok(template) => Ok(Some(template)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a template by name. Returns whether a row was removed.
pub async fn delete(db: &Database, name: &str) -> Result<bool, WagateError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM templates WHERE name = ?1", params![name])?;
            Ok(changed > 0)
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
    async fn create_and_get_by_name() {
        let (db, _dir) = setup_db().await;

        let template = create(&db, "welcome", "Hello {{name}}!", None, Some("onboarding"))
            .await
            .unwrap();
        assert_eq!(template.language, "en");
        assert_eq!(template.category.as_deref(), Some("onboarding"));

        let fetched = get_by_name(&db, "welcome").await.unwrap().unwrap();
        assert_eq!(fetched.content, "Hello {{name}}!");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (db, _dir) = setup_db().await;
        create(&db, "welcome", "v1", None, None).await.unwrap();
        assert!(create(&db, "welcome", "v2", None, None).await.is_err());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (db, _dir) = setup_db().await;
        create(&db, "welcome", "old content", Some("pt"), Some("sales")).await.unwrap();

        let updated = update(&db, "welcome", Some("new content"), None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "new content");
        assert_eq!(updated.language, "pt");
        assert_eq!(updated.category.as_deref(), Some("sales"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_unknown_name_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(update(&db, "ghost", Some("x"), None, None).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (db, _dir) = setup_db().await;
        create(&db, "welcome", "hi", None, None).await.unwrap();
        assert!(delete(&db, "welcome").await.unwrap());
        assert!(!delete(&db, "welcome").await.unwrap());
        assert!(get_by_name(&db, "welcome").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
