//! Bookmark queries

use crate::error::{Error, Result, StorageError};
use crate::types::{StoredBookmark, Token};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Insert or replace the token stored under `label`
pub fn save_bookmark(
    conn: &Connection,
    label: &str,
    token: &Token,
    path: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        r#"
        INSERT INTO bookmarks (label, token, path, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(label) DO UPDATE SET
            token = excluded.token,
            path = excluded.path,
            updated_at = excluded.updated_at
        "#,
        params![label, token.as_bytes(), path, now],
    )?;

    Ok(())
}

/// Get the bookmark stored under `label`
pub fn get_bookmark(conn: &Connection, label: &str) -> Result<Option<StoredBookmark>> {
    let raw = conn
        .query_row(
            r#"
            SELECT label, token, path, created_at, updated_at
            FROM bookmarks
            WHERE label = ?
            "#,
            params![label],
            read_row,
        )
        .optional()?;

    raw.map(into_bookmark).transpose()
}

/// List bookmarks, most recently updated first
pub fn list_bookmarks(conn: &Connection) -> Result<Vec<StoredBookmark>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT label, token, path, created_at, updated_at
        FROM bookmarks
        ORDER BY updated_at DESC, label
        "#,
    )?;

    let rows = stmt
        .query_map([], read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(into_bookmark).collect()
}

/// Delete a bookmark, returning whether one existed
pub fn delete_bookmark(conn: &Connection, label: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM bookmarks WHERE label = ?", params![label])?;
    Ok(deleted > 0)
}

type RawBookmark = (String, Vec<u8>, Option<String>, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawBookmark> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_bookmark(raw: RawBookmark) -> Result<StoredBookmark> {
    let (label, token, path, created_at, updated_at) = raw;
    Ok(StoredBookmark {
        label,
        token: Token::from_bytes(token),
        path,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| {
            Error::Storage(StorageError::Database(format!(
                "invalid timestamp {:?}: {}",
                value, e
            )))
        })
}
