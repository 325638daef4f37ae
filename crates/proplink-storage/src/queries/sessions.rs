// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.

use proplink_core::ProplinkError;
use proplink_core::types::ConnectionStatus;
use rusqlite::params;

use crate::database::Database;
use crate::models::SessionRecord;

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    let status_str: String = row.get(1)?;
    let status: ConnectionStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SessionRecord {
        id: row.get(0)?,
        status,
        phone: row.get(2)?,
        last_error: row.get(3)?,
        credentials: row.get(4)?,
        connected_at: row.get(5)?,
        disconnected_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const SESSION_COLUMNS: &str = "id, status, phone, last_error, credentials, connected_at, \
                               disconnected_at, created_at, updated_at";

/// Insert or fully replace a session row.
pub async fn upsert_session(db: &Database, session: &SessionRecord) -> Result<(), ProplinkError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, phone, last_error, credentials,
                                       connected_at, disconnected_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     phone = excluded.phone,
                     last_error = excluded.last_error,
                     credentials = excluded.credentials,
                     connected_at = excluded.connected_at,
                     disconnected_at = excluded.disconnected_at,
                     updated_at = excluded.updated_at",
                params![
                    session.id,
                    session.status.to_string(),
                    session.phone,
                    session.last_error,
                    session.credentials,
                    session.connected_at,
                    session.disconnected_at,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<SessionRecord>, ProplinkError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all sessions, most recently created first.
pub async fn list_sessions(db: &Database) -> Result<Vec<SessionRecord>, ProplinkError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update a session's status, phone, and last error in one statement.
///
/// A `None` phone keeps the stored value; a `None` last_error clears it.
pub async fn update_session_status(
    db: &Database,
    id: &str,
    status: ConnectionStatus,
    phone: Option<&str>,
    last_error: Option<&str>,
) -> Result<(), ProplinkError> {
    let id = id.to_string();
    let status = status.to_string();
    let phone = phone.map(|p| p.to_string());
    let last_error = last_error.map(|e| e.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1, phone = COALESCE(?2, phone), last_error = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![status, phone, last_error, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rewrite the session's credential blob. `None` clears it.
pub async fn save_credentials(
    db: &Database,
    id: &str,
    credentials: Option<&[u8]>,
) -> Result<(), ProplinkError> {
    let id = id.to_string();
    let credentials = credentials.map(|c| c.to_vec());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET credentials = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![credentials, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
