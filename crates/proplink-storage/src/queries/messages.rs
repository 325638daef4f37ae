// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log operations. Records are write-once, never mutated.

use proplink_core::ProplinkError;
use rusqlite::params;

use crate::database::Database;
use crate::models::MessageRecord;

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<MessageRecord, rusqlite::Error> {
    Ok(MessageRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        remote_id: row.get(2)?,
        from_me: row.get(3)?,
        kind: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Append one message record.
pub async fn append_message(db: &Database, record: &MessageRecord) -> Result<(), ProplinkError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, remote_id, from_me, kind, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.session_id,
                    record.remote_id,
                    record.from_me,
                    record.kind,
                    record.content,
                    record.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get message records for a session in chronological order.
pub async fn get_messages_for_session(
    db: &Database,
    session_id: &str,
    limit: Option<i64>,
) -> Result<Vec<MessageRecord>, ProplinkError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, remote_id, from_me, kind, content, created_at
                         FROM messages WHERE session_id = ?1
                         ORDER BY created_at ASC LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![session_id, lim], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, remote_id, from_me, kind, content, created_at
                         FROM messages WHERE session_id = ?1
                         ORDER BY created_at ASC",
                    )?;
                    let rows = stmt.query_map(params![session_id], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
