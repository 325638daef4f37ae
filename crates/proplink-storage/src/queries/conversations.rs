// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state persistence keyed by normalized phone number.
//!
//! State tag, context JSON, and linked incident id are always written in a
//! single statement so a handler can never leave context stale relative to
//! the state it persisted.

use proplink_core::ProplinkError;
use rusqlite::params;

use crate::database::Database;
use crate::models::StoredConversation;

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<StoredConversation, rusqlite::Error> {
    Ok(StoredConversation {
        phone: row.get(0)?,
        state: row.get(1)?,
        context: row.get(2)?,
        incident_id: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Load the conversation row for a sender, if one exists.
pub async fn load_conversation(
    db: &Database,
    phone: &str,
) -> Result<Option<StoredConversation>, ProplinkError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT phone, state, context, incident_id, updated_at
                 FROM conversations WHERE phone = ?1",
            )?;
            let result = stmt.query_row(params![phone], row_to_conversation);
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or atomically replace the conversation row for a sender.
pub async fn save_conversation(
    db: &Database,
    conversation: &StoredConversation,
) -> Result<(), ProplinkError> {
    let conversation = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (phone, state, context, incident_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(phone) DO UPDATE SET
                     state = excluded.state,
                     context = excluded.context,
                     incident_id = excluded.incident_id,
                     updated_at = excluded.updated_at",
                params![
                    conversation.phone,
                    conversation.state,
                    conversation.context,
                    conversation.incident_id,
                    conversation.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
