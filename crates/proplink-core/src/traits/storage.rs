// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage trait for the persistence backend (SQLite).

use async_trait::async_trait;

use crate::error::ProplinkError;
use crate::traits::adapter::Adapter;
use crate::types::{ConnectionStatus, MessageRecord, SessionRecord, StoredConversation};

/// Persistence backend for sessions, conversation states, and the
/// append-only message log.
#[async_trait]
pub trait Storage: Adapter {
    /// Initializes the backend (migrations, connection handles).
    async fn initialize(&self) -> Result<(), ProplinkError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), ProplinkError>;

    // --- Session operations ---

    /// Inserts or fully replaces a session row.
    async fn upsert_session(&self, session: &SessionRecord) -> Result<(), ProplinkError>;

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, ProplinkError>;

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, ProplinkError>;

    /// Updates status, phone, and last error in one statement.
    async fn update_session_status(
        &self,
        id: &str,
        status: ConnectionStatus,
        phone: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<(), ProplinkError>;

    /// Rewrites the session's credential blob. `None` clears it (logout).
    async fn save_credentials(
        &self,
        id: &str,
        credentials: Option<&[u8]>,
    ) -> Result<(), ProplinkError>;

    // --- Conversation operations ---

    async fn load_conversation(
        &self,
        phone: &str,
    ) -> Result<Option<StoredConversation>, ProplinkError>;

    /// Writes state tag, context JSON, and linked incident id atomically.
    /// Rows are never hard-deleted; a reset writes `idle` with empty context.
    async fn save_conversation(
        &self,
        conversation: &StoredConversation,
    ) -> Result<(), ProplinkError>;

    // --- Message log ---

    /// Appends one write-once message record.
    async fn append_message(&self, record: &MessageRecord) -> Result<(), ProplinkError>;

    /// Returns message records for a session in chronological order.
    async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<MessageRecord>, ProplinkError>;
}
