// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the Storage trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use proplink_config::model::StorageConfig;
use proplink_core::types::{ConnectionStatus, MessageRecord, SessionRecord, StoredConversation};
use proplink_core::{Adapter, HealthStatus, ProplinkError, Storage};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`Storage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`Storage::initialize`]
    /// is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ProplinkError> {
        self.db.get().ok_or_else(|| ProplinkError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl Adapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, ProplinkError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProplinkError> {
        // Shutdown delegates to close if the DB was initialized.
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<(), ProplinkError> {
        let path = self.config.database_path.clone();
        let db = Database::open(&path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ProplinkError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ProplinkError> {
        let db = self.db()?;
        // Checkpoint WAL before close.
        db.connection()
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Session operations ---

    async fn upsert_session(&self, session: &SessionRecord) -> Result<(), ProplinkError> {
        queries::sessions::upsert_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, ProplinkError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, ProplinkError> {
        queries::sessions::list_sessions(self.db()?).await
    }

    async fn update_session_status(
        &self,
        id: &str,
        status: ConnectionStatus,
        phone: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<(), ProplinkError> {
        queries::sessions::update_session_status(self.db()?, id, status, phone, last_error).await
    }

    async fn save_credentials(
        &self,
        id: &str,
        credentials: Option<&[u8]>,
    ) -> Result<(), ProplinkError> {
        queries::sessions::save_credentials(self.db()?, id, credentials).await
    }

    // --- Conversation operations ---

    async fn load_conversation(
        &self,
        phone: &str,
    ) -> Result<Option<StoredConversation>, ProplinkError> {
        queries::conversations::load_conversation(self.db()?, phone).await
    }

    async fn save_conversation(
        &self,
        conversation: &StoredConversation,
    ) -> Result<(), ProplinkError> {
        queries::conversations::save_conversation(self.db()?, conversation).await
    }

    // --- Message log ---

    async fn append_message(&self, record: &MessageRecord) -> Result<(), ProplinkError> {
        queries::messages::append_message(self.db()?, record).await
    }

    async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<MessageRecord>, ProplinkError> {
        queries::messages::get_messages_for_session(self.db()?, session_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        let result = storage.initialize().await;
        assert!(result.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        let status = storage.health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        let result = storage.health_check().await;
        assert!(result.is_err(), "health_check should fail before initialize");
    }

    #[tokio::test]
    async fn full_session_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let session = SessionRecord {
            id: "main".to_string(),
            status: ConnectionStatus::Disconnected,
            phone: None,
            last_error: None,
            credentials: None,
            connected_at: None,
            disconnected_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        storage.upsert_session(&session).await.unwrap();

        let retrieved = storage.get_session("main").await.unwrap().unwrap();
        assert_eq!(retrieved.id, "main");
        assert_eq!(retrieved.status, ConnectionStatus::Disconnected);

        storage
            .update_session_status(
                "main",
                ConnectionStatus::Connected,
                Some("27821234567"),
                None,
            )
            .await
            .unwrap();
        let updated = storage.get_session("main").await.unwrap().unwrap();
        assert_eq!(updated.status, ConnectionStatus::Connected);
        assert_eq!(updated.phone.as_deref(), Some("27821234567"));

        let record = MessageRecord {
            id: "m1".to_string(),
            session_id: "main".to_string(),
            remote_id: "27821234567".to_string(),
            from_me: false,
            kind: "new".to_string(),
            content: Some("hi".to_string()),
            created_at: "2026-01-01T00:00:01.000Z".to_string(),
        };
        storage.append_message(&record).await.unwrap();
        let messages = storage.get_messages("main", None).await.unwrap();
        assert_eq!(messages.len(), 1);

        let all = storage.list_sessions().await.unwrap();
        assert_eq!(all.len(), 1);

        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn conversation_state_survives_adapter_roundtrip() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("conv.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let conv = StoredConversation {
            phone: "27821234567".to_string(),
            state: "awaiting_description".to_string(),
            context: r#"{"state":"awaiting_description"}"#.to_string(),
            incident_id: None,
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        storage.save_conversation(&conv).await.unwrap();

        let loaded = storage
            .load_conversation("27821234567")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.state, "awaiting_description");

        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_runs_checkpoint() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("shutdown.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let session = SessionRecord {
            id: "main".to_string(),
            status: ConnectionStatus::Disconnected,
            phone: None,
            last_error: None,
            credentials: None,
            connected_at: None,
            disconnected_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        storage.upsert_session(&session).await.unwrap();

        storage.shutdown().await.unwrap();
    }
}
