// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-SQLite storage helper.

use std::sync::Arc;

use proplink_config::model::StorageConfig;
use proplink_core::{ProplinkError, Storage};
use proplink_storage::SqliteStorage;

/// Open an initialized SQLite storage in a fresh temp directory.
///
/// The returned `TempDir` must be kept alive for the storage's lifetime.
pub async fn temp_storage() -> Result<(Arc<dyn Storage>, tempfile::TempDir), ProplinkError> {
    let dir = tempfile::TempDir::new().map_err(|e| ProplinkError::Storage { source: e.into() })?;
    let db_path = dir.path().join("test.db");
    let storage = SqliteStorage::new(StorageConfig {
        database_path: db_path.to_string_lossy().into_owned(),
        wal_mode: true,
    });
    storage.initialize().await?;
    Ok((Arc::new(storage), dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_storage_is_usable() {
        let (storage, _dir) = temp_storage().await.unwrap();
        assert!(storage.list_sessions().await.unwrap().is_empty());
    }
}
