// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proplink status` command implementation.
//!
//! Reads the stored session rows and displays each session's connection
//! status, authenticated phone, and last error. `--json` emits structured
//! output for scripting.

use serde::Serialize;

use proplink_config::model::ProplinkConfig;
use proplink_core::types::SessionRecord;
use proplink_core::{ProplinkError, Storage};
use proplink_storage::SqliteStorage;

/// One session in `--json` output.
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub status: String,
    pub phone: Option<String>,
    pub connected_at: Option<String>,
    pub disconnected_at: Option<String>,
    pub last_error: Option<String>,
}

impl From<&SessionRecord> for SessionStatus {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status.to_string(),
            phone: record.phone.clone(),
            connected_at: record.connected_at.clone(),
            disconnected_at: record.disconnected_at.clone(),
            last_error: record.last_error.clone(),
        }
    }
}

/// Run the `proplink status` command.
pub async fn run_status(config: &ProplinkConfig, json: bool) -> Result<(), ProplinkError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let sessions = storage.list_sessions().await?;
    storage.close().await?;

    if json {
        let statuses: Vec<SessionStatus> = sessions.iter().map(SessionStatus::from).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&statuses).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }

    println!();
    println!("  proplink status");
    println!("  {}", "-".repeat(35));
    if sessions.is_empty() {
        println!("    No sessions. Start with: proplink run");
    }
    for session in &sessions {
        print_session(session);
    }
    println!();
    Ok(())
}

fn print_session(session: &SessionRecord) {
    println!("    Session:  {}", session.id);
    println!("    State:    {}", session.status);
    if let Some(ref phone) = session.phone {
        println!("    Phone:    {phone}");
    }
    if let Some(ref at) = session.connected_at {
        println!("    Up since: {at}");
    }
    if let Some(ref error) = session.last_error {
        println!("    Error:    {error}");
    }
}
