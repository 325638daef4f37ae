// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `proplink run` command implementation.
//!
//! Wires SQLite storage, the session registry, outbound delivery, the
//! inbound intake pump, and the conversation engine, then runs until ctrl-c.
//! The transport is the console client; the collaborators are the local
//! in-process implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::mpsc;
use tracing::{info, warn};

use proplink_config::model::ProplinkConfig;
use proplink_conversation::{ConversationEngine, EngineDeps};
use proplink_core::{ConnectionStatus, ProplinkError, SessionId, Storage};
use proplink_storage::SqliteStorage;
use proplink_transport::{DeliveryService, IntakePump, RetryPolicy, SessionRegistry};

use crate::console::ConsoleTransportFactory;
use crate::local::{HeuristicClassifier, LocalDirectory, LocalIncidentService, LocalOtpService};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML file seeding the tenant and property-code directory.
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Sender phone number the console transport reports.
    #[arg(long, default_value = "27820000000")]
    pub phone: String,
}

/// Run the engine loop until ctrl-c.
pub async fn run(config: ProplinkConfig, args: RunArgs) -> Result<(), ProplinkError> {
    init_tracing(&config.engine.log_level);
    info!(name = %config.engine.name, "starting proplink run");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let storage: Arc<dyn Storage> = storage;

    let directory = Arc::new(match args.directory {
        Some(ref path) => LocalDirectory::load(path)?,
        None => {
            warn!("no --directory given; every sender will need email verification");
            LocalDirectory::empty()
        }
    });
    let engine = Arc::new(ConversationEngine::new(
        EngineDeps {
            storage: storage.clone(),
            tenants: directory.clone(),
            codes: directory.clone(),
            otp: Arc::new(LocalOtpService::new(
                directory.clone(),
                Duration::from_secs(config.otp.code_ttl_secs),
            )),
            incidents: Arc::new(LocalIncidentService::new()),
            classifier: Arc::new(HeuristicClassifier),
        },
        config.engine.clone(),
        config.classifier.clone(),
    ));

    let (intake_tx, intake_rx) = mpsc::channel(256);
    let factory = Arc::new(ConsoleTransportFactory::new(args.phone));
    let registry = Arc::new(SessionRegistry::new(
        storage.clone(),
        factory,
        config.transport.clone(),
        intake_tx,
    ));
    let delivery = Arc::new(DeliveryService::new(
        registry.clone(),
        storage.clone(),
        RetryPolicy::from_config(&config.transport),
    ));
    let pump = IntakePump::new(storage.clone(), engine, delivery);

    let session_id = SessionId(config.transport.session_id.clone());
    registry.connect(&session_id).await?;

    let pump_task = tokio::spawn(async move {
        pump.run(intake_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ProplinkError::Internal(format!("signal handler failed: {e}")))?;
    info!("shutdown signal received");

    if let Err(e) = registry.disconnect(&session_id).await {
        warn!(error = %e, "disconnect on shutdown failed");
    }
    pump_task.abort();
    storage.close().await?;
    info!("proplink run shutdown complete");
    Ok(())
}

/// Invalidate the stored pairing without a live connection.
pub async fn run_logout(config: &ProplinkConfig) -> Result<(), ProplinkError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;

    let id = &config.transport.session_id;
    storage.save_credentials(id, None).await?;
    storage
        .update_session_status(id, ConnectionStatus::LoggedOut, None, None)
        .await?;
    storage.close().await?;

    println!("session {id}: credentials cleared, next run will require pairing");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proplink={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
