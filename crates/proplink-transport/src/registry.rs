// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry: connection lifecycle for transport sessions.
//!
//! Holds at most one live [`SessionHandle`] per session id and owns the
//! event loop consuming the transport client's lifecycle events. Reconnects
//! after a transient close are fire-and-forget delayed tasks; they abort if
//! the session has meanwhile been disconnected or logged out.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};

use proplink_config::model::TransportConfig;
use proplink_core::types::{CloseReason, RawInbound, SessionRecord, TransportEvent};
use proplink_core::{
    ConnectionStatus, ProplinkError, SessionId, Storage, TransportClient, TransportFactory,
};

use crate::qr;

/// Current timestamp in the ISO-8601 millisecond format the storage layer uses.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// One live session: the transport client plus its in-memory lifecycle state.
pub struct SessionHandle {
    pub id: SessionId,
    client: Arc<dyn TransportClient>,
    status: RwLock<ConnectionStatus>,
    phone: RwLock<Option<String>>,
    last_qr: RwLock<Option<String>>,
}

impl SessionHandle {
    fn new(id: SessionId, client: Arc<dyn TransportClient>) -> Self {
        Self {
            id,
            client,
            status: RwLock::new(ConnectionStatus::Disconnected),
            phone: RwLock::new(None),
            last_qr: RwLock::new(None),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    async fn set_status(&self, status: ConnectionStatus) {
        *self.status.write().await = status;
    }

    /// Phone number this session authenticated as, once `Connected`.
    pub async fn authenticated_phone(&self) -> Option<String> {
        self.phone.read().await.clone()
    }

    /// The most recent rendered QR challenge, while pairing is pending.
    pub async fn last_qr(&self) -> Option<String> {
        self.last_qr.read().await.clone()
    }

    pub(crate) fn client(&self) -> Arc<dyn TransportClient> {
        self.client.clone()
    }
}

/// Registry of transport sessions. Injected wherever session access is
/// needed; there is deliberately no global instance.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
    storage: Arc<dyn Storage>,
    factory: Arc<dyn TransportFactory>,
    config: TransportConfig,
    intake_tx: mpsc::Sender<(SessionId, RawInbound)>,
}

impl SessionRegistry {
    pub fn new(
        storage: Arc<dyn Storage>,
        factory: Arc<dyn TransportFactory>,
        config: TransportConfig,
        intake_tx: mpsc::Sender<(SessionId, RawInbound)>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            storage,
            factory,
            config,
            intake_tx,
        }
    }

    /// The live handle for a session, if one has been created.
    pub async fn live(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Connection status for a session. `Disconnected` when unknown.
    pub async fn status(&self, id: &SessionId) -> ConnectionStatus {
        match self.live(id).await {
            Some(handle) => handle.status().await,
            None => ConnectionStatus::Disconnected,
        }
    }

    /// Open the session's transport connection.
    ///
    /// A no-op when the session is already `Connected`. Persisted credentials
    /// are handed to the client so an existing pairing resumes silently;
    /// otherwise the client emits a QR challenge.
    pub async fn connect(self: &Arc<Self>, id: &SessionId) -> Result<(), ProplinkError> {
        let handle = {
            let mut sessions = self.sessions.lock().await;
            if let Some(existing) = sessions.get(id) {
                if existing.status().await == ConnectionStatus::Connected {
                    debug!(session = %id, "connect: already connected");
                    return Ok(());
                }
                existing.clone()
            } else {
                let client = self.factory.create(id);
                let handle = Arc::new(SessionHandle::new(id.clone(), client));
                sessions.insert(id.clone(), handle.clone());
                handle
            }
        };
        self.ensure_session_row(id).await?;
        self.start_session(handle).await
    }

    /// Close the connection, keeping credentials for a later reconnect.
    ///
    /// Moving the in-memory status to `Disconnected` also cancels any
    /// reconnect still pending from a transient close.
    pub async fn disconnect(&self, id: &SessionId) -> Result<(), ProplinkError> {
        let handle = self.live(id).await.ok_or_else(|| ProplinkError::NotConnected {
            session_id: id.0.clone(),
        })?;
        handle.set_status(ConnectionStatus::Disconnected).await;
        self.storage
            .update_session_status(&id.0, ConnectionStatus::Disconnected, None, None)
            .await?;
        handle.client.close().await?;
        info!(session = %id, "disconnected");
        Ok(())
    }

    /// Tear the connection down and bring it back up, for degraded
    /// connections that have not closed on their own.
    pub async fn reconnect(self: &Arc<Self>, id: &SessionId) -> Result<(), ProplinkError> {
        self.disconnect(id).await?;
        tokio::time::sleep(Duration::from_secs(self.config.reconnect_pause_secs)).await;
        self.connect(id).await
    }

    /// Log the session out, invalidating the pairing and clearing the stored
    /// credential blob. Terminal: the session will not auto-reconnect.
    pub async fn logout(&self, id: &SessionId) -> Result<(), ProplinkError> {
        let handle = self.live(id).await.ok_or_else(|| ProplinkError::NotConnected {
            session_id: id.0.clone(),
        })?;
        handle.client.logout().await?;
        handle.set_status(ConnectionStatus::LoggedOut).await;
        self.storage.save_credentials(&id.0, None).await?;
        self.storage
            .update_session_status(&id.0, ConnectionStatus::LoggedOut, None, None)
            .await?;
        info!(session = %id, "logged out, credentials cleared");
        Ok(())
    }

    async fn ensure_session_row(&self, id: &SessionId) -> Result<(), ProplinkError> {
        if self.storage.get_session(&id.0).await?.is_none() {
            let now = now_iso();
            self.storage
                .upsert_session(&SessionRecord {
                    id: id.0.clone(),
                    status: ConnectionStatus::Disconnected,
                    phone: None,
                    last_error: None,
                    credentials: None,
                    connected_at: None,
                    disconnected_at: None,
                    created_at: now.clone(),
                    updated_at: now,
                })
                .await?;
        }
        Ok(())
    }

    async fn start_session(self: &Arc<Self>, handle: Arc<SessionHandle>) -> Result<(), ProplinkError> {
        handle.set_status(ConnectionStatus::Connecting).await;
        self.storage
            .update_session_status(&handle.id.0, ConnectionStatus::Connecting, None, None)
            .await?;

        let credentials = self
            .storage
            .get_session(&handle.id.0)
            .await?
            .and_then(|s| s.credentials);
        let resuming = credentials.is_some();

        let (tx, rx) = mpsc::channel(64);
        let registry = self.clone();
        let event_handle = handle.clone();
        tokio::spawn(async move {
            registry.run_events(event_handle, rx).await;
        });

        debug!(session = %handle.id, resuming, "starting transport handshake");
        handle.client.start(credentials, tx).await
    }

    /// `start_session` behind a boxed future. The reconnect task re-enters
    /// `start_session` from inside the event loop it spawns, which makes the
    /// plain async fn's type recursive; boxing keeps the spawned task finite.
    fn start_session_boxed(
        self: &Arc<Self>,
        handle: Arc<SessionHandle>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProplinkError>> + Send>> {
        let registry = self.clone();
        Box::pin(async move { registry.start_session(handle).await })
    }

    async fn run_events(
        self: Arc<Self>,
        handle: Arc<SessionHandle>,
        mut rx: mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::Qr(payload) => self.on_qr(&handle, &payload).await,
                TransportEvent::Open { phone } => self.on_open(&handle, phone).await,
                TransportEvent::CredentialsRotated(blob) => {
                    if let Err(e) = self.storage.save_credentials(&handle.id.0, Some(&blob)).await
                    {
                        error!(session = %handle.id, error = %e, "failed to persist rotated credentials");
                    } else {
                        debug!(session = %handle.id, "credentials rotated");
                    }
                }
                TransportEvent::Messages(batch) => {
                    for message in batch {
                        if self
                            .intake_tx
                            .send((handle.id.clone(), message))
                            .await
                            .is_err()
                        {
                            warn!(session = %handle.id, "intake channel closed, dropping inbound");
                        }
                    }
                }
                TransportEvent::Closed { reason } => {
                    self.on_closed(handle.clone(), reason).await;
                    // The client stops emitting after close; a reconnect runs
                    // its own event loop.
                    break;
                }
            }
        }
    }

    async fn on_qr(&self, handle: &Arc<SessionHandle>, payload: &str) {
        handle.set_status(ConnectionStatus::QrPending).await;
        if let Err(e) = self
            .storage
            .update_session_status(&handle.id.0, ConnectionStatus::QrPending, None, None)
            .await
        {
            error!(session = %handle.id, error = %e, "failed to persist qr_pending status");
        }
        match qr::render_unicode(payload) {
            Ok(art) => {
                info!(session = %handle.id, "pairing required, scan the QR code:\n{art}");
                *handle.last_qr.write().await = Some(art);
            }
            Err(e) => warn!(session = %handle.id, error = %e, "failed to render QR challenge"),
        }
    }

    async fn on_open(&self, handle: &Arc<SessionHandle>, phone: String) {
        handle.set_status(ConnectionStatus::Connected).await;
        *handle.phone.write().await = Some(phone.clone());
        *handle.last_qr.write().await = None;

        match self.storage.get_session(&handle.id.0).await {
            Ok(Some(mut record)) => {
                record.status = ConnectionStatus::Connected;
                record.phone = Some(phone.clone());
                record.last_error = None;
                record.connected_at = Some(now_iso());
                record.updated_at = now_iso();
                if let Err(e) = self.storage.upsert_session(&record).await {
                    error!(session = %handle.id, error = %e, "failed to persist connected state");
                }
            }
            Ok(None) => warn!(session = %handle.id, "session row missing at open"),
            Err(e) => error!(session = %handle.id, error = %e, "failed to load session at open"),
        }
        info!(session = %handle.id, phone = %phone, "connection open");
    }

    async fn on_closed(self: &Arc<Self>, handle: Arc<SessionHandle>, reason: CloseReason) {
        match reason {
            CloseReason::LoggedOut => {
                warn!(session = %handle.id, "remote logout, clearing credentials");
                handle.set_status(ConnectionStatus::LoggedOut).await;
                if let Err(e) = self.storage.save_credentials(&handle.id.0, None).await {
                    error!(session = %handle.id, error = %e, "failed to clear credentials");
                }
                self.persist_closed(&handle, ConnectionStatus::LoggedOut, "logged out")
                    .await;
            }
            CloseReason::Transient { detail } => {
                warn!(session = %handle.id, detail = %detail, "connection closed, scheduling reconnect");
                handle.set_status(ConnectionStatus::Connecting).await;
                self.persist_closed(&handle, ConnectionStatus::Connecting, &detail)
                    .await;

                let registry = self.clone();
                let delay = Duration::from_secs(self.config.reconnect_delay_secs);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // An explicit disconnect or logout in the meantime moves
                    // the status away from Connecting and wins.
                    if handle.status().await != ConnectionStatus::Connecting {
                        debug!(session = %handle.id, "reconnect cancelled");
                        return;
                    }
                    info!(session = %handle.id, "reconnecting after transient close");
                    if let Err(e) = registry.start_session_boxed(handle.clone()).await {
                        error!(session = %handle.id, error = %e, "reconnect failed");
                    }
                });
            }
        }
    }

    async fn persist_closed(
        &self,
        handle: &Arc<SessionHandle>,
        status: ConnectionStatus,
        detail: &str,
    ) {
        match self.storage.get_session(&handle.id.0).await {
            Ok(Some(mut record)) => {
                record.status = status;
                record.last_error = Some(detail.to_string());
                record.disconnected_at = Some(now_iso());
                record.updated_at = now_iso();
                if let Err(e) = self.storage.upsert_session(&record).await {
                    error!(session = %handle.id, error = %e, "failed to persist closed state");
                }
            }
            Ok(None) => warn!(session = %handle.id, "session row missing at close"),
            Err(e) => error!(session = %handle.id, error = %e, "failed to load session at close"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proplink_test_utils::{MockTransportClient, MockTransportFactory, temp_storage};

    struct Fixture {
        registry: Arc<SessionRegistry>,
        client: Arc<MockTransportClient>,
        _intake_rx: mpsc::Receiver<(SessionId, RawInbound)>,
        _dir: tempfile::TempDir,
        storage: Arc<dyn Storage>,
    }

    async fn fixture() -> Fixture {
        let (storage, dir) = temp_storage().await.unwrap();
        let client = Arc::new(MockTransportClient::new());
        let factory = Arc::new(MockTransportFactory::new(client.clone()));
        let (intake_tx, intake_rx) = mpsc::channel(64);
        let registry = Arc::new(SessionRegistry::new(
            storage.clone(),
            factory,
            TransportConfig::default(),
            intake_tx,
        ));
        Fixture {
            registry,
            client,
            _intake_rx: intake_rx,
            _dir: dir,
            storage,
        }
    }

    fn main_session() -> SessionId {
        SessionId("main".to_string())
    }

    const WAIT: std::time::Duration = std::time::Duration::from_secs(5);

    /// Wall-clock bounded poll for an expected in-memory status. Yields
    /// instead of sleeping so a paused clock cannot auto-advance past timers
    /// the test has not reached yet.
    async fn wait_for_status(f: &Fixture, id: &SessionId, want: ConnectionStatus) {
        let deadline = std::time::Instant::now() + WAIT;
        while f.registry.status(id).await != want {
            assert!(
                std::time::Instant::now() < deadline,
                "timed out waiting for status {want}"
            );
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_start_count(f: &Fixture, want: u32) {
        let deadline = std::time::Instant::now() + WAIT;
        while f.client.start_count() != want {
            assert!(
                std::time::Instant::now() < deadline,
                "timed out waiting for {want} starts"
            );
            tokio::task::yield_now().await;
        }
    }

    /// Poll the persisted session row until `check` accepts it.
    async fn wait_for_row(f: &Fixture, check: fn(&SessionRecord) -> bool) -> SessionRecord {
        let deadline = std::time::Instant::now() + WAIT;
        loop {
            if let Some(row) = f.storage.get_session("main").await.unwrap() {
                if check(&row) {
                    return row;
                }
            }
            assert!(
                std::time::Instant::now() < deadline,
                "timed out waiting for session row"
            );
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_qr(f: &Fixture, id: &SessionId) -> String {
        let handle = f.registry.live(id).await.unwrap();
        let deadline = std::time::Instant::now() + WAIT;
        loop {
            if let Some(art) = handle.last_qr().await {
                return art;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "timed out waiting for QR render"
            );
            tokio::task::yield_now().await;
        }
    }

    /// Short wall-clock window for asserting that nothing further happens.
    async fn grace_period() {
        let until = std::time::Instant::now() + std::time::Duration::from_millis(200);
        while std::time::Instant::now() < until {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn connect_moves_to_connecting_and_starts_client() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        assert_eq!(f.registry.status(&id).await, ConnectionStatus::Connecting);
        assert_eq!(f.client.start_count(), 1);

        let row = f.storage.get_session("main").await.unwrap().unwrap();
        assert_eq!(row.status, ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn connect_is_idempotent_once_connected() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::Open {
                phone: "27820001111".into(),
            })
            .await;
        wait_for_status(&f, &id, ConnectionStatus::Connected).await;

        f.registry.connect(&id).await.unwrap();
        assert_eq!(f.client.start_count(), 1, "second connect must be a no-op");
    }

    #[tokio::test]
    async fn qr_challenge_moves_to_qr_pending_and_renders() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::Qr("pairing-payload".into()))
            .await;
        wait_for_status(&f, &id, ConnectionStatus::QrPending).await;

        let art = wait_for_qr(&f, &id).await;
        assert!(!art.is_empty());
        wait_for_row(&f, |r| r.status == ConnectionStatus::QrPending).await;
    }

    #[tokio::test]
    async fn open_records_phone_and_timestamp() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::Open {
                phone: "27820001111".into(),
            })
            .await;
        wait_for_status(&f, &id, ConnectionStatus::Connected).await;

        let handle = f.registry.live(&id).await.unwrap();
        assert_eq!(
            handle.authenticated_phone().await.as_deref(),
            Some("27820001111")
        );
        let row = wait_for_row(&f, |r| r.status == ConnectionStatus::Connected).await;
        assert_eq!(row.phone.as_deref(), Some("27820001111"));
        assert!(row.connected_at.is_some());
    }

    #[tokio::test]
    async fn rotated_credentials_are_persisted() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::CredentialsRotated(b"blob-v2".to_vec()))
            .await;

        let row = wait_for_row(&f, |r| r.credentials.is_some()).await;
        assert_eq!(row.credentials.as_deref(), Some(b"blob-v2".as_slice()));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_close_schedules_exactly_one_reconnect() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::Open {
                phone: "27820001111".into(),
            })
            .await;
        wait_for_status(&f, &id, ConnectionStatus::Connected).await;
        // Wait for the Connected row write too, so the Connecting row below
        // cannot be the stale row from the initial connect.
        wait_for_row(&f, |r| r.status == ConnectionStatus::Connected).await;

        f.client
            .inject_event(TransportEvent::Closed {
                reason: CloseReason::Transient {
                    detail: "stream error".into(),
                },
            })
            .await;
        // The row write is the last step before the reconnect is scheduled.
        wait_for_row(&f, |r| r.status == ConnectionStatus::Connecting).await;
        assert_eq!(f.registry.status(&id).await, ConnectionStatus::Connecting);
        assert_eq!(f.client.start_count(), 1);

        // Default reconnect delay is 3s.
        tokio::time::sleep(Duration::from_secs(4)).await;
        wait_for_start_count(&f, 2).await;

        // No further reconnects without another close.
        tokio::time::sleep(Duration::from_secs(30)).await;
        grace_period().await;
        assert_eq!(f.client.start_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_disconnect_cancels_pending_reconnect() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::Closed {
                reason: CloseReason::Transient {
                    detail: "stream error".into(),
                },
            })
            .await;
        wait_for_row(&f, |r| r.status == ConnectionStatus::Connecting).await;

        f.registry.disconnect(&id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        grace_period().await;

        assert_eq!(f.client.start_count(), 1, "reconnect must have been cancelled");
        assert_eq!(f.registry.status(&id).await, ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_close_is_terminal_and_clears_credentials() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::CredentialsRotated(b"blob".to_vec()))
            .await;
        wait_for_row(&f, |r| r.credentials.is_some()).await;
        f.client
            .inject_event(TransportEvent::Closed {
                reason: CloseReason::LoggedOut,
            })
            .await;
        wait_for_status(&f, &id, ConnectionStatus::LoggedOut).await;
        wait_for_row(&f, |r| r.credentials.is_none()).await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        grace_period().await;
        assert_eq!(f.client.start_count(), 1, "logged out sessions never auto-reconnect");
    }

    #[tokio::test]
    async fn explicit_logout_clears_credentials() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::CredentialsRotated(b"blob".to_vec()))
            .await;
        wait_for_row(&f, |r| r.credentials.is_some()).await;

        f.registry.logout(&id).await.unwrap();
        assert!(f.client.was_logged_out());
        let row = f.storage.get_session("main").await.unwrap().unwrap();
        assert!(row.credentials.is_none());
        assert_eq!(row.status, ConnectionStatus::LoggedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_pauses_then_reconnects() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::Open {
                phone: "27820001111".into(),
            })
            .await;
        wait_for_status(&f, &id, ConnectionStatus::Connected).await;

        f.registry.reconnect(&id).await.unwrap();
        assert!(f.client.was_closed());
        assert_eq!(f.client.start_count(), 2);
        assert_eq!(f.registry.status(&id).await, ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn resumed_start_receives_stored_credentials() {
        let f = fixture().await;
        let id = main_session();

        f.registry.connect(&id).await.unwrap();
        f.client
            .inject_event(TransportEvent::CredentialsRotated(b"stored".to_vec()))
            .await;
        wait_for_row(&f, |r| r.credentials.is_some()).await;

        // Simulate a fresh process: a second connect on a non-connected
        // session reloads the blob from storage.
        f.registry.connect(&id).await.unwrap();
        let starts = f.client.started_with().await;
        assert_eq!(starts.len(), 2);
        assert!(starts[0].is_none());
        assert_eq!(starts[1].as_deref(), Some(b"stored".as_slice()));
    }
}
