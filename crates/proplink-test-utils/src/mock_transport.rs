// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport client for deterministic testing.
//!
//! `MockTransportClient` implements `TransportClient` with scriptable send
//! outcomes, recorded presence probes, and event injection into the channel
//! captured from `start()`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use proplink_core::types::{HealthStatus, MessageId, SendReceipt, SessionId, TransportEvent};
use proplink_core::{Adapter, ProplinkError, TransportClient, TransportFactory};

/// A scriptable mock transport connection.
///
/// Tests queue send outcomes via [`script_send_failure`], inject lifecycle
/// events via [`inject_event`], and assert against the recorded sends and
/// presence probes.
///
/// [`script_send_failure`]: MockTransportClient::script_send_failure
/// [`inject_event`]: MockTransportClient::inject_event
pub struct MockTransportClient {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    send_failures: Mutex<VecDeque<ProplinkError>>,
    sent: Mutex<Vec<(String, String)>>,
    presence_probes: Mutex<Vec<String>>,
    start_calls: AtomicU32,
    started_with_credentials: Mutex<Vec<Option<Vec<u8>>>>,
    closed: AtomicBool,
    logged_out: AtomicBool,
    fail_presence: AtomicBool,
}

impl MockTransportClient {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(None),
            send_failures: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            presence_probes: Mutex::new(Vec::new()),
            start_calls: AtomicU32::new(0),
            started_with_credentials: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            logged_out: AtomicBool::new(false),
            fail_presence: AtomicBool::new(false),
        }
    }

    /// Queue a failure for the next send attempt. Attempts beyond the queue
    /// succeed.
    pub async fn script_send_failure(&self, error: ProplinkError) {
        self.send_failures.lock().await.push_back(error);
    }

    /// Make all presence updates fail until cleared.
    pub fn set_presence_failing(&self, failing: bool) {
        self.fail_presence.store(failing, Ordering::SeqCst);
    }

    /// Push an event into the channel captured from `start()`.
    ///
    /// # Panics
    ///
    /// Panics if `start()` has not been called yet.
    pub async fn inject_event(&self, event: TransportEvent) {
        let guard = self.events.lock().await;
        let tx = guard.as_ref().expect("start() not called");
        tx.send(event).await.expect("event channel closed");
    }

    /// All `(recipient, text)` pairs passed to `send_text`.
    pub async fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Recipients of recorded presence updates, in call order.
    pub async fn presence_probes(&self) -> Vec<String> {
        self.presence_probes.lock().await.clone()
    }

    /// How many times `start()` has been called.
    pub fn start_count(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// The credential blobs each `start()` call received.
    pub async fn started_with(&self) -> Vec<Option<Vec<u8>>> {
        self.started_with_credentials.lock().await.clone()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn was_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }
}

impl Default for MockTransportClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockTransportClient {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, ProplinkError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProplinkError> {
        Ok(())
    }
}

#[async_trait]
impl TransportClient for MockTransportClient {
    async fn start(
        &self,
        credentials: Option<Vec<u8>>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), ProplinkError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started_with_credentials.lock().await.push(credentials);
        *self.events.lock().await = Some(events);
        Ok(())
    }

    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<SendReceipt, ProplinkError> {
        if let Some(error) = self.send_failures.lock().await.pop_front() {
            return Err(error);
        }
        self.sent
            .lock()
            .await
            .push((recipient.to_string(), text.to_string()));
        Ok(SendReceipt {
            message_id: MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())),
            timestamp: chrono::Utc::now(),
        })
    }

    async fn presence_update(&self, recipient: &str) -> Result<(), ProplinkError> {
        self.presence_probes.lock().await.push(recipient.to_string());
        if self.fail_presence.load(Ordering::SeqCst) {
            return Err(ProplinkError::TransportTimeout { stall: false });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ProplinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ProplinkError> {
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out a single shared [`MockTransportClient`] so tests keep
/// a handle to the client the registry talks to.
pub struct MockTransportFactory {
    client: Arc<MockTransportClient>,
    create_calls: AtomicU32,
}

impl MockTransportFactory {
    pub fn new(client: Arc<MockTransportClient>) -> Self {
        Self {
            client,
            create_calls: AtomicU32::new(0),
        }
    }

    pub fn create_count(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _session_id: &SessionId) -> Arc<dyn TransportClient> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.client.clone()
    }
}
