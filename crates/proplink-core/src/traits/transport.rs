// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport client trait for the underlying chat-network connection.
//!
//! The session manager owns exactly one client per live session and is the
//! only caller of these methods. The client pushes lifecycle and inbound
//! events through the channel handed to [`TransportClient::start`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProplinkError;
use crate::traits::adapter::Adapter;
use crate::types::{SendReceipt, SessionId, TransportEvent};

/// One live connection to the chat network.
#[async_trait]
pub trait TransportClient: Adapter {
    /// Begins the transport handshake, resuming silently when a credential
    /// blob is supplied. Lifecycle events (QR challenge, open, credential
    /// rotation, closure) and inbound batches arrive on `events`.
    async fn start(
        &self,
        credentials: Option<Vec<u8>>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), ProplinkError>;

    /// Sends a single text message. One attempt; retry is the delivery
    /// service's concern.
    async fn send_text(&self, recipient: &str, text: &str)
    -> Result<SendReceipt, ProplinkError>;

    /// Low-cost presence update used as an advisory connection health probe
    /// and as a nudge during device-sync stalls.
    async fn presence_update(&self, recipient: &str) -> Result<(), ProplinkError>;

    /// Closes the connection without invalidating credentials.
    async fn close(&self) -> Result<(), ProplinkError>;

    /// Logs out, invalidating the pairing on the remote end.
    async fn logout(&self) -> Result<(), ProplinkError>;
}

/// Creates a transport client for a session. Injected into the session
/// registry so tests can substitute a mock client.
pub trait TransportFactory: Send + Sync + 'static {
    fn create(&self, session_id: &SessionId) -> std::sync::Arc<dyn TransportClient>;
}
