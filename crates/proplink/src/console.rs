// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console transport client for local development.
//!
//! Plays the role of the chat-network connection: stdin lines become inbound
//! messages from a fixed sender phone, and outbound sends are printed to
//! stdout. The handshake completes immediately with no QR challenge, so the
//! full engine loop can be exercised without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use proplink_core::types::{
    CloseReason, DeliveryKind, RawInbound, SendReceipt, TransportEvent,
};
use proplink_core::{
    Adapter, HealthStatus, MessageId, ProplinkError, SessionId, TransportClient, TransportFactory,
};

/// A transport client that talks to the terminal instead of a network.
pub struct ConsoleTransport {
    phone: String,
    closed: Arc<AtomicBool>,
}

impl ConsoleTransport {
    pub fn new(phone: String) -> Self {
        Self {
            phone,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Adapter for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, ProplinkError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProplinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TransportClient for ConsoleTransport {
    async fn start(
        &self,
        _credentials: Option<Vec<u8>>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), ProplinkError> {
        self.closed.store(false, Ordering::SeqCst);
        let phone = self.phone.clone();
        let closed = self.closed.clone();

        tokio::spawn(async move {
            if events
                .send(TransportEvent::Open {
                    phone: phone.clone(),
                })
                .await
                .is_err()
            {
                return;
            }
            println!("console transport ready. Type a message as {phone}:");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("stdin closed, ending console session");
                        let _ = events
                            .send(TransportEvent::Closed {
                                reason: CloseReason::LoggedOut,
                            })
                            .await;
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        return;
                    }
                };
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                if line.trim().is_empty() {
                    continue;
                }
                let inbound = RawInbound {
                    message_id: uuid::Uuid::new_v4().to_string(),
                    remote_id: phone.clone(),
                    from_me: false,
                    kind: DeliveryKind::New,
                    text: Some(line),
                    attachments: Vec::new(),
                    timestamp: chrono::Utc::now(),
                };
                if events
                    .send(TransportEvent::Messages(vec![inbound]))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
        Ok(())
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, ProplinkError> {
        println!("-> {recipient}: {text}");
        Ok(SendReceipt {
            message_id: MessageId(uuid::Uuid::new_v4().to_string()),
            timestamp: chrono::Utc::now(),
        })
    }

    async fn presence_update(&self, _recipient: &str) -> Result<(), ProplinkError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ProplinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ProplinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Creates one console client per session.
pub struct ConsoleTransportFactory {
    phone: String,
}

impl ConsoleTransportFactory {
    pub fn new(phone: String) -> Self {
        Self { phone }
    }
}

impl TransportFactory for ConsoleTransportFactory {
    fn create(&self, _session_id: &SessionId) -> Arc<dyn TransportClient> {
        Arc::new(ConsoleTransport::new(self.phone.clone()))
    }
}
