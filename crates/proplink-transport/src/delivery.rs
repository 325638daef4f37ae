// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery with preconditions, advisory health probe, and bounded
//! retries.
//!
//! Preconditions fail fast: a send against a session that is not `Connected`
//! with a known phone never consumes a delivery attempt. The presence probe
//! before the first attempt is advisory; its failure is logged and the send
//! proceeds.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use proplink_core::types::{MessageRecord, SendReceipt};
use proplink_core::{ConnectionStatus, ProplinkError, SessionId, Storage};

use crate::registry::{SessionRegistry, now_iso};
use crate::retry::{RetryPolicy, delay_for_attempt};

/// Sends outbound text messages through a live session.
pub struct DeliveryService {
    registry: Arc<SessionRegistry>,
    storage: Arc<dyn Storage>,
    policy: RetryPolicy,
}

impl DeliveryService {
    pub fn new(registry: Arc<SessionRegistry>, storage: Arc<dyn Storage>, policy: RetryPolicy) -> Self {
        Self {
            registry,
            storage,
            policy,
        }
    }

    /// Deliver one text message to a recipient.
    ///
    /// Retries timeout-class failures up to the policy's attempt budget with
    /// exponential backoff. A device-sync stall doubles the backoff and gets
    /// a presence nudge before each retry. On success the outbound record is
    /// persisted; a persistence failure is logged but does not undo the send.
    pub async fn send_message(
        &self,
        session_id: &SessionId,
        recipient: &str,
        text: &str,
    ) -> Result<SendReceipt, ProplinkError> {
        let handle = self
            .registry
            .live(session_id)
            .await
            .ok_or_else(|| ProplinkError::NotConnected {
                session_id: session_id.0.clone(),
            })?;

        if handle.status().await != ConnectionStatus::Connected {
            return Err(ProplinkError::NotConnected {
                session_id: session_id.0.clone(),
            });
        }
        if handle.authenticated_phone().await.is_none() {
            return Err(ProplinkError::NotAuthenticated {
                session_id: session_id.0.clone(),
            });
        }

        let client = handle.client();

        // Advisory probe. Never blocks the send.
        if let Err(e) = client.presence_update(recipient).await {
            warn!(session = %session_id, error = %e, "presence probe failed before send");
        }

        let started = Instant::now();
        let mut attempt: u32 = 1;
        loop {
            match client.send_text(recipient, text).await {
                Ok(receipt) => {
                    info!(
                        session = %session_id,
                        recipient,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "message delivered"
                    );
                    self.persist_outbound(session_id, recipient, text, &receipt).await;
                    return Ok(receipt);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let stall = e.is_stall();
                    let delay = delay_for_attempt(&self.policy, attempt - 1, stall);
                    warn!(
                        session = %session_id,
                        recipient,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        delay_ms = delay.as_millis() as u64,
                        stall,
                        error = %e,
                        "send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    if stall {
                        // Nudge the stalled device before the next attempt.
                        if let Err(e) = client.presence_update(recipient).await {
                            warn!(session = %session_id, error = %e, "presence nudge failed");
                        }
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        session = %session_id,
                        recipient,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "send failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn persist_outbound(
        &self,
        session_id: &SessionId,
        recipient: &str,
        text: &str,
        receipt: &SendReceipt,
    ) {
        let record = MessageRecord {
            id: receipt.message_id.0.clone(),
            session_id: session_id.0.clone(),
            remote_id: recipient.to_string(),
            from_me: true,
            kind: "new".to_string(),
            content: Some(text.to_string()),
            created_at: now_iso(),
        };
        if let Err(e) = self.storage.append_message(&record).await {
            // The message is already on the wire; the log entry is secondary.
            warn!(session = %session_id, error = %e, "failed to persist outbound record");
        }
    }
}
