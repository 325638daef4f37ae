// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound intake: filter raw transport frames, persist survivors, hand them
//! to the conversation engine, and send its reply back out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use proplink_core::types::{DeliveryKind, MessageRecord, RawInbound};
use proplink_core::{InboundHandler, ProplinkError, SessionId, Storage};

use crate::delivery::DeliveryService;
use crate::registry::now_iso;

/// Whether a raw inbound frame should reach the conversation engine.
///
/// Drops echoes of this account's own messages, history-sync replays, and
/// receipt/protocol frames without user content.
#[must_use]
pub fn should_process(message: &RawInbound) -> bool {
    if message.from_me {
        return false;
    }
    if message.kind != DeliveryKind::New {
        return false;
    }
    let has_text = message.text.as_deref().is_some_and(|t| !t.trim().is_empty());
    has_text || !message.attachments.is_empty()
}

/// Consumes the registry's inbound queue: filters, persists, dispatches to
/// the handler, and sends replies through the delivery service.
pub struct IntakePump {
    storage: Arc<dyn Storage>,
    handler: Arc<dyn InboundHandler>,
    delivery: Arc<DeliveryService>,
}

impl IntakePump {
    pub fn new(
        storage: Arc<dyn Storage>,
        handler: Arc<dyn InboundHandler>,
        delivery: Arc<DeliveryService>,
    ) -> Self {
        Self {
            storage,
            handler,
            delivery,
        }
    }

    /// Run until the inbound channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<(SessionId, RawInbound)>) {
        while let Some((session_id, message)) = rx.recv().await {
            if !should_process(&message) {
                debug!(
                    session = %session_id,
                    kind = %message.kind,
                    from_me = message.from_me,
                    "dropping inbound frame"
                );
                continue;
            }
            if let Err(e) = self.process(&session_id, &message).await {
                error!(session = %session_id, error = %e, "inbound processing failed");
            }
        }
    }

    async fn process(
        &self,
        session_id: &SessionId,
        message: &RawInbound,
    ) -> Result<(), ProplinkError> {
        let record = MessageRecord {
            id: message.message_id.clone(),
            session_id: session_id.0.clone(),
            remote_id: message.remote_id.clone(),
            from_me: false,
            kind: message.kind.to_string(),
            content: message.text.clone(),
            created_at: now_iso(),
        };
        if let Err(e) = self.storage.append_message(&record).await {
            // Duplicate delivery of the same transport id lands here too.
            warn!(session = %session_id, error = %e, "failed to persist inbound record");
        }

        if let Some(reply) = self.handler.handle(session_id, message).await? {
            self.delivery
                .send_message(session_id, &message.remote_id, &reply)
                .await?;
        }
        Ok(())
    }
}
