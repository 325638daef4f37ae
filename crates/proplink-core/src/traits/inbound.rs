// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam between the inbound intake and the conversation engine.

use async_trait::async_trait;

use crate::error::ProplinkError;
use crate::types::{RawInbound, SessionId};

/// Handles one filtered inbound user message and optionally produces a reply
/// to send back to the message's remote id.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(
        &self,
        session_id: &SessionId,
        message: &RawInbound,
    ) -> Result<Option<String>, ProplinkError>;
}
