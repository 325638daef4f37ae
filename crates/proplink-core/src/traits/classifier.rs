// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative-AI intent classifier collaborator.
//!
//! The classifier is consulted only as a signal. State-mutating actions
//! (create, attach, close) always go through explicit confirmation when
//! ambiguity exists, and a classifier failure degrades to "ask for explicit
//! confirmation" rather than blocking the conversation.

use async_trait::async_trait;

use crate::error::ProplinkError;
use crate::types::{IncidentSummary, IntentClassification};

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classifies an inbound message against the sender's existing incidents.
    async fn classify(
        &self,
        message: &str,
        existing: &[IncidentSummary],
    ) -> Result<IntentClassification, ProplinkError>;
}
