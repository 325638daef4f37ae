// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-sender conversation state machine for tenant incident reporting.
//!
//! Drives a multi-turn dialogue that identifies an unknown phone number
//! (tenant lookup, property code, or email OTP), collects an incident
//! description and optional photos, and manages follow-ups and closure of
//! incidents held by the external incident service.

pub mod engine;
pub mod parse;
pub mod replies;
pub mod state;

pub use engine::{ConversationEngine, EngineDeps, TurnOutcome};
pub use state::ConversationState;
