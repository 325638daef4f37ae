// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Proplink tenant incident-reporting engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Proplink workspace: the transport and
//! storage seams, and the interfaces of the external collaborators the
//! conversation engine consumes (tenant lookup, property codes, OTP,
//! incidents, intent classification).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ProplinkError;
pub use types::{ConnectionStatus, HealthStatus, MessageId, SessionId};

// Re-export all trait seams at crate root.
pub use traits::{
    Adapter, InboundHandler, IncidentService, IntentClassifier, OtpService, PropertyCodes,
    Storage, TenantDirectory, TransportClient, TransportFactory,
};
