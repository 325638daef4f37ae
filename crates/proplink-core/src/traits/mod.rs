// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the conversation engine, the transport layer, and the
//! external collaborators it consumes.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod classifier;
pub mod incidents;
pub mod inbound;
pub mod otp;
pub mod storage;
pub mod tenancy;
pub mod transport;

pub use adapter::Adapter;
pub use classifier::IntentClassifier;
pub use inbound::InboundHandler;
pub use incidents::IncidentService;
pub use otp::OtpService;
pub use storage::Storage;
pub use tenancy::{PropertyCodes, TenantDirectory};
pub use transport::{TransportClient, TransportFactory};
