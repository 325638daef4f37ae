// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport reliability layer for the Proplink conversation engine.
//!
//! Owns the session lifecycle (pairing, reconnect-with-backoff, logout), the
//! outbound delivery service with its bounded retry policy, and the inbound
//! intake that filters raw transport frames before they reach the
//! conversation engine.

pub mod delivery;
pub mod intake;
pub mod qr;
pub mod registry;
pub mod retry;

pub use delivery::DeliveryService;
pub use intake::{IntakePump, should_process};
pub use registry::{SessionHandle, SessionRegistry};
pub use retry::RetryPolicy;
