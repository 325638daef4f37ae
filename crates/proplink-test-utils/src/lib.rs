// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Proplink integration tests.
//!
//! Provides a scriptable mock transport client, in-memory fakes for the
//! external collaborators (tenant directory, property codes, OTP, incidents,
//! classifier), and a temp-SQLite storage helper.

pub mod fakes;
pub mod mock_transport;
pub mod storage;

pub use fakes::{
    FakeClassifier, FakeIncidentService, FakeOtpService, FakePropertyCodes, FakeTenantDirectory,
};
pub use mock_transport::{MockTransportClient, MockTransportFactory};
pub use storage::temp_storage;
