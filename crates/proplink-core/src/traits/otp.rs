// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time-passcode verification collaborator.

use async_trait::async_trait;

use crate::error::ProplinkError;
use crate::types::OtpVerification;

/// Issues and verifies email-delivered one-time passcodes. Code generation
/// and delivery mechanics live entirely behind this seam.
#[async_trait]
pub trait OtpService: Send + Sync {
    /// Issues a code to the given email for the given phone number.
    async fn issue(&self, phone: &str, email: &str) -> Result<(), ProplinkError>;

    /// Verifies a submitted code. Returns the resolved identity on success,
    /// `None` on an incorrect or expired code.
    async fn verify(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Option<OtpVerification>, ProplinkError>;
}
