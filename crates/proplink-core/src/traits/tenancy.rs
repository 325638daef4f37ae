// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant lookup and property-code validation collaborators.

use async_trait::async_trait;

use crate::error::ProplinkError;
use crate::types::{PropertyRef, TenantRecord};

/// Looks up known tenants by normalized phone number.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Returns the tenant registered under this phone number, if any.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<TenantRecord>, ProplinkError>;
}

/// Validates human-entered property codes.
#[async_trait]
pub trait PropertyCodes: Send + Sync {
    /// Resolves a property code to a property, or `None` when invalid.
    async fn validate_code(&self, code: &str) -> Result<Option<PropertyRef>, ProplinkError>;
}
