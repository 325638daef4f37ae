// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incident service collaborator. Incident storage is external; the
//! conversation engine creates, links attachments to, and closes incidents
//! through this seam but never owns them.

use async_trait::async_trait;

use crate::error::ProplinkError;
use crate::types::{AttachmentKind, CreatedIncident, IncidentSummary, NewIncident};

#[async_trait]
pub trait IncidentService: Send + Sync {
    /// Creates an incident and returns its id and reference number.
    async fn create(&self, incident: NewIncident) -> Result<CreatedIncident, ProplinkError>;

    /// Lists this sender's open incidents.
    async fn list_open_by_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<IncidentSummary>, ProplinkError>;

    /// Closes an incident on behalf of the given sender.
    async fn close(&self, incident_id: &str, phone: &str) -> Result<(), ProplinkError>;

    /// Attaches an uploaded file to an existing incident.
    async fn add_attachment(
        &self,
        incident_id: &str,
        url: &str,
        file_name: &str,
        kind: AttachmentKind,
    ) -> Result<(), ProplinkError>;
}
