// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory fakes for the external collaborators.
//!
//! Each fake stores its fixtures behind a mutex so tests can seed and inspect
//! them through shared `Arc`s while the engine holds trait objects.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use proplink_core::types::{
    AttachmentKind, CreatedIncident, IncidentStatus, IncidentSummary, IntentClassification,
    MessageIntent, NewIncident, OtpVerification, PropertyRef, SuggestedAction, TenantRecord,
    reference_number,
};
use proplink_core::{
    IncidentService, IntentClassifier, OtpService, PropertyCodes, ProplinkError, TenantDirectory,
};

/// Tenant directory backed by a phone-keyed map.
#[derive(Default)]
pub struct FakeTenantDirectory {
    tenants: Mutex<HashMap<String, TenantRecord>>,
}

impl FakeTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, phone: &str, tenant: TenantRecord) {
        self.tenants.lock().await.insert(phone.to_string(), tenant);
    }
}

#[async_trait]
impl TenantDirectory for FakeTenantDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<TenantRecord>, ProplinkError> {
        Ok(self.tenants.lock().await.get(phone).cloned())
    }
}

/// Property-code validator backed by a code-keyed map.
#[derive(Default)]
pub struct FakePropertyCodes {
    codes: Mutex<HashMap<String, PropertyRef>>,
}

impl FakePropertyCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, code: &str, property: PropertyRef) {
        self.codes.lock().await.insert(code.to_string(), property);
    }
}

#[async_trait]
impl PropertyCodes for FakePropertyCodes {
    async fn validate_code(&self, code: &str) -> Result<Option<PropertyRef>, ProplinkError> {
        Ok(self.codes.lock().await.get(code).cloned())
    }
}

/// OTP service with a fixed accepted code per phone number.
#[derive(Default)]
pub struct FakeOtpService {
    expected: Mutex<HashMap<String, (String, OtpVerification)>>,
    issued: Mutex<Vec<(String, String)>>,
}

impl FakeOtpService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the code that `verify` will accept for this phone, and the
    /// identity it resolves to.
    pub async fn expect_code(&self, phone: &str, code: &str, identity: OtpVerification) {
        self.expected
            .lock()
            .await
            .insert(phone.to_string(), (code.to_string(), identity));
    }

    /// All `(phone, email)` pairs passed to `issue`.
    pub async fn issued(&self) -> Vec<(String, String)> {
        self.issued.lock().await.clone()
    }
}

#[async_trait]
impl OtpService for FakeOtpService {
    async fn issue(&self, phone: &str, email: &str) -> Result<(), ProplinkError> {
        self.issued
            .lock()
            .await
            .push((phone.to_string(), email.to_string()));
        Ok(())
    }

    async fn verify(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Option<OtpVerification>, ProplinkError> {
        let expected = self.expected.lock().await;
        match expected.get(phone) {
            Some((accepted, identity)) if accepted == code => Ok(Some(identity.clone())),
            _ => Ok(None),
        }
    }
}

/// Incident service keeping incidents in memory.
#[derive(Default)]
pub struct FakeIncidentService {
    incidents: Mutex<Vec<IncidentSummary>>,
    attachments: Mutex<Vec<(String, String)>>,
    fail_create: AtomicBool,
}

impl FakeIncidentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing incident.
    pub async fn insert(&self, incident: IncidentSummary) {
        self.incidents.lock().await.push(incident);
    }

    /// Make the next and all following `create` calls fail.
    pub fn set_create_failing(&self, failing: bool) {
        self.fail_create.store(failing, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<IncidentSummary> {
        self.incidents.lock().await.clone()
    }

    /// All `(incident_id, url)` pairs received, whether on `create` or
    /// through `add_attachment`.
    pub async fn attachments(&self) -> Vec<(String, String)> {
        self.attachments.lock().await.clone()
    }
}

#[async_trait]
impl IncidentService for FakeIncidentService {
    async fn create(&self, incident: NewIncident) -> Result<CreatedIncident, ProplinkError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProplinkError::ExternalService {
                service: "incidents".into(),
                source: "create unavailable".into(),
            });
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.incidents.lock().await.push(IncidentSummary {
            id: id.clone(),
            title: incident.description.chars().take(40).collect(),
            description: incident.description.clone(),
            reported_at: chrono::Utc::now().to_rfc3339(),
            status: IncidentStatus::Open,
            property_id: incident.property_id.clone(),
            tenant_id: incident.tenant_id.clone(),
        });
        let mut attachments = self.attachments.lock().await;
        for attachment in &incident.attachments {
            attachments.push((id.clone(), attachment.url.clone()));
        }
        drop(attachments);
        let reference = reference_number(&id);
        Ok(CreatedIncident {
            incident_id: id,
            reference_number: reference,
        })
    }

    async fn list_open_by_phone(
        &self,
        _phone: &str,
    ) -> Result<Vec<IncidentSummary>, ProplinkError> {
        Ok(self
            .incidents
            .lock()
            .await
            .iter()
            .filter(|i| i.status == IncidentStatus::Open)
            .cloned()
            .collect())
    }

    async fn close(&self, incident_id: &str, _phone: &str) -> Result<(), ProplinkError> {
        let mut incidents = self.incidents.lock().await;
        match incidents.iter_mut().find(|i| i.id == incident_id) {
            Some(incident) => {
                incident.status = IncidentStatus::Closed;
                Ok(())
            }
            None => Err(ProplinkError::Validation(format!(
                "unknown incident {incident_id}"
            ))),
        }
    }

    async fn add_attachment(
        &self,
        incident_id: &str,
        url: &str,
        _file_name: &str,
        _kind: AttachmentKind,
    ) -> Result<(), ProplinkError> {
        self.attachments
            .lock()
            .await
            .push((incident_id.to_string(), url.to_string()));
        Ok(())
    }
}

/// Classifier returning scripted results in order.
///
/// When the script runs out it returns `Unclear` at zero confidence, which
/// in the engine always degrades to explicit confirmation.
#[derive(Default)]
pub struct FakeClassifier {
    script: Mutex<VecDeque<Result<IntentClassification, ProplinkError>>>,
}

impl FakeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, result: Result<IntentClassification, ProplinkError>) {
        self.script.lock().await.push_back(result);
    }
}

#[async_trait]
impl IntentClassifier for FakeClassifier {
    async fn classify(
        &self,
        _message: &str,
        _existing: &[IncidentSummary],
    ) -> Result<IntentClassification, ProplinkError> {
        match self.script.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(IntentClassification {
                intent: MessageIntent::Unclear,
                suggested_action: SuggestedAction::AskClarification,
                confidence: 0.0,
            }),
        }
    }
}
