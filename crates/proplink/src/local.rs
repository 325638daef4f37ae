// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local collaborator implementations for the console run loop.
//!
//! Real deployments implement the collaborator traits against their upstream
//! systems. For `proplink run` these stand-ins keep everything in process: a
//! TOML-seeded tenant/property directory, an OTP service that logs the code
//! instead of emailing it, an in-memory incident store, and a keyword
//! classifier that never reports enough confidence to skip confirmation.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use proplink_core::types::{
    AttachmentKind, CreatedIncident, IncidentStatus, IncidentSummary, IntentClassification,
    MessageIntent, NewIncident, OtpVerification, PropertyRef, SuggestedAction, TenantRecord,
    reference_number,
};
use proplink_core::{
    IncidentService, IntentClassifier, OtpService, PropertyCodes, ProplinkError, TenantDirectory,
};

#[derive(Debug, Deserialize)]
struct TenantEntry {
    phone: String,
    id: String,
    name: String,
    email: Option<String>,
    property_id: String,
    property_name: String,
}

#[derive(Debug, Deserialize)]
struct CodeEntry {
    code: String,
    property_id: String,
    property_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    tenants: Vec<TenantEntry>,
    #[serde(default)]
    codes: Vec<CodeEntry>,
}

/// Tenant and property-code directory seeded from a TOML file.
pub struct LocalDirectory {
    tenants: HashMap<String, TenantRecord>,
    emails: HashMap<String, TenantRecord>,
    codes: HashMap<String, PropertyRef>,
}

impl LocalDirectory {
    pub fn empty() -> Self {
        Self {
            tenants: HashMap::new(),
            emails: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ProplinkError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProplinkError::Config(format!("cannot read directory file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, ProplinkError> {
        let file: DirectoryFile = toml::from_str(content)
            .map_err(|e| ProplinkError::Config(format!("invalid directory file: {e}")))?;
        let mut directory = Self::empty();
        for entry in file.tenants {
            let record = TenantRecord {
                id: entry.id,
                property_id: entry.property_id,
                property_name: entry.property_name,
                name: entry.name,
            };
            if let Some(email) = entry.email {
                directory.emails.insert(email.to_lowercase(), record.clone());
            }
            directory.tenants.insert(entry.phone, record);
        }
        for entry in file.codes {
            directory.codes.insert(
                entry.code.to_uppercase(),
                PropertyRef {
                    property_id: entry.property_id,
                    property_name: entry.property_name,
                },
            );
        }
        Ok(directory)
    }

    fn tenant_by_email(&self, email: &str) -> Option<&TenantRecord> {
        self.emails.get(&email.to_lowercase())
    }
}

#[async_trait]
impl TenantDirectory for LocalDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<TenantRecord>, ProplinkError> {
        Ok(self.tenants.get(phone).cloned())
    }
}

#[async_trait]
impl PropertyCodes for LocalDirectory {
    async fn validate_code(&self, code: &str) -> Result<Option<PropertyRef>, ProplinkError> {
        Ok(self.codes.get(&code.to_uppercase()).cloned())
    }
}

struct PendingOtp {
    code: String,
    identity: OtpVerification,
    expires_at: Instant,
}

/// OTP service that prints the code to the operator log instead of sending
/// an email. Codes expire after the configured TTL.
pub struct LocalOtpService {
    directory: std::sync::Arc<LocalDirectory>,
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingOtp>>,
}

impl LocalOtpService {
    pub fn new(directory: std::sync::Arc<LocalDirectory>, ttl: Duration) -> Self {
        Self {
            directory,
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OtpService for LocalOtpService {
    async fn issue(&self, phone: &str, email: &str) -> Result<(), ProplinkError> {
        let Some(tenant) = self.directory.tenant_by_email(email) else {
            // Do not reveal whether the email is known; the code simply
            // never verifies.
            warn!(phone, email, "otp requested for unknown email");
            return Ok(());
        };
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        info!(phone, email, code, "otp issued (console mode, not emailed)");
        self.pending.lock().await.insert(
            phone.to_string(),
            PendingOtp {
                code,
                identity: OtpVerification {
                    tenant_id: tenant.id.clone(),
                    property_id: tenant.property_id.clone(),
                    property_name: tenant.property_name.clone(),
                    tenant_name: tenant.name.clone(),
                },
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn verify(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Option<OtpVerification>, ProplinkError> {
        let mut pending = self.pending.lock().await;
        let Some(entry) = pending.get(phone) else {
            return Ok(None);
        };
        if entry.expires_at < Instant::now() {
            pending.remove(phone);
            return Ok(None);
        }
        if entry.code != code {
            return Ok(None);
        }
        let entry = pending.remove(phone);
        Ok(entry.map(|e| e.identity))
    }
}

/// In-memory incident store for the console run loop. Incidents do not
/// survive a restart.
#[derive(Default)]
pub struct LocalIncidentService {
    incidents: Mutex<Vec<(String, IncidentSummary)>>,
}

impl LocalIncidentService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentService for LocalIncidentService {
    async fn create(&self, incident: NewIncident) -> Result<CreatedIncident, ProplinkError> {
        let id = uuid::Uuid::new_v4().to_string();
        let reference = reference_number(&id);
        info!(
            incident = %id,
            reference = %reference,
            property = %incident.property_id,
            "incident created (console mode, in-memory)"
        );
        self.incidents.lock().await.push((
            incident.phone.clone(),
            IncidentSummary {
                id: id.clone(),
                title: incident.description.chars().take(40).collect(),
                description: incident.description,
                reported_at: chrono::Utc::now().to_rfc3339(),
                status: IncidentStatus::Open,
                property_id: incident.property_id,
                tenant_id: incident.tenant_id,
            },
        ));
        Ok(CreatedIncident {
            incident_id: id,
            reference_number: reference,
        })
    }

    async fn list_open_by_phone(&self, phone: &str) -> Result<Vec<IncidentSummary>, ProplinkError> {
        Ok(self
            .incidents
            .lock()
            .await
            .iter()
            .filter(|(p, i)| p == phone && i.status == IncidentStatus::Open)
            .map(|(_, i)| i.clone())
            .collect())
    }

    async fn close(&self, incident_id: &str, _phone: &str) -> Result<(), ProplinkError> {
        let mut incidents = self.incidents.lock().await;
        match incidents.iter_mut().find(|(_, i)| i.id == incident_id) {
            Some((_, incident)) => {
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
        info!(incident = %incident_id, url, "attachment noted (console mode)");
        Ok(())
    }
}

/// Keyword classifier for the console run loop.
///
/// Reports at most 0.6 confidence, below the default threshold, so the
/// engine always routes through explicit confirmation.
pub struct HeuristicClassifier;

#[async_trait]
impl IntentClassifier for HeuristicClassifier {
    async fn classify(
        &self,
        message: &str,
        existing: &[IncidentSummary],
    ) -> Result<IntentClassification, ProplinkError> {
        let lower = message.to_lowercase();
        let follow_up_hint = ["update", "still", "same", "again", "progress", "status"]
            .iter()
            .any(|kw| lower.contains(kw));
        if follow_up_hint && !existing.is_empty() {
            return Ok(IntentClassification {
                intent: MessageIntent::FollowUp,
                suggested_action: SuggestedAction::AttachToExisting,
                confidence: 0.6,
            });
        }
        if proplink_conversation::parse::looks_like_incident_report(message) {
            return Ok(IntentClassification {
                intent: MessageIntent::NewIncident,
                suggested_action: SuggestedAction::CreateNew,
                confidence: 0.6,
            });
        }
        Ok(IntentClassification {
            intent: MessageIntent::Unclear,
            suggested_action: SuggestedAction::AskClarification,
            confidence: 0.3,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const DIRECTORY_TOML: &str = r#"
        [[tenants]]
        phone = "27821234567"
        id = "t-1"
        name = "Sam"
        email = "sam@example.com"
        property_id = "prop-1"
        property_name = "Oak Court"

        [[codes]]
        code = "PROP-ABC123"
        property_id = "prop-1"
        property_name = "Oak Court"
    "#;

    #[tokio::test]
    async fn directory_resolves_phones_and_codes() {
        let directory = LocalDirectory::from_toml(DIRECTORY_TOML).unwrap();
        let tenant = directory.find_by_phone("27821234567").await.unwrap().unwrap();
        assert_eq!(tenant.property_name, "Oak Court");
        assert!(directory.find_by_phone("27829999999").await.unwrap().is_none());

        // Codes match case-insensitively.
        let property = directory.validate_code("prop-abc123").await.unwrap().unwrap();
        assert_eq!(property.property_id, "prop-1");
    }

    #[tokio::test]
    async fn otp_round_trip_resolves_identity() {
        let directory = Arc::new(LocalDirectory::from_toml(DIRECTORY_TOML).unwrap());
        let otp = LocalOtpService::new(directory, Duration::from_secs(600));

        otp.issue("27821234567", "sam@example.com").await.unwrap();
        let code = {
            let pending = otp.pending.lock().await;
            pending.get("27821234567").unwrap().code.clone()
        };
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert!(otp.verify("27821234567", wrong).await.unwrap().is_none());
        let identity = otp.verify("27821234567", &code).await.unwrap().unwrap();
        assert_eq!(identity.tenant_id, "t-1");

        // One-shot: a second verify with the same code fails.
        assert!(otp.verify("27821234567", &code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn otp_for_unknown_email_never_verifies() {
        let directory = Arc::new(LocalDirectory::from_toml(DIRECTORY_TOML).unwrap());
        let otp = LocalOtpService::new(directory, Duration::from_secs(600));
        otp.issue("27821234567", "stranger@example.com").await.unwrap();
        assert!(otp.verify("27821234567", "123456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incidents_are_scoped_by_phone() {
        let service = LocalIncidentService::new();
        service
            .create(NewIncident {
                property_id: "prop-1".into(),
                tenant_id: None,
                description: "burst geyser in unit 4".into(),
                phone: "27821234567".into(),
                attachments: vec![],
            })
            .await
            .unwrap();

        assert_eq!(service.list_open_by_phone("27821234567").await.unwrap().len(), 1);
        assert!(service.list_open_by_phone("27829999999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn heuristic_classifier_stays_below_trust_threshold() {
        let classifier = HeuristicClassifier;
        let result = classifier
            .classify("the geyser burst in the ceiling", &[])
            .await
            .unwrap();
        assert_eq!(result.intent, MessageIntent::NewIncident);
        assert!(result.confidence < 0.7);
    }
}
