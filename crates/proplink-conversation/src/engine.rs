// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation engine: loads a sender's state, dispatches to the
//! handler for it, and persists the new state and context atomically.
//!
//! Turns for one sender are fully serialized: the per-phone lock makes a
//! handler complete its load-decide-persist cycle before the next message
//! from that sender is processed.
//!
//! The intent classifier is consulted as a signal only. State-mutating
//! actions (create, attach, close) always go through an explicit
//! confirmation round-trip when ambiguity exists, whatever confidence the
//! classifier reports.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use proplink_config::model::{ClassifierConfig, EngineConfig};
use proplink_core::types::{
    Attachment, IncidentSummary, MessageIntent, NewIncident, RawInbound, StoredConversation,
    reference_number,
};
use proplink_core::{
    InboundHandler, IncidentService, IntentClassifier, OtpService, PropertyCodes, ProplinkError,
    SessionId, Storage, TenantDirectory,
};

use crate::parse;
use crate::replies;
use crate::state::{ConversationState, ResolvedProperty};

/// What one processed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub incident_created: bool,
    pub incident_id: Option<String>,
    pub reference_number: Option<String>,
}

fn outcome(reply: String) -> TurnOutcome {
    TurnOutcome {
        reply,
        incident_created: false,
        incident_id: None,
        reference_number: None,
    }
}

fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Short preview of a message for confirmation prompts.
fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 60 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(57).collect();
        format!("{cut}...")
    }
}

/// External collaborators and the storage backend the engine works against.
pub struct EngineDeps {
    pub storage: Arc<dyn Storage>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub codes: Arc<dyn PropertyCodes>,
    pub otp: Arc<dyn OtpService>,
    pub incidents: Arc<dyn IncidentService>,
    pub classifier: Arc<dyn IntentClassifier>,
}

/// Per-sender multi-turn conversation state machine.
pub struct ConversationEngine {
    deps: EngineDeps,
    engine_cfg: EngineConfig,
    classifier_cfg: ClassifierConfig,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn new(deps: EngineDeps, engine_cfg: EngineConfig, classifier_cfg: ClassifierConfig) -> Self {
        Self {
            deps,
            engine_cfg,
            classifier_cfg,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one inbound user message. The single entry point.
    pub async fn process_message(
        &self,
        phone_raw: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<TurnOutcome, ProplinkError> {
        let phone = parse::normalize_phone(phone_raw, &self.engine_cfg.country_code);
        let lock = self.turn_lock(&phone).await;
        let (now_idle, turn) = {
            let _turn = lock.lock().await;
            self.run_turn(&phone, text, attachments).await
        }?;
        if now_idle {
            self.prune_turn_lock(&phone, &lock).await;
        }
        Ok(turn)
    }

    /// One load-decide-persist cycle under the sender's turn lock. Returns
    /// whether the sender ended up Idle.
    async fn run_turn(
        &self,
        phone: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(bool, TurnOutcome), ProplinkError> {
        let state = self.load_state(phone).await?;
        let text = text.trim();
        debug!(phone = %phone, state = state.tag(), "processing turn");

        if parse::is_help(text) {
            let idle = matches!(state, ConversationState::Idle);
            return Ok((idle, outcome(replies::help_for(&state))));
        }
        if parse::is_cancel(text) && !matches!(state, ConversationState::Idle) {
            self.persist(phone, &ConversationState::Idle).await?;
            return Ok((true, outcome(replies::cancelled())));
        }

        match self.dispatch(phone, text, &attachments, state).await {
            Ok((new_state, turn)) => {
                self.persist(phone, &new_state).await?;
                let idle = matches!(new_state, ConversationState::Idle);
                Ok((idle, turn))
            }
            Err(e) => {
                error!(phone = %phone, error = %e, "turn handler failed, resetting sender");
                if let Err(pe) = self.persist(phone, &ConversationState::Idle).await {
                    warn!(phone = %phone, error = %pe, "failed to persist reset state");
                }
                Ok((true, outcome(replies::technical_difficulties())))
            }
        }
    }

    async fn dispatch(
        &self,
        phone: &str,
        text: &str,
        attachments: &[Attachment],
        state: ConversationState,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        match state {
            ConversationState::Idle => self.on_idle(phone, text, attachments).await,
            ConversationState::AwaitingEmail {
                pending_description,
                pending_attachments,
            } => {
                self.on_awaiting_email(phone, text, pending_description, pending_attachments)
                    .await
            }
            ConversationState::AwaitingOtp {
                email,
                pending_description,
                pending_attachments,
            } => {
                self.on_awaiting_otp(phone, text, email, pending_description, pending_attachments)
                    .await
            }
            ConversationState::AwaitingProperty {
                pending_description,
                pending_attachments,
            } => {
                self.on_awaiting_property(phone, text, pending_description, pending_attachments)
                    .await
            }
            ConversationState::AwaitingDescription { property } => {
                self.on_awaiting_description(phone, text, attachments, property)
                    .await
            }
            ConversationState::AwaitingPhotos {
                property,
                description,
            } => {
                self.on_awaiting_photos(phone, text, attachments, property, description)
                    .await
            }
            ConversationState::IncidentActive { incident_id } => {
                self.on_incident_active(phone, text, attachments, incident_id)
                    .await
            }
            ConversationState::AwaitingClosureConfirmation { incident_id } => {
                self.on_closure_confirmation(phone, text, incident_id).await
            }
            ConversationState::AwaitingIncidentSelection { candidates } => {
                self.on_incident_selection(text, candidates).await
            }
            ConversationState::AwaitingNewIncidentConfirmation {
                pending_text,
                property,
            } => {
                self.on_new_incident_confirmation(phone, text, pending_text, property)
                    .await
            }
            ConversationState::AwaitingFollowUpConfirmation {
                incident_id,
                pending_text,
            } => {
                self.on_follow_up_confirmation(text, incident_id, pending_text)
                    .await
            }
            ConversationState::AwaitingUpdateOrClosure { incident_id } => {
                self.on_update_or_closure(phone, text, incident_id).await
            }
        }
    }

    // --- idle ---

    async fn on_idle(
        &self,
        phone: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let open = match self.deps.incidents.list_open_by_phone(phone).await {
            Ok(open) => open,
            Err(e) => {
                warn!(phone = %phone, error = %e, "open-incident lookup failed, treating as none");
                Vec::new()
            }
        };
        if !open.is_empty() {
            return Ok(self.route_with_classifier_idle(text, &open).await);
        }

        if !parse::looks_like_incident_report(text) && attachments.is_empty() {
            return Ok((ConversationState::Idle, outcome(replies::onboarding())));
        }

        // Identification ladder: phone lookup, embedded property code, OTP.
        let tenant = match self.deps.tenants.find_by_phone(phone).await {
            Ok(tenant) => tenant,
            Err(e) => {
                warn!(phone = %phone, error = %e, "tenant lookup failed, continuing unidentified");
                None
            }
        };
        if let Some(tenant) = tenant {
            let property = ResolvedProperty {
                property_id: tenant.property_id,
                property_name: tenant.property_name,
                tenant_id: Some(tenant.id),
            };
            let description = parse::strip_property_code(text);
            return self
                .route_to_creation(phone, Some(property), description, attachments.to_vec())
                .await;
        }

        if let Some(code) = parse::extract_property_code(text) {
            match self.deps.codes.validate_code(&code).await {
                Ok(Some(property)) => {
                    let property = ResolvedProperty::from_ref(property);
                    let description = parse::strip_property_code(text);
                    return self
                        .route_to_creation(phone, Some(property), description, attachments.to_vec())
                        .await;
                }
                Ok(None) => {
                    let pending = self.pending_description(text);
                    let reply = format!(
                        "{} {}",
                        replies::invalid_property_code(&code),
                        replies::ask_email()
                    );
                    return Ok((
                        ConversationState::AwaitingEmail {
                            pending_description: pending,
                            pending_attachments: attachments.to_vec(),
                        },
                        outcome(reply),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "property code validation failed");
                    return Ok((ConversationState::Idle, outcome(replies::code_validation_failed())));
                }
            }
        }

        let pending = self.pending_description(text);
        Ok((
            ConversationState::AwaitingEmail {
                pending_description: pending,
                pending_attachments: attachments.to_vec(),
            },
            outcome(replies::ask_email()),
        ))
    }

    /// Idle routing against open incidents. The classifier's intent picks the
    /// confirmation state; it never picks an action directly.
    async fn route_with_classifier_idle(
        &self,
        text: &str,
        open: &[IncidentSummary],
    ) -> (ConversationState, TurnOutcome) {
        let classification = self.deps.classifier.classify(text, open).await;
        match classification {
            Ok(c) if c.intent == MessageIntent::NewIncident => (
                ConversationState::AwaitingNewIncidentConfirmation {
                    pending_text: text.to_string(),
                    property: None,
                },
                outcome(replies::confirm_new_incident(&preview(text))),
            ),
            other => {
                if let Err(e) = &other {
                    warn!(error = %e, "classifier failed, degrading to explicit confirmation");
                }
                self.confirm_against_open(text, open)
            }
        }
    }

    /// The safe fallback: selection across many open incidents, or follow-up
    /// confirmation against the single one.
    fn confirm_against_open(
        &self,
        text: &str,
        open: &[IncidentSummary],
    ) -> (ConversationState, TurnOutcome) {
        if open.len() > 1 {
            (
                ConversationState::AwaitingIncidentSelection {
                    candidates: open.iter().map(|i| i.id.clone()).collect(),
                },
                outcome(replies::list_incidents(open)),
            )
        } else {
            let incident = &open[0];
            (
                ConversationState::AwaitingFollowUpConfirmation {
                    incident_id: incident.id.clone(),
                    pending_text: text.to_string(),
                },
                outcome(replies::confirm_follow_up(&reference_number(&incident.id))),
            )
        }
    }

    // --- identification ---

    async fn on_awaiting_email(
        &self,
        phone: &str,
        text: &str,
        pending_description: Option<String>,
        pending_attachments: Vec<Attachment>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        // A property code typed here short-circuits identification.
        if let Some(code) = parse::extract_property_code(text) {
            match self.deps.codes.validate_code(&code).await {
                Ok(Some(property)) => {
                    let property = ResolvedProperty::from_ref(property);
                    return self
                        .continue_with_property(phone, property, pending_description, pending_attachments)
                        .await;
                }
                Ok(None) => {
                    return Ok((
                        ConversationState::AwaitingEmail {
                            pending_description,
                            pending_attachments,
                        },
                        outcome(replies::invalid_property_code(&code)),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "property code validation failed");
                    return Ok((
                        ConversationState::AwaitingEmail {
                            pending_description,
                            pending_attachments,
                        },
                        outcome(replies::code_validation_failed()),
                    ));
                }
            }
        }

        if !parse::is_email(text) {
            return Ok((
                ConversationState::AwaitingEmail {
                    pending_description,
                    pending_attachments,
                },
                outcome(replies::invalid_email()),
            ));
        }

        let email = text.trim().to_string();
        match self.deps.otp.issue(phone, &email).await {
            Ok(()) => Ok((
                ConversationState::AwaitingOtp {
                    email: email.clone(),
                    pending_description,
                    pending_attachments,
                },
                outcome(replies::otp_sent(&email)),
            )),
            Err(e) => {
                warn!(phone = %phone, error = %e, "otp issuance failed");
                Ok((
                    ConversationState::AwaitingEmail {
                        pending_description,
                        pending_attachments,
                    },
                    outcome(replies::otp_issue_failed()),
                ))
            }
        }
    }

    async fn on_awaiting_otp(
        &self,
        phone: &str,
        text: &str,
        email: String,
        pending_description: Option<String>,
        pending_attachments: Vec<Attachment>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        if !parse::is_otp_code(text) {
            return Ok((
                ConversationState::AwaitingOtp {
                    email,
                    pending_description,
                    pending_attachments,
                },
                outcome(replies::ask_otp()),
            ));
        }
        match self.deps.otp.verify(phone, text.trim()).await {
            Ok(Some(identity)) => {
                let property = ResolvedProperty {
                    property_id: identity.property_id,
                    property_name: identity.property_name,
                    tenant_id: Some(identity.tenant_id),
                };
                self.continue_with_property(phone, property, pending_description, pending_attachments)
                    .await
            }
            Ok(None) => Ok((
                ConversationState::AwaitingOtp {
                    email,
                    pending_description,
                    pending_attachments,
                },
                outcome(replies::otp_incorrect()),
            )),
            Err(e) => {
                warn!(phone = %phone, error = %e, "otp verification errored");
                Ok((
                    ConversationState::AwaitingOtp {
                        email,
                        pending_description,
                        pending_attachments,
                    },
                    outcome(replies::otp_verify_failed()),
                ))
            }
        }
    }

    async fn on_awaiting_property(
        &self,
        phone: &str,
        text: &str,
        pending_description: Option<String>,
        pending_attachments: Vec<Attachment>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let Some(code) = parse::extract_property_code(text) else {
            return Ok((
                ConversationState::AwaitingProperty {
                    pending_description,
                    pending_attachments,
                },
                outcome(replies::ask_property()),
            ));
        };
        match self.deps.codes.validate_code(&code).await {
            Ok(Some(property)) => {
                let property = ResolvedProperty::from_ref(property);
                self.continue_with_property(phone, property, pending_description, pending_attachments)
                    .await
            }
            Ok(None) => Ok((
                ConversationState::AwaitingProperty {
                    pending_description,
                    pending_attachments,
                },
                outcome(replies::invalid_property_code(&code)),
            )),
            Err(e) => {
                warn!(error = %e, "property code validation failed");
                Ok((
                    ConversationState::AwaitingProperty {
                        pending_description,
                        pending_attachments,
                    },
                    outcome(replies::code_validation_failed()),
                ))
            }
        }
    }

    /// After identification: create right away when a usable description was
    /// already captured, otherwise collect one.
    async fn continue_with_property(
        &self,
        phone: &str,
        property: ResolvedProperty,
        pending_description: Option<String>,
        pending_attachments: Vec<Attachment>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        match pending_description {
            Some(description) if self.description_ok(&description) => {
                self.create_incident(phone, property, description, pending_attachments)
                    .await
            }
            _ => {
                let name = property.property_name.clone();
                Ok((
                    ConversationState::AwaitingDescription { property },
                    outcome(replies::ask_description(&name)),
                ))
            }
        }
    }

    // --- collection ---

    async fn on_awaiting_description(
        &self,
        phone: &str,
        text: &str,
        attachments: &[Attachment],
        property: ResolvedProperty,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        if !self.description_ok(text) {
            return Ok((
                ConversationState::AwaitingDescription { property },
                outcome(replies::description_too_short(
                    self.engine_cfg.min_description_len,
                )),
            ));
        }
        if !attachments.is_empty() {
            // Description and photos in one message: nothing left to collect.
            return self
                .create_incident(phone, property, text.to_string(), attachments.to_vec())
                .await;
        }
        Ok((
            ConversationState::AwaitingPhotos {
                property,
                description: text.to_string(),
            },
            outcome(replies::ask_photos()),
        ))
    }

    async fn on_awaiting_photos(
        &self,
        phone: &str,
        text: &str,
        attachments: &[Attachment],
        property: ResolvedProperty,
        description: String,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        if !attachments.is_empty() {
            return self
                .create_incident(phone, property, description, attachments.to_vec())
                .await;
        }
        if parse::is_skip_photos(text) {
            return self
                .create_incident(phone, property, description, Vec::new())
                .await;
        }
        Ok((
            ConversationState::AwaitingPhotos {
                property,
                description,
            },
            outcome(replies::ask_photos()),
        ))
    }

    // --- creation ---

    /// Route toward creation, collecting whichever required field is missing
    /// instead of failing.
    async fn route_to_creation(
        &self,
        phone: &str,
        property: Option<ResolvedProperty>,
        description: String,
        attachments: Vec<Attachment>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let Some(property) = property else {
            let pending = if self.description_ok(&description) {
                Some(description)
            } else {
                None
            };
            return Ok((
                ConversationState::AwaitingProperty {
                    pending_description: pending,
                    pending_attachments: attachments,
                },
                outcome(replies::ask_property()),
            ));
        };
        if !self.description_ok(&description) {
            let name = property.property_name.clone();
            let reply = if description.trim().is_empty() {
                replies::ask_description(&name)
            } else {
                replies::description_too_short(self.engine_cfg.min_description_len)
            };
            return Ok((
                ConversationState::AwaitingDescription { property },
                outcome(reply),
            ));
        }
        self.create_incident(phone, property, description, attachments)
            .await
    }

    async fn create_incident(
        &self,
        phone: &str,
        property: ResolvedProperty,
        description: String,
        attachments: Vec<Attachment>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        match self
            .deps
            .incidents
            .create(NewIncident {
                property_id: property.property_id,
                tenant_id: property.tenant_id,
                description,
                phone: phone.to_string(),
                attachments,
            })
            .await
        {
            Ok(created) => Ok((
                ConversationState::IncidentActive {
                    incident_id: created.incident_id.clone(),
                },
                TurnOutcome {
                    reply: replies::incident_created(&created.reference_number),
                    incident_created: true,
                    incident_id: Some(created.incident_id),
                    reference_number: Some(created.reference_number),
                },
            )),
            Err(e) => {
                warn!(phone = %phone, error = %e, "incident creation failed");
                Ok((ConversationState::Idle, outcome(replies::creation_failed())))
            }
        }
    }

    // --- active incident ---

    async fn on_incident_active(
        &self,
        phone: &str,
        text: &str,
        attachments: &[Attachment],
        incident_id: String,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let reference = reference_number(&incident_id);

        let open = match self.deps.incidents.list_open_by_phone(phone).await {
            Ok(open) => open,
            Err(e) => {
                warn!(phone = %phone, error = %e, "open-incident lookup failed");
                // Safe default: confirm against the incident we know about.
                return Ok((
                    ConversationState::AwaitingFollowUpConfirmation {
                        incident_id,
                        pending_text: text.to_string(),
                    },
                    outcome(replies::confirm_follow_up(&reference)),
                ));
            }
        };

        // The linked incident may have been closed out of band.
        if !open.iter().any(|i| i.id == incident_id) {
            let property = match parse::extract_property_code(text) {
                Some(code) => match self.deps.codes.validate_code(&code).await {
                    Ok(found) => found.map(ResolvedProperty::from_ref),
                    Err(e) => {
                        warn!(error = %e, "property code validation failed");
                        None
                    }
                },
                None => None,
            };
            let description = parse::strip_property_code(text);
            return Ok((
                ConversationState::AwaitingNewIncidentConfirmation {
                    pending_text: text.to_string(),
                    property,
                },
                outcome(replies::confirm_new_incident(&preview(&description))),
            ));
        }

        if !attachments.is_empty() {
            for attachment in attachments {
                if let Err(e) = self
                    .deps
                    .incidents
                    .add_attachment(
                        &incident_id,
                        &attachment.url,
                        &attachment.file_name,
                        attachment.kind,
                    )
                    .await
                {
                    warn!(incident = %incident_id, error = %e, "failed to attach file");
                }
            }
            if text.is_empty() {
                return Ok((
                    ConversationState::IncidentActive { incident_id },
                    outcome(replies::photo_added(&reference)),
                ));
            }
        }

        if parse::is_new_issue_phrase(text) {
            return Ok((ConversationState::Idle, outcome(replies::start_new_issue())));
        }
        if parse::is_resolution(text) {
            return Ok((
                ConversationState::AwaitingClosureConfirmation {
                    incident_id,
                },
                outcome(replies::confirm_closure(&reference)),
            ));
        }

        // Re-classify against all open incidents. Only a confident "new"
        // reading earns a new-incident confirmation; everything else lands in
        // the explicit follow-up/selection round-trip.
        let classification = self.deps.classifier.classify(text, &open).await;
        match classification {
            Ok(c)
                if c.intent == MessageIntent::NewIncident
                    && c.confidence >= self.classifier_cfg.confidence_threshold =>
            {
                Ok((
                    ConversationState::AwaitingNewIncidentConfirmation {
                        pending_text: text.to_string(),
                        property: None,
                    },
                    outcome(replies::confirm_new_incident(&preview(text))),
                ))
            }
            other => {
                if let Err(e) = &other {
                    warn!(error = %e, "classifier failed, degrading to explicit confirmation");
                }
                if open.len() > 1 {
                    Ok((
                        ConversationState::AwaitingIncidentSelection {
                            candidates: open.iter().map(|i| i.id.clone()).collect(),
                        },
                        outcome(replies::list_incidents(&open)),
                    ))
                } else {
                    Ok((
                        ConversationState::AwaitingFollowUpConfirmation {
                            incident_id,
                            pending_text: text.to_string(),
                        },
                        outcome(replies::confirm_follow_up(&reference)),
                    ))
                }
            }
        }
    }

    // --- confirmations ---

    async fn on_new_incident_confirmation(
        &self,
        phone: &str,
        text: &str,
        pending_text: String,
        property: Option<ResolvedProperty>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        if parse::is_affirmative(text) {
            let property = match property {
                Some(property) => Some(property),
                None => match self.deps.tenants.find_by_phone(phone).await {
                    Ok(tenant) => tenant.map(|t| ResolvedProperty {
                        property_id: t.property_id,
                        property_name: t.property_name,
                        tenant_id: Some(t.id),
                    }),
                    Err(e) => {
                        warn!(phone = %phone, error = %e, "tenant lookup failed");
                        None
                    }
                },
            };
            let description = parse::strip_property_code(&pending_text);
            return self
                .route_to_creation(phone, property, description, Vec::new())
                .await;
        }
        if parse::is_negative(text) {
            return Ok((ConversationState::Idle, outcome(replies::not_creating())));
        }
        let reply = replies::confirm_new_incident(&preview(&pending_text));
        Ok((
            ConversationState::AwaitingNewIncidentConfirmation {
                pending_text,
                property,
            },
            outcome(reply),
        ))
    }

    async fn on_follow_up_confirmation(
        &self,
        text: &str,
        incident_id: String,
        pending_text: String,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let reference = reference_number(&incident_id);
        if parse::is_affirmative(text) {
            return Ok((
                ConversationState::IncidentActive { incident_id },
                outcome(replies::follow_up_noted(&reference)),
            ));
        }
        if parse::is_negative(text) {
            let reply = replies::confirm_new_incident(&preview(&pending_text));
            return Ok((
                ConversationState::AwaitingNewIncidentConfirmation {
                    pending_text,
                    property: None,
                },
                outcome(reply),
            ));
        }
        Ok((
            ConversationState::AwaitingFollowUpConfirmation {
                incident_id,
                pending_text,
            },
            outcome(replies::confirm_follow_up(&reference)),
        ))
    }

    async fn on_incident_selection(
        &self,
        text: &str,
        candidates: Vec<String>,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        if let Some(index) = parse::parse_selection(text, candidates.len()) {
            let incident_id = candidates[index].clone();
            return Ok((
                ConversationState::AwaitingUpdateOrClosure { incident_id },
                outcome(replies::ask_update_or_closure()),
            ));
        }
        if text.trim().eq_ignore_ascii_case("new") {
            return Ok((ConversationState::Idle, outcome(replies::start_new_issue())));
        }
        let count = candidates.len();
        Ok((
            ConversationState::AwaitingIncidentSelection { candidates },
            outcome(replies::selection_out_of_range(count)),
        ))
    }

    async fn on_update_or_closure(
        &self,
        phone: &str,
        text: &str,
        incident_id: String,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let reference = reference_number(&incident_id);
        // Resolution wins over update: "yes" closes, "no" keeps open.
        if parse::is_resolution(text) {
            return self.close_incident(phone, incident_id).await;
        }
        if parse::is_update(text) {
            return Ok((
                ConversationState::IncidentActive { incident_id },
                outcome(replies::kept_open(&reference)),
            ));
        }
        Ok((
            ConversationState::AwaitingUpdateOrClosure { incident_id },
            outcome(replies::ask_update_or_closure()),
        ))
    }

    async fn on_closure_confirmation(
        &self,
        phone: &str,
        text: &str,
        incident_id: String,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        if parse::is_affirmative(text) {
            return self.close_incident(phone, incident_id).await;
        }
        if parse::is_negative(text) {
            let reference = reference_number(&incident_id);
            return Ok((
                ConversationState::IncidentActive { incident_id },
                outcome(replies::kept_open(&reference)),
            ));
        }
        let reference = reference_number(&incident_id);
        Ok((
            ConversationState::AwaitingClosureConfirmation { incident_id },
            outcome(replies::confirm_closure(&reference)),
        ))
    }

    async fn close_incident(
        &self,
        phone: &str,
        incident_id: String,
    ) -> Result<(ConversationState, TurnOutcome), ProplinkError> {
        let reference = reference_number(&incident_id);
        match self.deps.incidents.close(&incident_id, phone).await {
            Ok(()) => Ok((ConversationState::Idle, outcome(replies::incident_closed(&reference)))),
            Err(e) => {
                warn!(incident = %incident_id, error = %e, "incident close failed");
                Ok((
                    ConversationState::AwaitingClosureConfirmation { incident_id },
                    outcome(replies::close_failed()),
                ))
            }
        }
    }

    // --- persistence ---

    async fn load_state(&self, phone: &str) -> Result<ConversationState, ProplinkError> {
        match self.deps.storage.load_conversation(phone).await? {
            Some(row) => match serde_json::from_str(&row.context) {
                Ok(state) => Ok(state),
                Err(e) => {
                    warn!(phone = %phone, error = %e, "unreadable conversation context, resetting");
                    Ok(ConversationState::Idle)
                }
            },
            None => Ok(ConversationState::Idle),
        }
    }

    async fn persist(&self, phone: &str, state: &ConversationState) -> Result<(), ProplinkError> {
        let context = serde_json::to_string(state)
            .map_err(|e| ProplinkError::Internal(format!("context serialization failed: {e}")))?;
        self.deps
            .storage
            .save_conversation(&StoredConversation {
                phone: phone.to_string(),
                state: state.tag().to_string(),
                context,
                incident_id: state.incident_id().map(|s| s.to_string()),
                updated_at: now_iso(),
            })
            .await
    }

    async fn turn_lock(&self, phone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Remove the sender's lock entry once no other turn holds or awaits it.
    /// Two references are the map's and the caller's; any more is a queued
    /// waiter that still needs the entry.
    async fn prune_turn_lock(&self, phone: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.turn_locks.lock().await;
        if Arc::strong_count(lock) <= 2 {
            locks.remove(phone);
        }
    }

    fn description_ok(&self, description: &str) -> bool {
        description.trim().len() >= self.engine_cfg.min_description_len
    }

    fn pending_description(&self, text: &str) -> Option<String> {
        let stripped = parse::strip_property_code(text);
        if self.description_ok(&stripped) {
            Some(stripped)
        } else {
            None
        }
    }
}

#[async_trait]
impl InboundHandler for ConversationEngine {
    async fn handle(
        &self,
        _session_id: &SessionId,
        message: &RawInbound,
    ) -> Result<Option<String>, ProplinkError> {
        let text = message.text.clone().unwrap_or_default();
        let turn = self
            .process_message(&message.remote_id, &text, message.attachments.clone())
            .await?;
        Ok(Some(turn.reply))
    }
}
