// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end conversation flows against in-memory collaborators and a temp
//! SQLite database.

use std::sync::Arc;

use proplink_config::model::{ClassifierConfig, EngineConfig};
use proplink_conversation::{ConversationEngine, EngineDeps};
use proplink_core::{IncidentService, Storage};
use proplink_core::types::{
    Attachment, AttachmentKind, IncidentStatus, IncidentSummary, IntentClassification,
    MessageIntent, OtpVerification, PropertyRef, SuggestedAction, TenantRecord,
};
use proplink_test_utils::{
    FakeClassifier, FakeIncidentService, FakeOtpService, FakePropertyCodes, FakeTenantDirectory,
    temp_storage,
};

struct Fixture {
    engine: ConversationEngine,
    storage: Arc<dyn Storage>,
    tenants: Arc<FakeTenantDirectory>,
    codes: Arc<FakePropertyCodes>,
    otp: Arc<FakeOtpService>,
    incidents: Arc<FakeIncidentService>,
    classifier: Arc<FakeClassifier>,
    _dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let (storage, dir) = temp_storage().await.unwrap();
    let tenants = Arc::new(FakeTenantDirectory::new());
    let codes = Arc::new(FakePropertyCodes::new());
    let otp = Arc::new(FakeOtpService::new());
    let incidents = Arc::new(FakeIncidentService::new());
    let classifier = Arc::new(FakeClassifier::new());

    codes
        .insert(
            "PROP-ABC123",
            PropertyRef {
                property_id: "prop-1".into(),
                property_name: "Oak Court".into(),
            },
        )
        .await;

    let engine = ConversationEngine::new(
        EngineDeps {
            storage: storage.clone(),
            tenants: tenants.clone(),
            codes: codes.clone(),
            otp: otp.clone(),
            incidents: incidents.clone(),
            classifier: classifier.clone(),
        },
        EngineConfig::default(),
        ClassifierConfig::default(),
    );

    Fixture {
        engine,
        storage,
        tenants,
        codes,
        otp,
        incidents,
        classifier,
        _dir: dir,
    }
}

const PHONE: &str = "0821234567";
const CANONICAL: &str = "27821234567";

async fn state_of(f: &Fixture) -> String {
    f.storage
        .load_conversation(CANONICAL)
        .await
        .unwrap()
        .map(|row| row.state)
        .unwrap_or_else(|| "idle".to_string())
}

async fn open_incident(f: &Fixture, id: &str, title: &str) {
    f.incidents
        .insert(IncidentSummary {
            id: id.to_string(),
            title: title.to_string(),
            description: title.to_string(),
            reported_at: "2026-01-01T00:00:00.000Z".into(),
            status: IncidentStatus::Open,
            property_id: "prop-1".into(),
            tenant_id: None,
        })
        .await;
}

fn assert_reference_shape(reply: &str) {
    let idx = reply.find("INC-").expect("reply should carry a reference");
    let tail: String = reply[idx + 4..].chars().take(8).collect();
    assert_eq!(tail.len(), 8, "reference too short in: {reply}");
    assert!(
        tail.chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()),
        "reference not uppercase hex in: {reply}"
    );
}

#[tokio::test]
async fn property_code_and_description_create_in_one_turn() {
    let f = fixture().await;

    let turn = f
        .engine
        .process_message(PHONE, "PROP-ABC123 the tap is leaking in the kitchen", vec![])
        .await
        .unwrap();

    assert!(turn.incident_created);
    assert!(turn.incident_id.is_some());
    assert_reference_shape(&turn.reply);
    assert_eq!(state_of(&f).await, "incident_active");

    let created = f.incidents.all().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].property_id, "prop-1");
    assert!(created[0].description.contains("tap is leaking"));
}

#[tokio::test]
async fn low_confidence_classification_forces_confirmation() {
    let f = fixture().await;
    open_incident(&f, "aabbccdd-0001", "Leaking tap").await;
    f.classifier
        .script(Ok(IntentClassification {
            intent: MessageIntent::NewIncident,
            suggested_action: SuggestedAction::CreateNew,
            confidence: 0.4,
        }))
        .await;

    let turn = f
        .engine
        .process_message(PHONE, "the gate motor sounds strange", vec![])
        .await
        .unwrap();

    assert!(!turn.incident_created);
    assert_eq!(state_of(&f).await, "awaiting_new_incident_confirmation");
}

#[tokio::test]
async fn classifier_failure_degrades_to_follow_up_confirmation() {
    let f = fixture().await;
    open_incident(&f, "aabbccdd-0001", "Leaking tap").await;
    f.classifier
        .script(Err(proplink_core::ProplinkError::ExternalService {
            service: "classifier".into(),
            source: "model unavailable".into(),
        }))
        .await;

    f.engine
        .process_message(PHONE, "there is water everywhere now", vec![])
        .await
        .unwrap();

    assert_eq!(state_of(&f).await, "awaiting_follow_up_confirmation");
}

#[tokio::test]
async fn update_keyword_keeps_incident_open_and_returns_to_active() {
    let f = fixture().await;
    open_incident(&f, "aabbccdd-0001", "Leaking tap").await;
    open_incident(&f, "aabbccdd-0002", "Broken gate").await;

    // Two open incidents and an unclear message: the engine lists them.
    f.engine
        .process_message(PHONE, "quick update about the problem", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_incident_selection");

    f.engine.process_message(PHONE, "1", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "awaiting_update_or_closure");

    let turn = f.engine.process_message(PHONE, "update", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "incident_active");
    assert!(turn.reply.contains("stays open"));

    let row = f.storage.load_conversation(CANONICAL).await.unwrap().unwrap();
    assert_eq!(row.incident_id.as_deref(), Some("aabbccdd-0001"));
    let open = f.incidents.list_open_by_phone(CANONICAL).await.unwrap();
    assert!(open.iter().any(|i| i.id == "aabbccdd-0001"), "incident must stay open");
}

#[tokio::test]
async fn resolved_keyword_closes_after_selection() {
    let f = fixture().await;
    open_incident(&f, "aabbccdd-0001", "Leaking tap").await;
    open_incident(&f, "aabbccdd-0002", "Broken gate").await;

    f.engine
        .process_message(PHONE, "about one of my reports", vec![])
        .await
        .unwrap();
    f.engine.process_message(PHONE, "2", vec![]).await.unwrap();
    let turn = f
        .engine
        .process_message(PHONE, "resolved", vec![])
        .await
        .unwrap();

    assert!(turn.reply.contains("closed"));
    assert_eq!(state_of(&f).await, "idle");
    let open = f.incidents.list_open_by_phone(CANONICAL).await.unwrap();
    assert!(!open.iter().any(|i| i.id == "aabbccdd-0002"));
}

#[tokio::test]
async fn short_description_never_creates_an_incident() {
    let f = fixture().await;

    // Known tenant so identification is not the blocker.
    f.tenants
        .insert(
            CANONICAL,
            TenantRecord {
                id: "t-1".into(),
                property_id: "prop-1".into(),
                property_name: "Oak Court".into(),
                name: "Sam".into(),
            },
        )
        .await;

    // A photo with no usable text identifies the tenant but must not create.
    let photo = Attachment {
        url: "https://media.example/p1.jpg".into(),
        file_name: "p1.jpg".into(),
        kind: AttachmentKind::Image,
    };
    f.engine
        .process_message(PHONE, "", vec![photo])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_description");
    assert!(f.incidents.all().await.is_empty());

    // Still too short from the collection state.
    f.engine.process_message(PHONE, "tap leak", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "awaiting_description");
    assert!(f.incidents.all().await.is_empty());

    let row = f.storage.load_conversation(CANONICAL).await.unwrap().unwrap();
    assert!(row.incident_id.is_none());
}

#[tokio::test]
async fn known_tenant_with_full_description_skips_identification() {
    let f = fixture().await;
    f.tenants
        .insert(
            CANONICAL,
            TenantRecord {
                id: "t-1".into(),
                property_id: "prop-1".into(),
                property_name: "Oak Court".into(),
                name: "Sam".into(),
            },
        )
        .await;

    let turn = f
        .engine
        .process_message(PHONE, "the geyser in the ceiling burst and is flooding", vec![])
        .await
        .unwrap();

    assert!(turn.incident_created);
    let created = f.incidents.all().await;
    assert_eq!(created[0].tenant_id.as_deref(), Some("t-1"));
}

#[tokio::test]
async fn unknown_sender_walks_the_otp_ladder() {
    let f = fixture().await;
    f.otp
        .expect_code(
            CANONICAL,
            "123456",
            OtpVerification {
                tenant_id: "t-9".into(),
                property_id: "prop-1".into(),
                property_name: "Oak Court".into(),
                tenant_name: "Sam".into(),
            },
        )
        .await;

    // No tenant record, no property code: fall back to email verification.
    f.engine
        .process_message(PHONE, "my kitchen window is broken and will not close", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_email");

    // Junk email re-prompts without advancing.
    f.engine
        .process_message(PHONE, "not-an-email", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_email");

    f.engine
        .process_message(PHONE, "sam@example.com", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_otp");
    assert_eq!(
        f.otp.issued().await,
        vec![(CANONICAL.to_string(), "sam@example.com".to_string())]
    );

    // Wrong code re-prompts.
    f.engine.process_message(PHONE, "000000", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "awaiting_otp");
    assert!(f.incidents.all().await.is_empty());

    // Right code: the description captured in turn one creates immediately.
    let turn = f.engine.process_message(PHONE, "123456", vec![]).await.unwrap();
    assert!(turn.incident_created);
    assert_eq!(state_of(&f).await, "incident_active");
    let created = f.incidents.all().await;
    assert!(created[0].description.contains("kitchen window"));
}

#[tokio::test]
async fn new_incident_confirmation_is_never_a_silent_no_op() {
    let f = fixture().await;
    open_incident(&f, "aabbccdd-0001", "Leaking tap").await;
    f.classifier
        .script(Ok(IntentClassification {
            intent: MessageIntent::NewIncident,
            suggested_action: SuggestedAction::CreateNew,
            confidence: 0.9,
        }))
        .await;

    f.engine
        .process_message(PHONE, "the gate motor burned out completely", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_new_incident_confirmation");

    // "yes" without a resolvable property routes to collection, not a no-op.
    f.engine.process_message(PHONE, "yes", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "awaiting_property");

    // Supplying the code completes creation with the held description.
    let turn = f
        .engine
        .process_message(PHONE, "PROP-ABC123", vec![])
        .await
        .unwrap();
    assert!(turn.incident_created);
    assert_eq!(state_of(&f).await, "incident_active");
}

#[tokio::test]
async fn follow_up_no_routes_to_new_incident_confirmation() {
    let f = fixture().await;
    open_incident(&f, "aabbccdd-0001", "Leaking tap").await;
    f.classifier
        .script(Ok(IntentClassification {
            intent: MessageIntent::FollowUp,
            suggested_action: SuggestedAction::AttachToExisting,
            confidence: 0.9,
        }))
        .await;

    f.engine
        .process_message(PHONE, "also the sink next to it drips", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_follow_up_confirmation");

    f.engine.process_message(PHONE, "no", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "awaiting_new_incident_confirmation");
}

#[tokio::test]
async fn help_answers_without_mutating_state() {
    let f = fixture().await;
    f.engine
        .process_message(PHONE, "the stove plates stopped working entirely", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_email");

    let turn = f.engine.process_message(PHONE, "help", vec![]).await.unwrap();
    assert!(turn.reply.contains("email"));
    assert_eq!(state_of(&f).await, "awaiting_email");
}

#[tokio::test]
async fn cancel_resets_to_idle() {
    let f = fixture().await;
    f.engine
        .process_message(PHONE, "the stove plates stopped working entirely", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_email");

    f.engine.process_message(PHONE, "cancel", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "idle");
}

#[tokio::test]
async fn chit_chat_gets_onboarding_and_stays_idle() {
    let f = fixture().await;
    let turn = f.engine.process_message(PHONE, "good morning", vec![]).await.unwrap();
    assert!(turn.reply.contains("describe"));
    assert_eq!(state_of(&f).await, "idle");
    assert!(f.incidents.all().await.is_empty());
}

#[tokio::test]
async fn creation_failure_replies_plainly_and_resets() {
    let f = fixture().await;
    f.incidents.set_create_failing(true);

    let turn = f
        .engine
        .process_message(PHONE, "PROP-ABC123 the tap is leaking in the kitchen", vec![])
        .await
        .unwrap();

    assert!(!turn.incident_created);
    assert!(!turn.reply.contains("Error"), "raw errors must not leak: {}", turn.reply);
    assert_eq!(state_of(&f).await, "idle");
}

#[tokio::test]
async fn closure_confirmation_round_trip() {
    let f = fixture().await;

    let turn = f
        .engine
        .process_message(PHONE, "PROP-ABC123 the tap is leaking in the kitchen", vec![])
        .await
        .unwrap();
    let incident_id = turn.incident_id.unwrap();

    // "fixed" from the active state asks before closing.
    f.engine.process_message(PHONE, "fixed", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "awaiting_closure_confirmation");

    // Declining keeps it open and active.
    f.engine.process_message(PHONE, "no", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "incident_active");

    // Going around again and confirming closes it.
    f.engine.process_message(PHONE, "done", vec![]).await.unwrap();
    f.engine.process_message(PHONE, "yes", vec![]).await.unwrap();
    assert_eq!(state_of(&f).await, "idle");
    let open = f.incidents.list_open_by_phone(CANONICAL).await.unwrap();
    assert!(!open.iter().any(|i| i.id == incident_id));
}

#[tokio::test]
async fn phone_forms_share_one_conversation() {
    let f = fixture().await;
    f.engine
        .process_message("0821234567", "the bathroom drain is fully blocked", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_email");

    // The international form continues the same conversation.
    f.engine
        .process_message("+27821234567", "sam@example.com", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_otp");
}

#[tokio::test]
async fn code_only_message_collects_description_then_photos() {
    let f = fixture().await;
    f.codes
        .insert(
            "PROP-XYZ999",
            PropertyRef {
                property_id: "prop-2".into(),
                property_name: "Willow Mews".into(),
            },
        )
        .await;

    let turn = f
        .engine
        .process_message(PHONE, "PROP-XYZ999", vec![])
        .await
        .unwrap();
    assert!(turn.reply.contains("Willow Mews"));
    assert_eq!(state_of(&f).await, "awaiting_description");

    f.engine
        .process_message(PHONE, "the bedroom ceiling light keeps tripping the power", vec![])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_photos");
    assert!(f.incidents.all().await.is_empty());

    let turn = f.engine.process_message(PHONE, "skip", vec![]).await.unwrap();
    assert!(turn.incident_created);
    assert_eq!(state_of(&f).await, "incident_active");
    let created = f.incidents.all().await;
    assert_eq!(created[0].property_id, "prop-2");
}

#[tokio::test]
async fn photo_on_active_incident_is_attached() {
    let f = fixture().await;
    let turn = f
        .engine
        .process_message(PHONE, "PROP-ABC123 the tap is leaking in the kitchen", vec![])
        .await
        .unwrap();
    let incident_id = turn.incident_id.unwrap();

    let photo = Attachment {
        url: "https://media.example/leak.jpg".into(),
        file_name: "leak.jpg".into(),
        kind: AttachmentKind::Image,
    };
    let turn = f.engine.process_message(PHONE, "", vec![photo]).await.unwrap();
    assert!(turn.reply.contains("Added your photo"));
    assert_eq!(state_of(&f).await, "incident_active");
    assert_eq!(
        f.incidents.attachments().await,
        vec![(incident_id, "https://media.example/leak.jpg".to_string())]
    );
}

#[tokio::test]
async fn photos_sent_with_first_report_survive_identification() {
    let f = fixture().await;
    f.otp
        .expect_code(
            CANONICAL,
            "123456",
            OtpVerification {
                tenant_id: "t-9".into(),
                property_id: "prop-1".into(),
                property_name: "Oak Court".into(),
                tenant_name: "Sam".into(),
            },
        )
        .await;

    // Unknown sender reports with a photo attached; identification defers
    // creation but must not drop the photo.
    let photo = Attachment {
        url: "https://media.example/geyser.jpg".into(),
        file_name: "geyser.jpg".into(),
        kind: AttachmentKind::Image,
    };
    f.engine
        .process_message(PHONE, "the geyser burst and is flooding the flat", vec![photo])
        .await
        .unwrap();
    assert_eq!(state_of(&f).await, "awaiting_email");

    f.engine
        .process_message(PHONE, "sam@example.com", vec![])
        .await
        .unwrap();
    let turn = f.engine.process_message(PHONE, "123456", vec![]).await.unwrap();

    assert!(turn.incident_created);
    let incident_id = turn.incident_id.unwrap();
    assert_eq!(
        f.incidents.attachments().await,
        vec![(incident_id, "https://media.example/geyser.jpg".to_string())]
    );
}

#[tokio::test]
async fn invalid_property_code_falls_back_to_email() {
    let f = fixture().await;
    let turn = f
        .engine
        .process_message(PHONE, "PROP-NOPE the tap is leaking in the kitchen", vec![])
        .await
        .unwrap();
    assert!(turn.reply.contains("PROP-NOPE"));
    assert_eq!(state_of(&f).await, "awaiting_email");

    // The description travels with the fallback: a code typed at the email
    // prompt completes creation directly.
    let turn = f
        .engine
        .process_message(PHONE, "PROP-ABC123", vec![])
        .await
        .unwrap();
    assert!(turn.incident_created);
    assert_eq!(state_of(&f).await, "incident_active");
}
