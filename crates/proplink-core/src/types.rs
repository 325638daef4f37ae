// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Proplink workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a transport session (one authenticated connection
/// to the chat network, independent of any single conversation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Connection lifecycle status for a session.
///
/// `LoggedOut` is terminal: it never auto-reconnects and requires a fresh
/// pairing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    QrPending,
    Connected,
    LoggedOut,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Why the transport closed the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Explicit logout or irrecoverable auth failure. Credentials must be
    /// cleared; the session terminates at `LoggedOut`.
    LoggedOut,
    /// Any other closure. A reconnect is scheduled and credentials are kept.
    Transient { detail: String },
}

/// Events emitted by a transport client after `start`.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Pairing challenge: the payload must be rendered as a QR code.
    Qr(String),
    /// Handshake complete; the connection reports its authenticated phone number.
    Open { phone: String },
    /// The credential blob rotated and must be persisted.
    CredentialsRotated(Vec<u8>),
    /// The connection closed.
    Closed { reason: CloseReason },
    /// A batch of inbound events, unfiltered.
    Messages(Vec<RawInbound>),
}

/// Delivery type of an inbound transport frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryKind {
    /// A freshly delivered user message. The only kind the intake processes.
    New,
    /// Replayed history during device sync.
    HistorySync,
    /// Delivery/read receipt frame.
    Receipt,
    /// Protocol bookkeeping frame with no user content.
    Protocol,
}

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
    Other,
}

/// A media attachment carried by an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub file_name: String,
    pub kind: AttachmentKind,
}

/// An inbound transport frame as delivered by the client, before filtering.
#[derive(Debug, Clone)]
pub struct RawInbound {
    /// Transport-level message identifier.
    pub message_id: String,
    /// Normalizable remote identifier (the sender's phone number).
    pub remote_id: String,
    /// True when the frame echoes a message this account sent.
    pub from_me: bool,
    pub kind: DeliveryKind,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Append-only log entry for one inbound or outbound message. Write-once.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub session_id: String,
    pub remote_id: String,
    pub from_me: bool,
    pub kind: String,
    pub content: Option<String>,
    pub created_at: String,
}

/// Returned by a successful outbound send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: MessageId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Persisted session row.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub status: ConnectionStatus,
    pub phone: Option<String>,
    pub last_error: Option<String>,
    /// Opaque credential blob owned exclusively by this session row; rewritten
    /// on every rotation event.
    pub credentials: Option<Vec<u8>>,
    pub connected_at: Option<String>,
    pub disconnected_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Persisted conversation row. The engine's state tag plus its serialized
/// context, written atomically together on every turn.
#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub phone: String,
    pub state: String,
    pub context: String,
    pub incident_id: Option<String>,
    pub updated_at: String,
}

// --- Incident collaborator view types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Closed,
}

/// An incident as reported by the external incident service.
#[derive(Debug, Clone)]
pub struct IncidentSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reported_at: String,
    pub status: IncidentStatus,
    pub property_id: String,
    pub tenant_id: Option<String>,
}

/// Payload for creating an incident via the external incident service.
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub property_id: String,
    pub tenant_id: Option<String>,
    pub description: String,
    pub phone: String,
    pub attachments: Vec<Attachment>,
}

/// Returned by the incident service after creation.
#[derive(Debug, Clone)]
pub struct CreatedIncident {
    pub incident_id: String,
    pub reference_number: String,
}

/// Tenant identification as returned by the tenant directory.
#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub id: String,
    pub property_id: String,
    pub property_name: String,
    pub name: String,
}

/// A property resolved from a human-entered property code.
#[derive(Debug, Clone)]
pub struct PropertyRef {
    pub property_id: String,
    pub property_name: String,
}

/// Identification returned by a successful OTP verification.
#[derive(Debug, Clone)]
pub struct OtpVerification {
    pub tenant_id: String,
    pub property_id: String,
    pub property_name: String,
    pub tenant_name: String,
}

// --- Intent classification ---

/// Classifier's reading of an inbound message against existing incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIntent {
    NewIncident,
    FollowUp,
    Unclear,
}

/// Action the classifier suggests. A signal only: state-mutating actions
/// always go through explicit confirmation when ambiguity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedAction {
    CreateNew,
    AttachToExisting,
    AskClarification,
}

/// Result of classifying one inbound message.
#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub intent: MessageIntent,
    pub suggested_action: SuggestedAction,
    pub confidence: f32,
}

/// Derive the human-facing reference number for an incident id: `INC-` plus
/// the first 8 hex characters of the id, upper-cased.
pub fn reference_number(incident_id: &str) -> String {
    let hex: String = incident_id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("INC-{hex}")
}
