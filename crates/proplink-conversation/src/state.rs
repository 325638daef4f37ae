// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-sender dialogue state as a tagged union.
//!
//! Each variant carries only the context fields its handlers use, so an
//! illegal state/context combination is unrepresentable. The whole value is
//! serialized to JSON for the conversation row's context column; the tag is
//! mirrored into the row's state column for querying.

use serde::{Deserialize, Serialize};

use proplink_core::types::{Attachment, PropertyRef};

/// A property resolved during identification, plus the tenant when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProperty {
    pub property_id: String,
    pub property_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl ResolvedProperty {
    pub fn from_ref(property: PropertyRef) -> Self {
        Self {
            property_id: property.property_id,
            property_name: property.property_name,
            tenant_id: None,
        }
    }
}

/// Dialogue progress for one sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    /// No conversation in progress. Initial and re-enterable.
    #[default]
    Idle,

    /// Waiting for an email address to start OTP verification. Anything the
    /// sender already reported rides along until creation.
    AwaitingEmail {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_description: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pending_attachments: Vec<Attachment>,
    },

    /// An OTP has been issued to `email`; waiting for the 6-digit code.
    AwaitingOtp {
        email: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_description: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pending_attachments: Vec<Attachment>,
    },

    /// Waiting for a property code to resolve where the incident is.
    AwaitingProperty {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_description: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pending_attachments: Vec<Attachment>,
    },

    /// Identified; waiting for an incident description of usable length.
    AwaitingDescription { property: ResolvedProperty },

    /// Description captured; photos are optional before creation.
    AwaitingPhotos {
        property: ResolvedProperty,
        description: String,
    },

    /// An incident is linked and open; follow-ups land here.
    IncidentActive { incident_id: String },

    /// The sender hinted the incident is resolved; confirm before closing.
    AwaitingClosureConfirmation { incident_id: String },

    /// Multiple open incidents; waiting for a numeric pick.
    AwaitingIncidentSelection { candidates: Vec<String> },

    /// Confirming that a message should open a new incident.
    AwaitingNewIncidentConfirmation {
        pending_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property: Option<ResolvedProperty>,
    },

    /// Confirming that a message is a follow-up on an existing incident.
    AwaitingFollowUpConfirmation {
        incident_id: String,
        pending_text: String,
    },

    /// Disambiguating "resolved" vs "additional information" after selection.
    AwaitingUpdateOrClosure { incident_id: String },
}

impl ConversationState {
    /// The snake_case tag mirrored into the conversation row's state column.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingEmail { .. } => "awaiting_email",
            Self::AwaitingOtp { .. } => "awaiting_otp",
            Self::AwaitingProperty { .. } => "awaiting_property",
            Self::AwaitingDescription { .. } => "awaiting_description",
            Self::AwaitingPhotos { .. } => "awaiting_photos",
            Self::IncidentActive { .. } => "incident_active",
            Self::AwaitingClosureConfirmation { .. } => "awaiting_closure_confirmation",
            Self::AwaitingIncidentSelection { .. } => "awaiting_incident_selection",
            Self::AwaitingNewIncidentConfirmation { .. } => "awaiting_new_incident_confirmation",
            Self::AwaitingFollowUpConfirmation { .. } => "awaiting_follow_up_confirmation",
            Self::AwaitingUpdateOrClosure { .. } => "awaiting_update_or_closure",
        }
    }

    /// The incident this state is linked to, when any.
    pub fn incident_id(&self) -> Option<&str> {
        match self {
            Self::IncidentActive { incident_id }
            | Self::AwaitingClosureConfirmation { incident_id }
            | Self::AwaitingFollowUpConfirmation { incident_id, .. }
            | Self::AwaitingUpdateOrClosure { incident_id } => Some(incident_id),
            _ => None,
        }
    }
}
