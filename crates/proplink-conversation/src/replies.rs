// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply text. Every failure path speaks plain language and tells the sender
//! how to proceed; raw errors never reach the chat.

use proplink_core::types::IncidentSummary;

use crate::state::ConversationState;

pub fn onboarding() -> String {
    "Hi! I'm the maintenance assistant for your property. To report a problem, \
     describe it in a sentence or two. If you have a property code (like PROP-ABC123), \
     include it. Type \"help\" at any point for guidance."
        .to_string()
}

pub fn ask_email() -> String {
    "I couldn't match your number to a property. Please reply with the email address \
     registered on your lease so I can verify you."
        .to_string()
}

pub fn invalid_email() -> String {
    "That doesn't look like an email address. Please send it like name@example.com, \
     or type \"cancel\" to stop."
        .to_string()
}

pub fn otp_sent(email: &str) -> String {
    format!("I've sent a 6-digit code to {email}. Please reply with the code.")
}

pub fn otp_issue_failed() -> String {
    "I couldn't send the verification code just now. Please try the email again in a \
     minute, or type \"cancel\" to stop."
        .to_string()
}

pub fn ask_otp() -> String {
    "Please reply with the 6-digit code from the email.".to_string()
}

pub fn otp_incorrect() -> String {
    "That code doesn't match. Please check the email and try again, or type \"cancel\" \
     to stop."
        .to_string()
}

pub fn otp_verify_failed() -> String {
    "I'm having trouble verifying the code right now. Please try again shortly."
        .to_string()
}

pub fn ask_property() -> String {
    "Which property is this about? Please send your property code (like PROP-ABC123)."
        .to_string()
}

pub fn invalid_property_code(code: &str) -> String {
    format!(
        "I don't recognize the code {code}. Please check it and try again, or type \
         \"cancel\" to stop."
    )
}

pub fn ask_description(property_name: &str) -> String {
    format!(
        "Thanks! You're set up for {property_name}. Please describe the problem in a \
         sentence or two."
    )
}

pub fn description_too_short(min_len: usize) -> String {
    format!(
        "Could you give me a bit more detail? A few words (at least {min_len} characters) \
         helps the maintenance team."
    )
}

pub fn ask_photos() -> String {
    "Got it. If you have photos of the problem, send them now. Otherwise reply \
     \"skip\"."
        .to_string()
}

pub fn incident_created(reference: &str) -> String {
    format!(
        "Your report is logged. Reference: {reference}. The maintenance team has been \
         notified and will be in touch. Send me a message any time for an update."
    )
}

pub fn creation_failed() -> String {
    "Sorry, I couldn't log the report just now due to a technical problem. Please try \
     again in a few minutes."
        .to_string()
}

pub fn photo_added(reference: &str) -> String {
    format!("Added your photo to {reference}.")
}

pub fn confirm_new_incident(preview: &str) -> String {
    format!(
        "Just to confirm: you'd like to open a new maintenance report for \"{preview}\"? \
         Reply \"yes\" to log it or \"no\" if it's about an existing report."
    )
}

pub fn confirm_follow_up(reference: &str) -> String {
    format!(
        "Is this about your existing report {reference}? Reply \"yes\" to add it there \
         or \"no\" to open a new report."
    )
}

pub fn follow_up_noted(reference: &str) -> String {
    format!("Thanks, I've added your note to {reference}.")
}

pub fn list_incidents(incidents: &[IncidentSummary]) -> String {
    let mut lines = vec![
        "You have more than one open report. Which one is this about?".to_string(),
    ];
    for (i, incident) in incidents.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, incident.title));
    }
    lines.push("Reply with the number, \"new\" for a new report, or \"cancel\".".to_string());
    lines.join("\n")
}

pub fn ask_update_or_closure() -> String {
    "Is the problem resolved, or is this additional information? Reply \"resolved\" to \
     close the report or \"update\" to keep it open."
        .to_string()
}

pub fn confirm_closure(reference: &str) -> String {
    format!("Should I close report {reference}? Reply \"yes\" to close it or \"no\" to keep it open.")
}

pub fn incident_closed(reference: &str) -> String {
    format!("Report {reference} is closed. Thanks for letting us know! Message me any time to report something new.")
}

pub fn close_failed() -> String {
    "I couldn't close the report just now. Please try again shortly.".to_string()
}

pub fn kept_open(reference: &str) -> String {
    format!("Noted. Report {reference} stays open and I've passed your update along.")
}

pub fn start_new_issue() -> String {
    "Okay, let's log a new report. Please describe the problem, and include your \
     property code if you have one."
        .to_string()
}

pub fn not_creating() -> String {
    "Okay, I won't open a new report. If it's about an existing report, just send the \
     details."
        .to_string()
}

pub fn selection_out_of_range(count: usize) -> String {
    format!(
        "Please reply with a number between 1 and {count}, \"new\" for a new report, \
         or \"cancel\"."
    )
}

pub fn code_validation_failed() -> String {
    "I'm having trouble checking property codes right now. Please try again shortly."
        .to_string()
}

pub fn cancelled() -> String {
    "No problem, I've cancelled that. Message me any time to report an issue.".to_string()
}

pub fn technical_difficulties() -> String {
    "Sorry, I ran into a technical problem on my side. Please send your message again \
     in a few minutes."
        .to_string()
}

/// State-specific help. Never mutates state.
pub fn help_for(state: &ConversationState) -> String {
    match state {
        ConversationState::Idle => onboarding(),
        ConversationState::AwaitingEmail { .. } => {
            "I need the email address on your lease to verify you. Send it like \
             name@example.com, or type \"cancel\" to stop."
                .to_string()
        }
        ConversationState::AwaitingOtp { .. } => {
            "Check your email for a 6-digit code and reply with just the code. Type \
             \"cancel\" to stop."
                .to_string()
        }
        ConversationState::AwaitingProperty { .. } => {
            "Send your property code, like PROP-ABC123. You can find it in your lease \
             or welcome letter."
                .to_string()
        }
        ConversationState::AwaitingDescription { .. } => {
            "Describe the problem in a sentence or two, for example \"the kitchen tap \
             is leaking under the sink\"."
                .to_string()
        }
        ConversationState::AwaitingPhotos { .. } => {
            "Send photos of the problem if you have any, or reply \"skip\" to finish \
             the report without photos."
                .to_string()
        }
        ConversationState::IncidentActive { .. } => {
            "You have an open report. Send updates or photos here, tell me it's \
             resolved, or say \"new issue\" to report something else."
                .to_string()
        }
        ConversationState::AwaitingClosureConfirmation { .. } => {
            "Reply \"yes\" to close the report or \"no\" to keep it open.".to_string()
        }
        ConversationState::AwaitingIncidentSelection { .. } => {
            "Reply with the number of the report your message is about, \"new\" for a \
             new report, or \"cancel\"."
                .to_string()
        }
        ConversationState::AwaitingNewIncidentConfirmation { .. } => {
            "Reply \"yes\" to open a new report or \"no\" if it's about an existing one."
                .to_string()
        }
        ConversationState::AwaitingFollowUpConfirmation { .. } => {
            "Reply \"yes\" to add this to your existing report or \"no\" to open a new \
             one."
                .to_string()
        }
        ConversationState::AwaitingUpdateOrClosure { .. } => {
            "Reply \"resolved\" to close the report or \"update\" to keep it open."
                .to_string()
        }
    }
}
