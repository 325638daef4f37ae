// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Proplink conversation engine.

use thiserror::Error;

/// The primary error type used across all Proplink crates.
#[derive(Debug, Error)]
pub enum ProplinkError {
    /// Send precondition failure: the session's transport connection is not open.
    /// Fails fast, never retried.
    #[error("session {session_id} is not connected")]
    NotConnected { session_id: String },

    /// Send precondition failure: the connection is open but reports no
    /// authenticated identity. Fails fast, never retried.
    #[error("session {session_id} has no authenticated identity")]
    NotAuthenticated { session_id: String },

    /// A transport operation timed out. Retryable with bounded backoff.
    /// `stall: true` marks the device-sync stall subtype, which gets extended
    /// backoff plus a presence-update nudge.
    #[error("transport timeout (device sync stall: {stall})")]
    TransportTimeout { stall: bool },

    /// The remote end logged this session out. Terminal: credentials are
    /// invalid and a fresh pairing is required.
    #[error("session logged out, re-pairing required")]
    LoggedOut,

    /// User input was too short or ill-formed. Reported back to the sender;
    /// conversation state is unchanged or routed to a collection state.
    #[error("validation failure: {0}")]
    Validation(String),

    /// A collaborator service (OTP, classifier, incident service, tenant
    /// lookup) failed. The conversation degrades to a safer default.
    #[error("{service} service error: {source}")]
    ExternalService {
        service: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProplinkError {
    /// Whether this error is in the timeout class that outbound delivery retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProplinkError::TransportTimeout { .. })
    }

    /// Whether this error is the device-sync stall timeout subtype.
    pub fn is_stall(&self) -> bool {
        matches!(self, ProplinkError::TransportTimeout { stall: true })
    }

    /// Shorthand for wrapping a collaborator failure.
    pub fn external(
        service: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProplinkError::ExternalService {
            service: service.to_string(),
            source: Box::new(source),
        }
    }
}
