//! Typed error definitions for the vending engine.
//!
//! The taxonomy separates caller mistakes (validation), infrastructure
//! failures (transport), malformed backend payloads (protocol), and
//! recoverable authentication failures. A server response that *declares*
//! a failure is not an error at this level — it travels as a normal
//! [`crate::ResultBundle`] with a non-zero code.

use crate::response::ResponseCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for vending engine operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum BillingError {
    /// Malformed caller input, rejected before any network call.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the rejected input
        message: String,
    },

    /// Network failure, timeout, or non-2xx HTTP status.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },

    /// Well-formed response violating a structural invariant.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the violated invariant
        message: String,
    },

    /// Password rejected or auth-proof exchange failed; recoverable.
    #[error("Auth error: {message}")]
    Auth {
        /// Description of the authentication failure
        message: String,
    },

    /// Session construction failed (auth or device providers unavailable).
    #[error("Session error: {message}")]
    Session {
        /// Description of the provider failure
        message: String,
    },
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session { message: message.into() }
    }

    /// Map this error into the fixed caller-facing response code domain.
    pub const fn response_code(&self) -> ResponseCode {
        match self {
            Self::Validation { .. } => ResponseCode::DeveloperError,
            Self::Transport { .. } | Self::Session { .. } => ResponseCode::BillingUnavailable,
            Self::Protocol { .. } | Self::Auth { .. } => ResponseCode::Error,
        }
    }
}

/// Result type alias for vending engine operations.
pub type BillingResult<T> = Result<T, BillingError>;
