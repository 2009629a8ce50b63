//! External collaborator interfaces.
//!
//! Everything the engine consumes from the host platform is a trait here:
//! account credentials, device/client identity, anti-abuse challenge
//! solving, and the persisted user settings. Production wiring supplies
//! platform-backed implementations; tests supply fakes.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use vending_types::{AuthContext, BillingError, ClientIdentity, DeviceProfile};

/// Failures surfaced by the auth and identity providers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No account with the requested identifier exists on the device.
    #[error("no account: {0}")]
    NoAccount(String),

    /// The account exists but no token could be issued.
    #[error("token unavailable: {0}")]
    TokenUnavailable(String),

    /// Token issuance requires interactive user consent.
    #[error("interactive consent required for {0}")]
    InteractiveConsentRequired(String),

    /// Client identity resolution failed (unknown package, no signature).
    #[error("identity error: {0}")]
    Identity(String),
}

impl From<ProviderError> for BillingError {
    fn from(err: ProviderError) -> Self {
        BillingError::session(err.to_string())
    }
}

/// Source of account credentials.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Obtain a fresh [`AuthContext`] for the given account identifier.
    async fn obtain(&self, account_id: &str) -> Result<AuthContext, ProviderError>;
}

/// Source of device and calling-app identity.
#[async_trait]
pub trait DeviceIdentityProvider: Send + Sync {
    /// Snapshot of the device environment fingerprint.
    async fn snapshot(&self) -> DeviceProfile;

    /// Resolve the identity of the named calling package.
    async fn resolve(&self, package_name: &str) -> Result<ClientIdentity, ProviderError>;
}

/// Asynchronous anti-abuse challenge solver.
///
/// Failures resolve to an empty token; this call never errors.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, flow_name: &str, challenge: HashMap<String, String>) -> String;
}

/// Persisted user settings consumed by the buy flow.
pub trait SettingsStore: Send + Sync {
    /// Whether the user requires password authentication before purchase.
    fn auth_required(&self) -> bool;

    fn set_auth_required(&self, required: bool);
}

/// In-memory settings store, default for tests and headless wiring.
#[derive(Debug)]
pub struct MemorySettings {
    auth_required: parking_lot::RwLock<bool>,
}

impl MemorySettings {
    pub fn new(auth_required: bool) -> Self {
        Self { auth_required: parking_lot::RwLock::new(auth_required) }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        // Requiring auth is the safe default for a fresh install
        Self::new(true)
    }
}

impl SettingsStore for MemorySettings {
    fn auth_required(&self) -> bool {
        *self.auth_required.read()
    }

    fn set_auth_required(&self, required: bool) {
        tracing::debug!("[Settings] auth_required set to {}", required);
        *self.auth_required.write() = required;
    }
}
