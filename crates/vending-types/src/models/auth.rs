//! Authentication context model.

use serde::{Deserialize, Serialize};

/// Credentials and device identity for one store account.
///
/// Supplied by the host platform's account subsystem and immutable for the
/// life of a protocol session; a new context is obtained when a session
/// expires rather than refreshed in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthContext {
    /// Account identifier (email form)
    pub account: String,
    /// Bearer token scoped to the store services
    pub auth_token: String,
    /// Numeric device identifier, lower-case hex
    pub device_id_hex: String,
    /// Device checkin consistency token
    pub checkin_consistency_token: String,
}

impl AuthContext {
    pub fn new(
        account: impl Into<String>,
        auth_token: impl Into<String>,
        device_id_hex: impl Into<String>,
        checkin_consistency_token: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            auth_token: auth_token.into(),
            device_id_hex: device_id_hex.into(),
            checkin_consistency_token: checkin_consistency_token.into(),
        }
    }

    /// Device identifier parsed back to its numeric form.
    pub fn device_id_numeric(&self) -> Option<i64> {
        i64::from_str_radix(&self.device_id_hex, 16).ok()
    }
}
