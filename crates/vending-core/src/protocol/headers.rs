//! Request header construction.
//!
//! Every protocol call carries the bearer token plus the device identity
//! headers the backend correlates requests with.

use vending_types::{AuthContext, DeviceProfile};

const ENCODED_TARGETS: &str =
    "CAEScFfqlIEG6gUYogFWrAISK1WDAg+hAZoCDgIU1gYEOIACFkLMAeQBnASLATlASUuyAyqCAjY5igOMBQzfA/IClwFbApUC";

/// Full header set for binary protocol operations.
pub(crate) fn default_headers(
    auth: &AuthContext,
    device: &DeviceProfile,
) -> Vec<(String, String)> {
    let mut headers = base_headers(auth);
    headers.push((
        "User-Agent".to_string(),
        format!(
            "Android-Finsky/{} (api=3,versionCode={},sdk=0,device={},hardware={},product={})",
            device.store_version_name,
            device.store_version_code,
            device.device,
            device.device,
            device.product
        ),
    ));
    headers.push(("X-DFE-Device-Id".to_string(), auth.device_id_hex.clone()));
    headers.push(("Accept-Language".to_string(), device.locale.clone()));
    headers.push(("X-DFE-Encoded-Targets".to_string(), ENCODED_TARGETS.to_string()));
    if !auth.checkin_consistency_token.is_empty() {
        headers.push((
            "X-DFE-Device-Checkin-Consistency-Token".to_string(),
            auth.checkin_consistency_token.clone(),
        ));
    }
    headers
}

/// Minimal header set for the JSON password-proof exchange.
pub(crate) fn base_headers(auth: &AuthContext) -> Vec<(String, String)> {
    vec![("Authorization".to_string(), format!("Bearer {}", auth.auth_token))]
}
