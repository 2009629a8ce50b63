//! Device environment and client identity models.
//!
//! Opaque immutable bags collected by the host platform and used only as
//! inputs to request construction. The engine never interprets these
//! fields; they travel into the client-identity token verbatim.

use serde::{Deserialize, Serialize};

/// Screen geometry reported inside the client-identity token.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct DisplayMetrics {
    pub width_pixels: i32,
    pub height_pixels: i32,
    pub xdpi: f32,
    pub ydpi: f32,
    pub density_dpi: i32,
}

/// Cellular network identity, when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelephonyInfo {
    pub sim_operator: String,
    pub sim_operator_name: String,
    pub network_operator: String,
    pub phone_type: i32,
}

/// Device/environment fingerprint snapshot.
///
/// One snapshot is taken per protocol session; the fields mirror what the
/// store client reports about the device it runs on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceProfile {
    /// Hardware device name
    pub device: String,
    /// Product name
    pub product: String,
    /// Model name
    pub model: String,
    pub manufacturer: String,
    /// Full build fingerprint string
    pub build_fingerprint: String,
    /// OS release version string
    pub os_release: String,
    pub brand: String,
    pub serial: String,
    /// BCP-47 language tag, e.g. `en-US`
    pub locale: String,
    /// ISO-639-2 language code
    pub iso3_language: String,
    pub country: String,
    pub time_zone: String,
    /// Offset from UTC in milliseconds
    pub time_zone_offset: i64,
    /// Store client package installed on the device
    pub store_package_name: String,
    pub store_version_code: i64,
    pub store_version_name: String,
    pub store_last_update_time: i64,
    pub store_first_install_time: i64,
    pub store_source_dir: String,
    /// Marketing client id reported by the store app
    pub market_client_id: String,
    pub display: Option<DisplayMetrics>,
    pub telephony: Option<TelephonyInfo>,
    /// Network interface addresses visible to the device
    pub net_addresses: Vec<String>,
    pub battery_level: i32,
    pub uptime_millis: i64,
    pub is_adb_enabled: bool,
    pub install_non_market_apps: bool,
    /// Accounts configured on the device
    pub accounts: Vec<String>,
}

/// Identity of the calling application, resolved by the host platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Package name of the calling app
    pub package_name: String,
    /// Version code of the calling app
    pub version_code: i32,
    /// MD5 of the calling app's signing certificate, lower-case hex
    pub signature_md5: String,
}

impl ClientIdentity {
    pub fn new(
        package_name: impl Into<String>,
        version_code: i32,
        signature_md5: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            version_code,
            signature_md5: signature_md5.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_profile_serialization() {
        let profile = DeviceProfile {
            device: "walleye".to_string(),
            model: "Pixel 2".to_string(),
            locale: "en-US".to_string(),
            store_version_code: 81010200,
            ..Default::default()
        };
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: DeviceProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, parsed);
    }
}
