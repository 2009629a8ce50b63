//! Request assembly.
//!
//! Pure functions building wire requests from flat parameter structs.
//! The continuation path is an explicit copy-then-patch: a follow-up
//! acquire request starts as a byte-for-byte copy of its predecessor and
//! overwrites only the small fixed set of round-trip fields. Recomputing
//! any other field between round trips breaks server-side correlation.

use crate::wire;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use prost::Message;
use rand::RngCore;
use vending_types::{AuthContext, BillingError, BillingResult, BuyFlowParams, ClientIdentity,
    DeviceProfile, ParamMap, ParamValue};

/// Theme constant sent with every acquire request.
pub(crate) const CLIENT_THEME: i32 = 2;

/// Backend document type code for a SKU type string.
pub(crate) fn backend_doc_type(sku_type: &str) -> BillingResult<i32> {
    match sku_type {
        "subs" | "first_party" => Ok(15),
        "inapp" => Ok(11),
        other => Err(BillingError::validation(format!("unknown sku type: {}", other))),
    }
}

/// Encode caller extra params into wire key/value pairs.
pub(crate) fn params_to_wire(params: &ParamMap) -> Vec<wire::SkuParam> {
    params
        .iter()
        .map(|(name, value)| {
            let mut param = wire::SkuParam { name: name.clone(), ..Default::default() };
            match value {
                ParamValue::Bool(v) => param.bv = Some(*v),
                ParamValue::I64(v) => param.i64v = Some(*v),
                ParamValue::Str(v) => param.sv = Some(v.clone()),
                ParamValue::StrList(v) => param.sv_list = v.clone(),
            }
            param
        })
        .collect()
}

/// Resolve the document id for a buy flow.
///
/// A caller-supplied pre-encoded doc id wins; otherwise the id is composed
/// from the SKU type, owning package, and SKU.
pub(crate) fn resolve_doc_id(
    buy: &BuyFlowParams,
    caller_package: &str,
) -> BillingResult<wire::DocId> {
    if let Some(serialized) = buy.serialized_doc_id.as_deref().filter(|s| !s.is_empty()) {
        let bytes = URL_SAFE_NO_PAD
            .decode(serialized)
            .or_else(|_| URL_SAFE.decode(serialized))
            .map_err(|e| BillingError::validation(format!("bad serialized doc id: {}", e)))?;
        return wire::DocId::decode(bytes.as_slice())
            .map_err(|e| BillingError::validation(format!("undecodable doc id: {}", e)));
    }
    let sku_package = match buy.sku_params.get("skuPackageName") {
        Some(ParamValue::Str(pkg)) if !pkg.is_empty() => pkg.as_str(),
        _ => caller_package,
    };
    Ok(wire::DocId {
        backend_doc_id: format!("{}:{}:{}", buy.sku_type, sku_package, buy.sku),
        kind: backend_doc_type(&buy.sku_type)?,
        backend: 3,
    })
}

/// Build the base64url client-identity token from the device snapshot.
pub(crate) fn build_client_token(device: &DeviceProfile, auth: &AuthContext) -> String {
    let token = wire::ClientToken {
        device: Some(wire::TokenDeviceInfo {
            device: device.device.clone(),
            product: device.product.clone(),
            model: device.model.clone(),
            manufacturer: device.manufacturer.clone(),
            fingerprint: device.build_fingerprint.clone(),
            release: device.os_release.clone(),
            brand: device.brand.clone(),
            serial: device.serial.clone(),
            is_emulator: false,
            width_pixels: device.display.map(|d| d.width_pixels).unwrap_or_default(),
            height_pixels: device.display.map(|d| d.height_pixels).unwrap_or_default(),
            density_dpi: device.display.map(|d| d.density_dpi).unwrap_or_default(),
            store_package: device.store_package_name.clone(),
            store_version_code: device.store_version_code.to_string(),
            store_version_name: device.store_version_name.clone(),
            gsf_id: auth.device_id_numeric().unwrap_or_default(),
            env: Some(wire::TokenEnvInfo {
                battery_level: device.battery_level,
                time_zone_offset: device.time_zone_offset,
                is_adb_enabled: device.is_adb_enabled,
                install_non_market_apps: device.install_non_market_apps,
                iso3_language: device.iso3_language.clone(),
                net_address: device.net_addresses.clone(),
                locale: device.locale.clone(),
                network_operator: device
                    .telephony
                    .as_ref()
                    .map(|t| t.network_operator.clone())
                    .unwrap_or_default(),
                sim_operator: device
                    .telephony
                    .as_ref()
                    .map(|t| t.sim_operator.clone())
                    .unwrap_or_default(),
                phone_type: device.telephony.as_ref().map(|t| t.phone_type).unwrap_or_default(),
                uptime_millis: device.uptime_millis,
                time_zone: device.time_zone.clone(),
                account_count: device.accounts.len() as i32,
                store_install: Some(wire::StoreInstallInfo {
                    package: device.store_package_name.clone(),
                    version_code: device.store_version_code.to_string(),
                    last_update_time: device.store_last_update_time,
                    first_install_time: device.store_first_install_time,
                    source_dir: device.store_source_dir.clone(),
                }),
            }),
            market_client_id: device.market_client_id.clone(),
        }),
        locale: device.locale.clone(),
        store_version_code: device.store_version_code,
        accounts: device.accounts.clone(),
        referrer: String::new(),
    };
    URL_SAFE.encode(token.encode_to_vec())
}

/// Deterministic `#`-joined correlation key for an acquire negotiation.
///
/// Field order and presence are fixed; the server matches continuations
/// against this string byte for byte.
pub(crate) fn acquire_cache_key(
    account: &str,
    device_id: &str,
    documents: &[wire::CkDocument],
    calling_package: &str,
    extras: &[(String, String)],
    auth_frequency: i32,
) -> String {
    let mut key = String::from(account);
    for doc in documents {
        key.push('#');
        key.push_str(&STANDARD.encode(doc.encode_to_vec()));
    }
    key.push_str(&format!("#simId={}", device_id));
    key.push_str(&format!("#clientTheme={}", CLIENT_THEME));
    key.push_str("#fingerprintValid=false");
    key.push_str("#desiredAuthMethod=0");
    key.push_str(&format!("#authFrequency={}", auth_frequency));
    key.push_str("#userHasFop=false");
    key.push_str(&format!("#callingAppPackageName={}", calling_package));
    for (name, value) in extras {
        key.push_str(&format!("#{}={}", name, value));
    }
    key
}

/// Fresh random request nonce.
pub(crate) fn create_nonce() -> String {
    let mut bytes = [0u8; 0x100];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("nonce={}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Current time as a wire timestamp.
pub(crate) fn wire_timestamp() -> wire::Timestamp {
    let now = chrono::Utc::now();
    wire::Timestamp {
        seconds: now.timestamp(),
        nanos: now.timestamp_subsec_millis() as i32 * 1_000_000,
    }
}

/// Build a fresh acquire request for the first round trip of a flow.
pub(crate) fn build_acquire_request(
    device: &DeviceProfile,
    client: &ClientIdentity,
    auth: &AuthContext,
    buy: &BuyFlowParams,
) -> BillingResult<wire::AcquireRequest> {
    let doc_id = resolve_doc_id(buy, &client.package_name)?;
    let offer_token = buy.offer_id_token.clone().filter(|t| !t.trim().is_empty());
    let auth_frequency = if buy.needs_auth { 0 } else { 3 };

    let document = wire::DocumentInfo {
        doc_id: Some(doc_id.clone()),
        derivation: 1,
        offer_token: offer_token.clone(),
    };

    let pending_purchases = match buy.sku_params.get("enablePendingPurchases") {
        Some(ParamValue::Bool(v)) => *v,
        _ => false,
    };
    let cache_key = acquire_cache_key(
        &auth.account,
        &auth.device_id_hex,
        &[wire::CkDocument { doc_id: Some(doc_id), offer_token, flags: 1 }],
        &client.package_name,
        &[("enablePendingPurchases".to_string(), pending_purchases.to_string())],
        auth_frequency,
    );

    Ok(wire::AcquireRequest {
        document: Some(document),
        client: Some(wire::WireClientInfo {
            api_version: buy.api_version,
            package: client.package_name.clone(),
            version_code: client.version_code,
            signature_md5: client.signature_md5.clone(),
            sku_param: params_to_wire(&buy.sku_params),
            installer_package: device.store_package_name.clone(),
            old_sku_purchase_token: buy
                .old_sku_purchase_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            old_sku_purchase_id: buy
                .old_sku_purchase_id
                .clone()
                .filter(|t| !t.trim().is_empty()),
        }),
        client_token: build_client_token(device, auth),
        device_auth: Some(wire::DeviceAuthInfo {
            can_authenticate: true,
            auth_frequency,
            challenge_payload: None,
        }),
        device_id: auth.device_id_hex.clone(),
        cache_key,
        nonce: create_nonce(),
        theme: CLIENT_THEME,
        ts: Some(wire_timestamp()),
        server_context_token: None,
        action_context: Vec::new(),
        auth_tokens: Default::default(),
    })
}

/// Build a continuation request from the previous round trip.
///
/// Copy-then-patch: every field of the previous request is carried over
/// unchanged except the server context token, the appended action-context
/// blobs, the challenge payload, the `rpt` auth token, and the timestamp.
pub(crate) fn continue_acquire_request(
    previous_request: &wire::AcquireRequest,
    previous_response: &wire::AcquireResponse,
    action_context: &[Vec<u8>],
    challenge_result: Option<&str>,
    auth_token: Option<&str>,
) -> wire::AcquireRequest {
    let mut request = previous_request.clone();
    request.server_context_token = previous_response.server_context_token.clone();
    request
        .action_context
        .extend(action_context.iter().cloned());
    if let Some(challenge) = challenge_result.filter(|c| !c.is_empty()) {
        if let Some(device_auth) = request.device_auth.as_mut() {
            device_auth.challenge_payload = Some(challenge.to_string());
        }
    }
    if let Some(token) = auth_token {
        request.auth_tokens.insert("rpt".to_string(), token.to_string());
    }
    request.ts = Some(wire_timestamp());
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device() -> DeviceProfile {
        DeviceProfile {
            device: "walleye".to_string(),
            locale: "en-US".to_string(),
            store_package_name: "com.android.vending".to_string(),
            store_version_code: 81010200,
            ..Default::default()
        }
    }

    fn test_client() -> ClientIdentity {
        ClientIdentity::new("com.example.app", 42, "d41d8cd98f00b204e9800998ecf8427e")
    }

    fn test_auth() -> AuthContext {
        AuthContext::new("user@example.com", "tok", "3f2a77", "ck")
    }

    fn test_buy() -> BuyFlowParams {
        let mut buy = BuyFlowParams::new(17, "premium", "inapp");
        buy.needs_auth = false;
        buy
    }

    #[test]
    fn test_doc_id_composed_from_type_package_sku() {
        let doc = resolve_doc_id(&test_buy(), "com.example.app").unwrap();
        assert_eq!(doc.backend_doc_id, "inapp:com.example.app:premium");
        assert_eq!(doc.kind, 11);
        assert_eq!(doc.backend, 3);
    }

    #[test]
    fn test_serialized_doc_id_overrides_composition() {
        let original = wire::DocId {
            backend_doc_id: "subs:other.pkg:gold".to_string(),
            kind: 15,
            backend: 3,
        };
        let mut buy = test_buy();
        buy.serialized_doc_id = Some(URL_SAFE_NO_PAD.encode(original.encode_to_vec()));
        let doc = resolve_doc_id(&buy, "com.example.app").unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_unknown_sku_type_is_a_validation_error() {
        assert!(backend_doc_type("movie").is_err());
        assert_eq!(backend_doc_type("subs").unwrap(), 15);
    }

    #[test]
    fn test_cache_key_field_order() {
        let key = acquire_cache_key("user@example.com", "3f2a", &[], "com.example.app", &[], 3);
        assert_eq!(
            key,
            "user@example.com#simId=3f2a#clientTheme=2#fingerprintValid=false\
             #desiredAuthMethod=0#authFrequency=3#userHasFop=false\
             #callingAppPackageName=com.example.app"
        );
    }

    #[test]
    fn test_auth_frequency_follows_needs_auth() {
        let mut buy = test_buy();
        buy.needs_auth = true;
        let request =
            build_acquire_request(&test_device(), &test_client(), &test_auth(), &buy).unwrap();
        assert_eq!(request.device_auth.unwrap().auth_frequency, 0);

        buy.needs_auth = false;
        let request =
            build_acquire_request(&test_device(), &test_client(), &test_auth(), &buy).unwrap();
        assert_eq!(request.device_auth.unwrap().auth_frequency, 3);
    }

    #[test]
    fn test_continuation_patches_only_round_trip_fields() {
        let first =
            build_acquire_request(&test_device(), &test_client(), &test_auth(), &test_buy())
                .unwrap();
        let response = wire::AcquireResponse {
            server_context_token: Some(vec![7, 7, 7]),
            ..Default::default()
        };
        let ctx = vec![vec![0xea, 0x01]];
        let next =
            continue_acquire_request(&first, &response, &ctx, Some("challenge-token"), Some("rapt"));

        // Patched fields
        assert_eq!(next.server_context_token, Some(vec![7, 7, 7]));
        assert_eq!(next.action_context, ctx);
        assert_eq!(
            next.device_auth.as_ref().unwrap().challenge_payload.as_deref(),
            Some("challenge-token")
        );
        assert_eq!(next.auth_tokens.get("rpt").map(String::as_str), Some("rapt"));

        // Everything else carried over unchanged
        assert_eq!(next.document, first.document);
        assert_eq!(next.client, first.client);
        assert_eq!(next.client_token, first.client_token);
        assert_eq!(next.device_id, first.device_id);
        assert_eq!(next.cache_key, first.cache_key);
        assert_eq!(next.nonce, first.nonce);
        assert_eq!(next.theme, first.theme);
        assert_eq!(
            next.device_auth.as_ref().unwrap().auth_frequency,
            first.device_auth.as_ref().unwrap().auth_frequency
        );
    }

    #[test]
    fn test_nonce_is_fresh_per_request() {
        assert_ne!(create_nonce(), create_nonce());
        assert!(create_nonce().starts_with("nonce="));
    }
}
