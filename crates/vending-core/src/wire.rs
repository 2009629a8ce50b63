//! Wire message schema for the storefront protocol.
//!
//! Hand-written `prost` messages covering the subset of the storefront's
//! binary schema that the engine speaks: SKU details, acquire (the
//! purchase negotiation), consume, acknowledge, and purchase history.
//! Field numbers are stable within this crate's versioning; unknown fields
//! sent by the backend are skipped by prost during decode.
//!
//! The action graph is deliberately recursive: every wrapper message may
//! carry at most one nested action, and the parser in [`crate::flow`]
//! flattens the chain into a single terminal action.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Common leaf messages
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// Typed key/value parameter as sent on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuParam {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bool, optional, tag = "2")]
    pub bv: Option<bool>,
    #[prost(int64, optional, tag = "3")]
    pub i64v: Option<i64>,
    #[prost(string, optional, tag = "4")]
    pub sv: Option<String>,
    #[prost(string, repeated, tag = "5")]
    pub sv_list: Vec<String>,
}

/// Container for extra parameters attached to form-encoded operations.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ExtraParams {
    #[prost(message, repeated, tag = "1")]
    pub sku_param: Vec<SkuParam>,
}

/// Server-declared failure payload carried inside otherwise-2xx responses.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FailedResponse {
    #[prost(int32, tag = "1")]
    pub status_code: i32,
    #[prost(string, tag = "2")]
    pub msg: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BundleItem {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(bool, optional, tag = "2")]
    pub bv: Option<bool>,
    #[prost(int32, optional, tag = "3")]
    pub i32v: Option<i32>,
    #[prost(int64, optional, tag = "4")]
    pub i64v: Option<i64>,
    #[prost(string, optional, tag = "5")]
    pub sv: Option<String>,
    #[prost(string, repeated, tag = "6")]
    pub s_list: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseBundle {
    #[prost(message, repeated, tag = "1")]
    pub item: Vec<BundleItem>,
}

/// Composite document identifier, `kind:package:sku` in its backend form.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DocId {
    #[prost(string, tag = "1")]
    pub backend_doc_id: String,
    #[prost(int32, tag = "2")]
    pub kind: i32,
    #[prost(int32, tag = "3")]
    pub backend: i32,
}

// ---------------------------------------------------------------------------
// SKU details
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuDetailsExtra {
    #[prost(string, tag = "1")]
    pub version: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuDetailsRequest {
    #[prost(int32, tag = "1")]
    pub api_version: i32,
    #[prost(string, tag = "2")]
    pub sku_type: String,
    #[prost(string, tag = "3")]
    pub package: String,
    #[prost(bool, tag = "4")]
    pub is_wifi: bool,
    #[prost(string, tag = "5")]
    pub sku_package: String,
    #[prost(string, repeated, tag = "6")]
    pub sku_id: Vec<String>,
    #[prost(message, optional, tag = "7")]
    pub extra: Option<SkuDetailsExtra>,
    #[prost(message, repeated, tag = "8")]
    pub multi_offer: Vec<SkuParam>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuItem {
    #[prost(string, tag = "1")]
    pub token: String,
    #[prost(message, optional, tag = "2")]
    pub doc_id: Option<DocId>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuInfo {
    #[prost(message, repeated, tag = "1")]
    pub item: Vec<SkuItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuDetailsEntry {
    /// JSON details blob handed to the caller verbatim
    #[prost(string, tag = "1")]
    pub sku_details: String,
    #[prost(message, optional, tag = "2")]
    pub sku_info: Option<SkuInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SkuDetailsResponse {
    #[prost(message, optional, tag = "1")]
    pub failed: Option<FailedResponse>,
    #[prost(message, repeated, tag = "2")]
    pub details: Vec<SkuDetailsEntry>,
}

// ---------------------------------------------------------------------------
// Acquire request
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct DocumentInfo {
    #[prost(message, optional, tag = "1")]
    pub doc_id: Option<DocId>,
    #[prost(int32, tag = "2")]
    pub derivation: i32,
    #[prost(string, optional, tag = "3")]
    pub offer_token: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireClientInfo {
    #[prost(int32, tag = "1")]
    pub api_version: i32,
    #[prost(string, tag = "2")]
    pub package: String,
    #[prost(int32, tag = "3")]
    pub version_code: i32,
    #[prost(string, tag = "4")]
    pub signature_md5: String,
    #[prost(message, repeated, tag = "5")]
    pub sku_param: Vec<SkuParam>,
    #[prost(string, tag = "6")]
    pub installer_package: String,
    #[prost(string, optional, tag = "7")]
    pub old_sku_purchase_token: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub old_sku_purchase_id: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceAuthInfo {
    #[prost(bool, tag = "1")]
    pub can_authenticate: bool,
    /// 0 = authenticate on every purchase, 3 = per session
    #[prost(int32, tag = "2")]
    pub auth_frequency: i32,
    #[prost(string, optional, tag = "3")]
    pub challenge_payload: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcquireRequest {
    #[prost(message, optional, tag = "1")]
    pub document: Option<DocumentInfo>,
    #[prost(message, optional, tag = "2")]
    pub client: Option<WireClientInfo>,
    /// base64url client-identity token
    #[prost(string, tag = "3")]
    pub client_token: String,
    #[prost(message, optional, tag = "4")]
    pub device_auth: Option<DeviceAuthInfo>,
    #[prost(string, tag = "5")]
    pub device_id: String,
    /// `#`-joined correlation key, stable across a negotiation
    #[prost(string, tag = "6")]
    pub cache_key: String,
    #[prost(string, tag = "7")]
    pub nonce: String,
    #[prost(int32, tag = "8")]
    pub theme: i32,
    #[prost(message, optional, tag = "9")]
    pub ts: Option<Timestamp>,
    /// Carried forward from the previous response on continuations
    #[prost(bytes = "vec", optional, tag = "10")]
    pub server_context_token: Option<Vec<u8>>,
    /// Accumulated across round trips, never rewritten
    #[prost(bytes = "vec", repeated, tag = "11")]
    pub action_context: Vec<Vec<u8>>,
    #[prost(map = "string, string", tag = "12")]
    pub auth_tokens: HashMap<String, String>,
}

/// Document entry encoded into the acquire cache key.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CkDocument {
    #[prost(message, optional, tag = "1")]
    pub doc_id: Option<DocId>,
    #[prost(string, optional, tag = "2")]
    pub offer_token: Option<String>,
    #[prost(int32, tag = "3")]
    pub flags: i32,
}

// ---------------------------------------------------------------------------
// Client-identity token
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct StoreInstallInfo {
    #[prost(string, tag = "1")]
    pub package: String,
    #[prost(string, tag = "2")]
    pub version_code: String,
    #[prost(int64, tag = "3")]
    pub last_update_time: i64,
    #[prost(int64, tag = "4")]
    pub first_install_time: i64,
    #[prost(string, tag = "5")]
    pub source_dir: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TokenEnvInfo {
    #[prost(int32, tag = "1")]
    pub battery_level: i32,
    #[prost(int64, tag = "2")]
    pub time_zone_offset: i64,
    #[prost(bool, tag = "3")]
    pub is_adb_enabled: bool,
    #[prost(bool, tag = "4")]
    pub install_non_market_apps: bool,
    #[prost(string, tag = "5")]
    pub iso3_language: String,
    #[prost(string, repeated, tag = "6")]
    pub net_address: Vec<String>,
    #[prost(string, tag = "7")]
    pub locale: String,
    #[prost(string, tag = "8")]
    pub network_operator: String,
    #[prost(string, tag = "9")]
    pub sim_operator: String,
    #[prost(int32, tag = "10")]
    pub phone_type: i32,
    #[prost(int64, tag = "11")]
    pub uptime_millis: i64,
    #[prost(string, tag = "12")]
    pub time_zone: String,
    #[prost(int32, tag = "13")]
    pub account_count: i32,
    #[prost(message, optional, tag = "14")]
    pub store_install: Option<StoreInstallInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TokenDeviceInfo {
    #[prost(string, tag = "1")]
    pub device: String,
    #[prost(string, tag = "2")]
    pub product: String,
    #[prost(string, tag = "3")]
    pub model: String,
    #[prost(string, tag = "4")]
    pub manufacturer: String,
    #[prost(string, tag = "5")]
    pub fingerprint: String,
    #[prost(string, tag = "6")]
    pub release: String,
    #[prost(string, tag = "7")]
    pub brand: String,
    #[prost(string, tag = "8")]
    pub serial: String,
    #[prost(bool, tag = "9")]
    pub is_emulator: bool,
    #[prost(int32, tag = "10")]
    pub width_pixels: i32,
    #[prost(int32, tag = "11")]
    pub height_pixels: i32,
    #[prost(int32, tag = "12")]
    pub density_dpi: i32,
    #[prost(string, tag = "13")]
    pub store_package: String,
    #[prost(string, tag = "14")]
    pub store_version_code: String,
    #[prost(string, tag = "15")]
    pub store_version_name: String,
    /// Numeric device identifier from checkin
    #[prost(int64, tag = "16")]
    pub gsf_id: i64,
    #[prost(message, optional, tag = "17")]
    pub env: Option<TokenEnvInfo>,
    #[prost(string, tag = "18")]
    pub market_client_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientToken {
    #[prost(message, optional, tag = "1")]
    pub device: Option<TokenDeviceInfo>,
    #[prost(string, tag = "2")]
    pub locale: String,
    #[prost(int64, tag = "3")]
    pub store_version_code: i64,
    #[prost(string, repeated, tag = "4")]
    pub accounts: Vec<String>,
    /// Orchestration return link reported by real clients
    #[prost(string, tag = "5")]
    pub referrer: String,
}

// ---------------------------------------------------------------------------
// Action graph
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct UiInfo {
    #[prost(int32, tag = "1")]
    pub class_type: i32,
    #[prost(int32, tag = "2")]
    pub ui_type: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimerAction {
    #[prost(int64, tag = "1")]
    pub delay_millis: i64,
    #[prost(message, optional, tag = "2")]
    pub response_bundle: Option<ResponseBundle>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChallengeRequest {
    #[prost(map = "string, string", tag = "1")]
    pub map: HashMap<String, String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ActionExt {
    #[prost(message, optional, boxed, tag = "1")]
    pub action: Option<Box<WireAction>>,
    #[prost(message, optional, tag = "2")]
    pub challenge: Option<ChallengeRequest>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShowAction {
    #[prost(string, tag = "1")]
    pub screen_id: String,
    #[prost(message, optional, boxed, tag = "2")]
    pub action: Option<Box<WireAction>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ViewClickAction {
    #[prost(message, optional, tag = "1")]
    pub ui_info: Option<UiInfo>,
    #[prost(message, optional, boxed, tag = "2")]
    pub action: Option<Box<WireAction>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OptionalAction {
    #[prost(message, optional, boxed, tag = "1")]
    pub action: Option<Box<WireAction>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavigateAction {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(message, optional, boxed, tag = "2")]
    pub action: Option<Box<WireAction>>,
}

/// One link of the nested action wrapper chain.
#[derive(Clone, PartialEq, prost::Message)]
pub struct WireAction {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub action_context: Option<Vec<u8>>,
    #[prost(message, optional, tag = "2")]
    pub timer: Option<TimerAction>,
    #[prost(message, optional, boxed, tag = "3")]
    pub ext: Option<Box<ActionExt>>,
    #[prost(message, optional, boxed, tag = "4")]
    pub show: Option<Box<ShowAction>>,
    #[prost(message, optional, boxed, tag = "5")]
    pub view_click: Option<Box<ViewClickAction>>,
    #[prost(message, optional, boxed, tag = "6")]
    pub optional: Option<Box<OptionalAction>>,
    #[prost(message, optional, boxed, tag = "7")]
    pub navigate: Option<Box<NavigateAction>>,
}

// ---------------------------------------------------------------------------
// Acquire response
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireScreen {
    #[prost(message, optional, tag = "1")]
    pub ui_info: Option<UiInfo>,
    /// Opaque component subtree passed through to the renderer
    #[prost(bytes = "vec", optional, tag = "2")]
    pub components: Option<Vec<u8>>,
    #[prost(message, optional, tag = "3")]
    pub action: Option<WireAction>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseResponse {
    #[prost(message, optional, tag = "1")]
    pub response_bundle: Option<ResponseBundle>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseData {
    #[prost(string, tag = "1")]
    pub json_data: String,
    #[prost(string, tag = "2")]
    pub signature: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseItemData {
    #[prost(message, optional, tag = "1")]
    pub doc_id: Option<DocId>,
    #[prost(message, optional, tag = "2")]
    pub inapp: Option<PurchaseData>,
    #[prost(message, optional, tag = "3")]
    pub subs: Option<PurchaseData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseItemGroup {
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<PurchaseItemData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OwnedPurchases {
    #[prost(message, repeated, tag = "1")]
    pub purchase_item: Vec<PurchaseItemGroup>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcquireResultInfo {
    #[prost(message, optional, tag = "1")]
    pub purchase_response: Option<PurchaseResponse>,
    #[prost(message, optional, tag = "2")]
    pub owned_purchase: Option<OwnedPurchases>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcquireResponse {
    #[prost(message, optional, tag = "1")]
    pub action: Option<WireAction>,
    #[prost(map = "string, message", tag = "2")]
    pub screen_map: HashMap<String, WireScreen>,
    #[prost(message, optional, tag = "3")]
    pub result: Option<AcquireResultInfo>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub server_context_token: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Consume / acknowledge / history
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcknowledgePurchaseRequest {
    #[prost(string, tag = "1")]
    pub purchase_token: String,
    #[prost(string, optional, tag = "2")]
    pub developer_payload: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcknowledgePurchaseResponse {
    #[prost(message, optional, tag = "1")]
    pub failed: Option<FailedResponse>,
    #[prost(message, optional, tag = "2")]
    pub purchase_item: Option<PurchaseItemGroup>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConsumePurchaseResponse {
    #[prost(message, optional, tag = "1")]
    pub failed: Option<FailedResponse>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseHistoryResponse {
    #[prost(message, optional, tag = "1")]
    pub failed: Option<FailedResponse>,
    #[prost(string, repeated, tag = "2")]
    pub product_id: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub purchase_json: Vec<String>,
    #[prost(string, repeated, tag = "4")]
    pub signature: Vec<String>,
    #[prost(string, optional, tag = "5")]
    pub continuation_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponsePayload {
    #[prost(message, optional, tag = "1")]
    pub sku_details: Option<SkuDetailsResponse>,
    #[prost(message, optional, tag = "2")]
    pub acquire: Option<AcquireResponse>,
    #[prost(message, optional, tag = "3")]
    pub consume_purchase: Option<ConsumePurchaseResponse>,
    #[prost(message, optional, tag = "4")]
    pub acknowledge_purchase: Option<AcknowledgePurchaseResponse>,
    #[prost(message, optional, tag = "5")]
    pub purchase_history: Option<PurchaseHistoryResponse>,
}

/// Envelope wrapping every backend response body.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseWrapper {
    #[prost(message, optional, tag = "1")]
    pub payload: Option<ResponsePayload>,
}
