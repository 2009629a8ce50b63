//! Request parameter structs for the protocol operations.
//!
//! Flat parameter bags consumed by the request-assembly functions in the
//! core crate. Extra parameters keep their caller-supplied types via
//! [`ParamValue`] so they can be encoded field-by-field on the wire;
//! `BTreeMap` keeps the encoding deterministic, which matters for the
//! content-addressed response cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed extra parameter supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    I64(i64),
    Str(String),
    StrList(Vec<String>),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::I64(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::StrList(v)
    }
}

/// Ordered extra-parameter map.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Parameters fixed at the start of one purchase negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyFlowParams {
    pub api_version: i32,
    pub sku: String,
    pub sku_type: String,
    pub developer_payload: String,
    pub sdk_version: String,
    /// Whether the user must authenticate before purchasing
    pub needs_auth: bool,
    /// Caller-supplied extra parameters carried into the request
    pub sku_params: ParamMap,
    /// Pre-encoded document id (base64url), overrides `type:package:sku`
    pub serialized_doc_id: Option<String>,
    /// Offer id token attached to the document info
    pub offer_id_token: Option<String>,
    /// Purchase token of the subscription being replaced
    pub old_sku_purchase_token: Option<String>,
    /// Purchase id of the subscription being replaced
    pub old_sku_purchase_id: Option<String>,
}

impl BuyFlowParams {
    pub fn new(api_version: i32, sku: impl Into<String>, sku_type: impl Into<String>) -> Self {
        Self {
            api_version,
            sku: sku.into(),
            sku_type: sku_type.into(),
            developer_payload: String::new(),
            sdk_version: String::new(),
            needs_auth: false,
            sku_params: ParamMap::new(),
            serialized_doc_id: None,
            offer_id_token: None,
            old_sku_purchase_token: None,
            old_sku_purchase_id: None,
        }
    }
}

/// Parameters for a SKU details lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSkuDetailsParams {
    pub api_version: i32,
    pub sku_type: String,
    /// SKU ids to look up, sorted by the dispatcher for cache stability
    pub sku_ids: Vec<String>,
    /// Package owning the SKUs when different from the caller
    pub sku_package_name: String,
    /// Billing library version reported by the caller
    pub sdk_version: String,
    pub extra_params: ParamMap,
}

/// Parameters for consuming a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumePurchaseParams {
    pub api_version: i32,
    pub purchase_token: String,
    pub extra_params: ParamMap,
}

/// Parameters for acknowledging a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcknowledgePurchaseParams {
    pub api_version: i32,
    pub purchase_token: String,
    pub extra_params: ParamMap,
}

/// Parameters for a purchase-history page fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPurchaseHistoryParams {
    pub api_version: i32,
    pub kind: String,
    pub continuation_token: Option<String>,
    pub extra_params: ParamMap,
}
