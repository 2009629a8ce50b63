//! Response code domain and ordered result bundles.
//!
//! Every externally visible operation answers with a [`ResultBundle`]: an
//! insertion-ordered list of key/value pairs that always carries a numeric
//! response code and optionally a debug message plus protocol payload keys.
//! The code domain is fixed here regardless of what the backend reports;
//! backend-specific codes are mapped at the dispatch boundary.

use serde::{Deserialize, Serialize};

/// Well-known bundle key for the numeric response code.
pub const KEY_RESPONSE_CODE: &str = "RESPONSE_CODE";
/// Well-known bundle key for the human-readable debug message.
pub const KEY_DEBUG_MESSAGE: &str = "DEBUG_MESSAGE";
/// Raw purchase data JSON attached to a successful purchase.
pub const KEY_PURCHASE_DATA: &str = "INAPP_PURCHASE_DATA";
/// Signature over [`KEY_PURCHASE_DATA`].
pub const KEY_DATA_SIGNATURE: &str = "INAPP_DATA_SIGNATURE";
/// SKU id list key in list-style results.
pub const KEY_PURCHASE_ITEM_LIST: &str = "INAPP_PURCHASE_ITEM_LIST";
/// Purchase data JSON list key in list-style results.
pub const KEY_PURCHASE_DATA_LIST: &str = "INAPP_PURCHASE_DATA_LIST";
/// Signature list key in list-style results.
pub const KEY_DATA_SIGNATURE_LIST: &str = "INAPP_DATA_SIGNATURE_LIST";
/// Continuation token key for paged history results.
pub const KEY_CONTINUATION_TOKEN: &str = "INAPP_CONTINUATION_TOKEN";
/// SKU details JSON list key.
pub const KEY_DETAILS_LIST: &str = "DETAILS_LIST";

/// Fixed response code domain exposed to callers.
///
/// Values match the classic billing result ordinals; backend-specific codes
/// never leak through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ResponseCode {
    /// Success.
    Ok = 0,
    /// User pressed back or canceled a dialog.
    UserCanceled = 1,
    /// Network connection is down or the service is unreachable.
    ServiceUnavailable = 2,
    /// The billing API version is not supported for the requested type.
    BillingUnavailable = 3,
    /// Requested product is not available for purchase.
    ItemUnavailable = 4,
    /// Invalid arguments provided by the caller.
    DeveloperError = 5,
    /// Fatal error during the API action.
    Error = 6,
    /// Failure to purchase since the item is already owned.
    ItemAlreadyOwned = 7,
    /// Failure to consume since the item is not owned.
    ItemNotOwned = 8,
}

impl ResponseCode {
    /// Numeric wire value of this code.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A single value stored in a [`ResultBundle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    Str(String),
    StrList(Vec<String>),
}

impl From<bool> for BundleValue {
    fn from(v: bool) -> Self {
        BundleValue::Bool(v)
    }
}

impl From<i32> for BundleValue {
    fn from(v: i32) -> Self {
        BundleValue::I32(v)
    }
}

impl From<i64> for BundleValue {
    fn from(v: i64) -> Self {
        BundleValue::I64(v)
    }
}

impl From<&str> for BundleValue {
    fn from(v: &str) -> Self {
        BundleValue::Str(v.to_string())
    }
}

impl From<String> for BundleValue {
    fn from(v: String) -> Self {
        BundleValue::Str(v)
    }
}

impl From<Vec<String>> for BundleValue {
    fn from(v: Vec<String>) -> Self {
        BundleValue::StrList(v)
    }
}

/// Insertion-ordered key/value result map.
///
/// Keys are unique; inserting an existing key replaces the value in place
/// without disturbing the original ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    entries: Vec<(String, BundleValue)>,
}

impl ResultBundle {
    /// Empty bundle with no response code yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle carrying a response code and debug message.
    pub fn status(code: ResponseCode, message: impl Into<String>) -> Self {
        let mut bundle = Self::new();
        bundle.insert(KEY_RESPONSE_CODE, BundleValue::I32(code.as_i32()));
        bundle.insert(KEY_DEBUG_MESSAGE, BundleValue::Str(message.into()));
        bundle
    }

    /// Bundle carrying a raw backend code and debug message.
    pub fn raw_status(code: i32, message: impl Into<String>) -> Self {
        let mut bundle = Self::new();
        bundle.insert(KEY_RESPONSE_CODE, BundleValue::I32(code));
        bundle.insert(KEY_DEBUG_MESSAGE, BundleValue::Str(message.into()));
        bundle
    }

    /// Insert or replace a value, preserving insertion order for new keys.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<BundleValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&BundleValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(BundleValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(BundleValue::I32(v)) => Some(*v),
            Some(BundleValue::I64(v)) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// The numeric response code, if one has been set.
    pub fn code(&self) -> Option<i32> {
        self.get_i32(KEY_RESPONSE_CODE)
    }

    pub fn debug_message(&self) -> Option<&str> {
        self.get_str(KEY_DEBUG_MESSAGE)
    }

    /// True when the bundle carries a zero response code.
    pub fn is_ok(&self) -> bool {
        self.code() == Some(ResponseCode::Ok.as_i32())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BundleValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
