//! Purchased item model.

use serde::{Deserialize, Serialize};

/// One purchased item as tracked by the ledger.
///
/// Identity is the purchase token alone; two items with the same token are
/// the same purchase regardless of any other field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseItem {
    /// Item kind tag (`inapp`, `subs`, ...)
    pub kind: String,
    /// SKU identifier within the owning package
    pub sku: String,
    /// Package that owns the purchase
    pub package_name: String,
    /// Opaque purchase token, the item's identity
    pub purchase_token: String,
    /// Purchase state reported by the backend
    pub purchase_state: i32,
    /// Raw purchase data JSON as received
    pub json_data: String,
    /// Signature over `json_data`
    pub signature: String,
}

impl PartialEq for PurchaseItem {
    fn eq(&self, other: &Self) -> bool {
        self.purchase_token == other.purchase_token
    }
}

impl Eq for PurchaseItem {}

impl std::hash::Hash for PurchaseItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.purchase_token.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(token: &str, sku: &str) -> PurchaseItem {
        PurchaseItem {
            kind: "inapp".to_string(),
            sku: sku.to_string(),
            package_name: "com.example.app".to_string(),
            purchase_token: token.to_string(),
            purchase_state: 0,
            json_data: "{}".to_string(),
            signature: "sig".to_string(),
        }
    }

    #[test]
    fn test_identity_is_purchase_token() {
        assert_eq!(item("tok-1", "sku_a"), item("tok-1", "sku_b"));
        assert_ne!(item("tok-1", "sku_a"), item("tok-2", "sku_a"));
    }
}
