//! Endpoint and transport configuration.
//!
//! Injected into the transport layer and protocol sessions; never read
//! from global state so tests can point the engine at a local server.

use std::time::Duration;

/// Fixed request timeout applied to every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Backend endpoints used by the protocol client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the storefront frontend API
    pub base_url: String,
    /// Endpoint of the password-proof token exchange
    pub auth_proof_url: String,
    /// Outbound request timeout
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://play-fe.googleapis.com/fdfe".to_string(),
            auth_proof_url: "https://playatoms-pa.googleapis.com/v1/users/me/authproofs".to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl ApiConfig {
    /// Config pointing every endpoint at `base`, for tests and local mocks.
    pub fn with_base_url(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            auth_proof_url: format!("{}/authProofTokens", base),
            base_url: base,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn sku_details_url(&self) -> String {
        format!("{}/skuDetails", self.base_url)
    }

    pub fn acquire_url(&self, theme: i32) -> String {
        format!("{}/ees/acquire?theme={}", self.base_url, theme)
    }

    pub fn consume_purchase_url(&self) -> String {
        format!("{}/consumePurchase", self.base_url)
    }

    pub fn acknowledge_purchase_url(&self) -> String {
        format!("{}/acknowledgePurchase", self.base_url)
    }

    pub fn purchase_history_url(&self) -> String {
        format!("{}/purchaseHistory", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_derive_from_base() {
        let config = ApiConfig::with_base_url("http://127.0.0.1:9090");
        assert_eq!(config.sku_details_url(), "http://127.0.0.1:9090/skuDetails");
        assert_eq!(config.acquire_url(2), "http://127.0.0.1:9090/ees/acquire?theme=2");
    }
}
