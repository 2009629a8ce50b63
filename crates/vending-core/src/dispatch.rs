//! Request validation and dispatch façade.
//!
//! The externally callable surface of the engine. Caller input is
//! validated here, before any network traffic, and every call answers
//! with a [`ResultBundle`] in the fixed response-code domain — engine
//! errors are mapped to codes at this boundary and never leak out as
//! panics or empty results.

use crate::flow::{Action, BuyFlowEngine, FlowEvent};
use crate::services::EngineServices;
use std::sync::Arc;
use vending_types::response::{
    KEY_CONTINUATION_TOKEN, KEY_DATA_SIGNATURE_LIST, KEY_DETAILS_LIST, KEY_PURCHASE_DATA_LIST,
    KEY_PURCHASE_ITEM_LIST,
};
use vending_types::{
    AcknowledgePurchaseParams, BuyFlowParams, ConsumePurchaseParams, GetPurchaseHistoryParams,
    GetSkuDetailsParams, ParamMap, ParamValue, ResponseCode, ResultBundle,
};

/// SKU type strings accepted by the validator.
pub const SUPPORTED_SKU_TYPES: &[&str] = &[
    "subs",
    "inapp",
    "first_party",
    "audio_book",
    "book",
    "book_subs",
    "nest_subs",
    "play_pass_subs",
    "stadia_item",
    "stadia_subs",
    "movie",
    "tv_show",
    "tv_episode",
    "tv_season",
];

const MIN_API_VERSION: i32 = 3;
const MAX_API_VERSION: i32 = 17;

/// Outcome of starting a buy flow.
#[derive(Debug, Clone)]
pub struct StartedFlow {
    /// Token for subsequent flow calls; absent when validation failed
    pub flow_token: Option<String>,
    pub event: FlowEvent,
}

/// The engine's externally callable surface.
pub struct BillingService {
    services: Arc<EngineServices>,
    flows: BuyFlowEngine,
}

impl BillingService {
    pub fn new(services: EngineServices) -> Self {
        let services = Arc::new(services);
        Self { flows: BuyFlowEngine::new(Arc::clone(&services)), services }
    }

    /// Shared services, mainly for wiring and tests.
    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Validate an API version / SKU type combination.
    pub fn is_billing_supported(
        &self,
        api_version: i32,
        sku_type: &str,
        extra_params: Option<&ParamMap>,
    ) -> ResultBundle {
        if !(MIN_API_VERSION..=MAX_API_VERSION).contains(&api_version) {
            return ResultBundle::status(
                ResponseCode::BillingUnavailable,
                "Client does not support the requesting billing API.",
            );
        }
        if extra_params.is_some_and(|p| !p.is_empty()) && api_version < 7 {
            return ResultBundle::status(
                ResponseCode::DeveloperError,
                "ExtraParams was introduced in API version 7.",
            );
        }
        if sku_type.trim().is_empty() {
            return ResultBundle::status(ResponseCode::DeveloperError, "SKU type can't be empty.");
        }
        if !SUPPORTED_SKU_TYPES.contains(&sku_type) {
            return ResultBundle::status(
                ResponseCode::DeveloperError,
                format!("Invalid SKU type: {}", sku_type),
            );
        }
        let vr = matches!(
            extra_params.and_then(|p| p.get("vr")),
            Some(ParamValue::Bool(true))
        );
        if vr && sku_type == "subs" {
            return ResultBundle::status(
                ResponseCode::BillingUnavailable,
                "subscription is not supported in VR Mode.",
            );
        }
        ResultBundle::status(ResponseCode::Ok, "")
    }

    /// Look up SKU details for a sorted id list.
    pub async fn get_sku_details(
        &self,
        account: &str,
        package: &str,
        api_version: i32,
        sku_type: &str,
        mut sku_ids: Vec<String>,
        mut extra_params: ParamMap,
    ) -> ResultBundle {
        let supported = self.is_billing_supported(api_version, sku_type, None);
        if !supported.is_ok() {
            return supported;
        }
        if sku_ids.is_empty() {
            return ResultBundle::status(
                ResponseCode::DeveloperError,
                "SKU bundle must contain sku list",
            );
        }
        sku_ids.sort();
        if api_version < 9 && !extra_params.is_empty() {
            return ResultBundle::status(
                ResponseCode::DeveloperError,
                "Must specify an API version >= 9 to use this API.",
            );
        }
        let sku_package_name = match extra_params.remove("SKU_PACKAGE_NAME") {
            Some(ParamValue::Str(pkg)) => pkg,
            _ => String::new(),
        };
        let sdk_version = match extra_params.get("playBillingLibraryVersion") {
            Some(ParamValue::Str(version)) => version.clone(),
            _ => String::new(),
        };
        let params = GetSkuDetailsParams {
            api_version,
            sku_type: sku_type.to_string(),
            sku_ids,
            sku_package_name,
            sdk_version,
            extra_params,
        };

        let outcome = match self.services.session(package, account).await {
            Ok(session) => session.sku_details(&params).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(outcome) if outcome.bundle.is_ok() => {
                let mut bundle = outcome.bundle;
                bundle.insert(
                    KEY_DETAILS_LIST,
                    outcome
                        .items
                        .into_iter()
                        .map(|item| item.json_details)
                        .collect::<Vec<_>>(),
                );
                bundle
            }
            Ok(outcome) => outcome.bundle,
            Err(err) => ResultBundle::status(err.response_code(), err.to_string()),
        }
    }

    /// List locally tracked purchases of the given kind.
    pub fn get_purchases(
        &self,
        account: &str,
        package: &str,
        api_version: i32,
        sku_type: &str,
        extra_params: Option<&ParamMap>,
    ) -> ResultBundle {
        if api_version < 7 && extra_params.is_some_and(|p| !p.is_empty()) {
            return ResultBundle::status(ResponseCode::DeveloperError, "Parameter check error.");
        }
        let items = self.services.ledger.by_kind(account, package, sku_type);
        let mut bundle = ResultBundle::status(ResponseCode::Ok, "");
        bundle.insert(
            KEY_PURCHASE_ITEM_LIST,
            items.iter().map(|it| it.sku.clone()).collect::<Vec<_>>(),
        );
        bundle.insert(
            KEY_PURCHASE_DATA_LIST,
            items.iter().map(|it| it.json_data.clone()).collect::<Vec<_>>(),
        );
        bundle.insert(
            KEY_DATA_SIGNATURE_LIST,
            items.iter().map(|it| it.signature.clone()).collect::<Vec<_>>(),
        );
        bundle
    }

    /// Consume a purchase; the ledger entry is dropped on success.
    pub async fn consume_purchase(
        &self,
        account: &str,
        package: &str,
        api_version: i32,
        purchase_token: &str,
        extra_params: ParamMap,
    ) -> ResultBundle {
        if purchase_token.trim().is_empty() {
            return ResultBundle::status(
                ResponseCode::DeveloperError,
                "Purchase token can't be empty.",
            );
        }
        let params = ConsumePurchaseParams {
            api_version,
            purchase_token: purchase_token.to_string(),
            extra_params,
        };
        let outcome = match self.services.session(package, account).await {
            Ok(session) => session.consume_purchase(&params).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(bundle) => {
                if bundle.is_ok() {
                    self.services.ledger.remove(account, package, purchase_token);
                }
                bundle
            }
            Err(err) => ResultBundle::status(err.response_code(), err.to_string()),
        }
    }

    /// Acknowledge a purchase; the ledger entry is refreshed on success.
    pub async fn acknowledge_purchase(
        &self,
        account: &str,
        package: &str,
        api_version: i32,
        purchase_token: &str,
        extra_params: ParamMap,
    ) -> ResultBundle {
        if purchase_token.trim().is_empty() {
            return ResultBundle::status(
                ResponseCode::DeveloperError,
                "Purchase token can't be empty.",
            );
        }
        let params = AcknowledgePurchaseParams {
            api_version,
            purchase_token: purchase_token.to_string(),
            extra_params,
        };
        let outcome = match self.services.session(package, account).await {
            Ok(session) => session.acknowledge_purchase(&params).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(outcome) => {
                if outcome.bundle.is_ok() {
                    if let Some(item) = outcome.item {
                        self.services.ledger.update(account, package, item);
                    }
                }
                outcome.bundle
            }
            Err(err) => ResultBundle::status(err.response_code(), err.to_string()),
        }
    }

    /// Fetch one page of backend purchase history.
    pub async fn get_purchase_history(
        &self,
        account: &str,
        package: &str,
        api_version: i32,
        sku_type: &str,
        continuation_token: Option<String>,
        extra_params: ParamMap,
    ) -> ResultBundle {
        let supported = self.is_billing_supported(api_version, sku_type, None);
        if !supported.is_ok() {
            return supported;
        }
        let params = GetPurchaseHistoryParams {
            api_version,
            kind: sku_type.to_string(),
            continuation_token,
            extra_params,
        };
        let outcome = match self.services.session(package, account).await {
            Ok(session) => session.purchase_history(&params).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(outcome) if outcome.bundle.is_ok() => {
                let mut bundle = outcome.bundle;
                bundle.insert(
                    KEY_PURCHASE_ITEM_LIST,
                    outcome.items.iter().map(|it| it.sku.clone()).collect::<Vec<_>>(),
                );
                bundle.insert(
                    KEY_PURCHASE_DATA_LIST,
                    outcome
                        .items
                        .iter()
                        .map(|it| it.json_data.clone())
                        .collect::<Vec<_>>(),
                );
                bundle.insert(
                    KEY_DATA_SIGNATURE_LIST,
                    outcome
                        .items
                        .iter()
                        .map(|it| it.signature.clone())
                        .collect::<Vec<_>>(),
                );
                if let Some(token) = outcome.continuation_token {
                    bundle.insert(KEY_CONTINUATION_TOKEN, token);
                }
                bundle
            }
            Ok(outcome) => outcome.bundle,
            Err(err) => ResultBundle::status(err.response_code(), err.to_string()),
        }
    }

    /// Start a buy flow after validating its parameters.
    pub async fn start_flow(
        &self,
        account: &str,
        package: &str,
        mut buy_params: BuyFlowParams,
    ) -> StartedFlow {
        let supported = self.is_billing_supported(
            buy_params.api_version,
            &buy_params.sku_type,
            Some(&buy_params.sku_params),
        );
        if !supported.is_ok() {
            return StartedFlow { flow_token: None, event: FlowEvent::Finished { result: supported } };
        }
        if buy_params.sku.trim().is_empty() {
            return StartedFlow {
                flow_token: None,
                event: FlowEvent::Finished {
                    result: ResultBundle::status(ResponseCode::DeveloperError, "SKU can't be empty."),
                },
            };
        }
        buy_params.needs_auth = self.services.settings.auth_required();
        let (flow_token, event) = self.flows.start_flow(package, account, buy_params).await;
        StartedFlow { flow_token: Some(flow_token), event }
    }

    /// Deliver one click event to a flow.
    pub async fn submit_click(&self, flow_token: &str, action: Action) -> FlowEvent {
        self.flows.submit_click(flow_token, action).await
    }

    /// Deliver the collected password to a flow.
    pub async fn submit_password(
        &self,
        flow_token: &str,
        password: &str,
        always_require: bool,
    ) -> FlowEvent {
        self.flows.submit_password(flow_token, password, always_require).await
    }

    /// Signal completion of the external payment-method flow.
    pub async fn payment_method_updated(&self, flow_token: &str) -> FlowEvent {
        self.flows.payment_method_updated(flow_token).await
    }

    /// Cancel an outstanding flow.
    pub async fn cancel_flow(&self, flow_token: &str) -> FlowEvent {
        self.flows.cancel_flow(flow_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::providers::{
        AuthProvider, ChallengeSolver, DeviceIdentityProvider, MemorySettings, ProviderError,
    };
    use crate::transport::{HttpResponse, Transport};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use vending_types::{AuthContext, BillingError, BillingResult, ClientIdentity, DeviceProfile};

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn post(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _body: Vec<u8>,
            _content_type: &str,
        ) -> BillingResult<HttpResponse> {
            Err(BillingError::transport("no transport in this test"))
        }

        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _query: &[(String, String)],
        ) -> BillingResult<HttpResponse> {
            Err(BillingError::transport("no transport in this test"))
        }
    }

    struct NullAuth;

    #[async_trait]
    impl AuthProvider for NullAuth {
        async fn obtain(&self, account_id: &str) -> Result<AuthContext, ProviderError> {
            Ok(AuthContext::new(account_id, "tok", "0", ""))
        }
    }

    struct NullIdentity;

    #[async_trait]
    impl DeviceIdentityProvider for NullIdentity {
        async fn snapshot(&self) -> DeviceProfile {
            DeviceProfile::default()
        }

        async fn resolve(&self, package_name: &str) -> Result<ClientIdentity, ProviderError> {
            Ok(ClientIdentity::new(package_name, 1, ""))
        }
    }

    struct NullSolver;

    #[async_trait]
    impl ChallengeSolver for NullSolver {
        async fn solve(&self, _flow: &str, _challenge: HashMap<String, String>) -> String {
            String::new()
        }
    }

    fn service() -> BillingService {
        BillingService::new(EngineServices::new(
            Arc::new(NullAuth),
            Arc::new(NullIdentity),
            Arc::new(NullTransport),
            Arc::new(NullSolver),
            Arc::new(MemorySettings::new(false)),
            ApiConfig::with_base_url("http://billing.test"),
        ))
    }

    #[test]
    fn test_api_version_range_is_3_to_17() {
        let service = service();
        for version in [3, 10, 17] {
            assert!(
                service.is_billing_supported(version, "inapp", None).is_ok(),
                "version {} should be supported",
                version
            );
        }
        for version in [0, 2, 18, -1] {
            assert_eq!(
                service.is_billing_supported(version, "inapp", None).code(),
                Some(ResponseCode::BillingUnavailable.as_i32()),
                "version {} should be rejected",
                version
            );
        }
    }

    #[test]
    fn test_every_supported_sku_type_is_accepted() {
        let service = service();
        for sku_type in SUPPORTED_SKU_TYPES {
            assert!(service.is_billing_supported(17, sku_type, None).is_ok());
        }
    }

    #[test]
    fn test_unknown_and_empty_sku_types_are_developer_errors() {
        let service = service();
        for sku_type in ["", "  ", "gift_card", "INAPP"] {
            assert_eq!(
                service.is_billing_supported(17, sku_type, None).code(),
                Some(ResponseCode::DeveloperError.as_i32()),
                "type {:?} should be rejected",
                sku_type
            );
        }
    }

    #[test]
    fn test_extra_params_require_api_7() {
        let service = service();
        let mut extras = ParamMap::new();
        extras.insert("x".to_string(), ParamValue::Bool(true));
        assert_eq!(
            service.is_billing_supported(5, "inapp", Some(&extras)).code(),
            Some(ResponseCode::DeveloperError.as_i32())
        );
        assert!(service.is_billing_supported(7, "inapp", Some(&extras)).is_ok());
    }

    #[test]
    fn test_vr_subscriptions_are_unavailable() {
        let service = service();
        let mut extras = ParamMap::new();
        extras.insert("vr".to_string(), ParamValue::Bool(true));
        assert_eq!(
            service.is_billing_supported(17, "subs", Some(&extras)).code(),
            Some(ResponseCode::BillingUnavailable.as_i32())
        );
        assert!(service.is_billing_supported(17, "inapp", Some(&extras)).is_ok());
    }

    #[tokio::test]
    async fn test_sku_details_rejects_empty_id_list() {
        let service = service();
        let bundle = service
            .get_sku_details("a@b.c", "com.example.app", 17, "inapp", Vec::new(), ParamMap::new())
            .await;
        assert_eq!(bundle.code(), Some(ResponseCode::DeveloperError.as_i32()));
    }

    #[tokio::test]
    async fn test_empty_purchase_token_is_rejected_before_network() {
        let service = service();
        let bundle = service
            .consume_purchase("a@b.c", "com.example.app", 17, "", ParamMap::new())
            .await;
        assert_eq!(bundle.code(), Some(ResponseCode::DeveloperError.as_i32()));
    }
}
