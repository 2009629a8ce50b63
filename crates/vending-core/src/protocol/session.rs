//! Protocol session and its five operations.
//!
//! A session binds one `(package, account)` pair to a credential set and
//! device snapshot and owns the wire-level conversation: request assembly,
//! transport, envelope decoding, and normalization of failure payloads
//! into result bundles. Sessions are cheap to rebuild and are cached with
//! a short TTL by [`crate::cache::SessionCache`].

use crate::cache::ResponseCache;
use crate::config::ApiConfig;
use crate::flow::parser::{self, ParsedAcquire};
use crate::protocol::assemble;
use crate::protocol::headers::{base_headers, default_headers};
use crate::transport::{Transport, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF};
use crate::wire;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use prost::Message;
use std::collections::HashMap;
use std::sync::Arc;
use vending_types::{
    AcknowledgePurchaseParams, AuthContext, BillingError, BillingResult, BuyFlowParams,
    ClientIdentity, ConsumePurchaseParams, DeviceProfile, GetPurchaseHistoryParams,
    GetSkuDetailsParams, PurchaseItem, ResponseCode, ResultBundle,
};

/// Parameters for one acquire round trip.
pub struct AcquireParams<'a> {
    pub buy_params: &'a BuyFlowParams,
    /// Action-context blobs to append on this round trip
    pub action_context: Vec<Vec<u8>>,
    /// Solved anti-abuse challenge token, when available
    pub challenge_result: Option<String>,
    /// Additional auth proof token keyed `rpt`
    pub auth_token: Option<String>,
    /// Outcome of the previous round trip; `None` starts a negotiation
    pub previous: Option<&'a AcquireOutcome>,
}

/// Result of one acquire round trip, kept for continuation building.
#[derive(Debug, Clone)]
pub struct AcquireOutcome {
    pub request: wire::AcquireRequest,
    pub response: wire::AcquireResponse,
    pub parsed: ParsedAcquire,
}

/// One SKU details entry: the JSON blob plus its document id map.
#[derive(Debug, Clone)]
pub struct SkuDetailsItem {
    pub json_details: String,
    pub doc_ids: HashMap<String, wire::DocId>,
}

#[derive(Debug, Clone)]
pub struct SkuDetailsOutcome {
    pub items: Vec<SkuDetailsItem>,
    pub bundle: ResultBundle,
}

#[derive(Debug, Clone)]
pub struct AcknowledgeOutcome {
    pub item: Option<PurchaseItem>,
    pub bundle: ResultBundle,
}

#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub sku: String,
    pub json_data: String,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct HistoryOutcome {
    pub items: Vec<HistoryItem>,
    pub continuation_token: Option<String>,
    pub bundle: ResultBundle,
}

/// Result of the password-proof exchange.
#[derive(Debug, Clone)]
pub struct AuthProofOutcome {
    pub status: u16,
    pub token: Option<String>,
}

/// A live protocol conversation for one `(package, account)` pair.
pub struct ProtocolSession {
    auth: AuthContext,
    device: DeviceProfile,
    client: ClientIdentity,
    transport: Arc<dyn Transport>,
    config: Arc<ApiConfig>,
    sku_cache: Arc<ResponseCache>,
}

impl ProtocolSession {
    pub fn new(
        auth: AuthContext,
        device: DeviceProfile,
        client: ClientIdentity,
        transport: Arc<dyn Transport>,
        config: Arc<ApiConfig>,
        sku_cache: Arc<ResponseCache>,
    ) -> Self {
        Self { auth, device, client, transport, config, sku_cache }
    }

    pub fn account(&self) -> &str {
        &self.auth.account
    }

    pub fn package_name(&self) -> &str {
        &self.client.package_name
    }

    fn decode_payload(body: &[u8]) -> BillingResult<wire::ResponsePayload> {
        let wrapper = wire::ResponseWrapper::decode(body)
            .map_err(|e| BillingError::protocol(format!("undecodable response: {}", e)))?;
        wrapper
            .payload
            .ok_or_else(|| BillingError::protocol("response envelope missing payload"))
    }

    async fn post_protobuf(&self, url: &str, body: Vec<u8>) -> BillingResult<Vec<u8>> {
        let headers = default_headers(&self.auth, &self.device);
        let response = self
            .transport
            .post(url, &headers, body, CONTENT_TYPE_PROTOBUF)
            .await?;
        if !response.is_success() {
            return Err(BillingError::transport(format!(
                "request failed with status {}",
                response.status
            )));
        }
        Ok(response.body.to_vec())
    }

    /// Look up SKU details, serving repeats from the response cache.
    pub async fn sku_details(
        &self,
        params: &GetSkuDetailsParams,
    ) -> BillingResult<SkuDetailsOutcome> {
        let request = wire::SkuDetailsRequest {
            api_version: params.api_version,
            sku_type: params.sku_type.clone(),
            package: self.client.package_name.clone(),
            is_wifi: true,
            sku_package: params.sku_package_name.clone(),
            sku_id: params.sku_ids.clone(),
            extra: Some(wire::SkuDetailsExtra { version: params.sdk_version.clone() }),
            multi_offer: assemble::params_to_wire(&params.extra_params),
        };
        let body = request.encode_to_vec();

        if let Some(cached) = self.sku_cache.get(&body) {
            tracing::debug!("[ProtocolClient] skuDetails served from cache");
            return Self::parse_sku_details(&Self::decode_payload(&cached)?);
        }

        let response_body = self.post_protobuf(&self.config.sku_details_url(), body.clone()).await?;
        self.sku_cache.put(&body, response_body.clone());
        Self::parse_sku_details(&Self::decode_payload(&response_body)?)
    }

    fn parse_sku_details(payload: &wire::ResponsePayload) -> BillingResult<SkuDetailsOutcome> {
        let response = payload
            .sku_details
            .as_ref()
            .ok_or_else(|| BillingError::protocol("missing skuDetails payload"))?;
        if let Some(failed) = &response.failed {
            return Ok(SkuDetailsOutcome {
                items: Vec::new(),
                bundle: ResultBundle::raw_status(failed.status_code, failed.msg.clone()),
            });
        }
        let items = response
            .details
            .iter()
            .filter(|entry| !entry.sku_details.trim().is_empty())
            .map(|entry| SkuDetailsItem {
                json_details: entry.sku_details.clone(),
                doc_ids: entry
                    .sku_info
                    .as_ref()
                    .map(|info| {
                        info.item
                            .iter()
                            .filter_map(|item| {
                                item.doc_id.clone().map(|doc| (item.token.clone(), doc))
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();
        Ok(SkuDetailsOutcome { items, bundle: ResultBundle::status(ResponseCode::Ok, "") })
    }

    /// Start or advance a purchase negotiation.
    pub async fn acquire(&self, params: AcquireParams<'_>) -> BillingResult<AcquireOutcome> {
        let request = match params.previous {
            None => assemble::build_acquire_request(
                &self.device,
                &self.client,
                &self.auth,
                params.buy_params,
            )?,
            Some(previous) => assemble::continue_acquire_request(
                &previous.request,
                &previous.response,
                &params.action_context,
                params.challenge_result.as_deref(),
                params.auth_token.as_deref(),
            ),
        };

        let url = self.config.acquire_url(request.theme);
        let response_body = self.post_protobuf(&url, request.encode_to_vec()).await?;
        let response = Self::decode_payload(&response_body)?
            .acquire
            .ok_or_else(|| BillingError::protocol("missing acquire payload"))?;
        let parsed = parser::parse_acquire_response(params.buy_params, &response);
        tracing::debug!(
            "[ProtocolClient] acquire round trip: {} screens, {} items",
            parsed.screens.len(),
            parsed.purchase_items.len()
        );
        Ok(AcquireOutcome { request, response, parsed })
    }

    /// Consume a purchase token.
    pub async fn consume_purchase(
        &self,
        params: &ConsumePurchaseParams,
    ) -> BillingResult<ResultBundle> {
        let iabx = wire::ExtraParams { sku_param: assemble::params_to_wire(&params.extra_params) };
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("pt", &params.purchase_token)
            .append_pair("ot", "1")
            .append_pair("shpn", &self.client.package_name)
            .append_pair("iabx", &URL_SAFE_NO_PAD.encode(iabx.encode_to_vec()))
            .finish();

        let headers = default_headers(&self.auth, &self.device);
        let response = self
            .transport
            .post(
                &self.config.consume_purchase_url(),
                &headers,
                body.into_bytes(),
                CONTENT_TYPE_FORM,
            )
            .await?;
        if !response.is_success() {
            return Err(BillingError::transport(format!(
                "request failed with status {}",
                response.status
            )));
        }
        let payload = Self::decode_payload(&response.body)?;
        let consume = payload
            .consume_purchase
            .ok_or_else(|| BillingError::protocol("missing consumePurchase payload"))?;
        Ok(match consume.failed {
            Some(failed) => ResultBundle::raw_status(failed.status_code, failed.msg),
            None => ResultBundle::status(ResponseCode::Ok, ""),
        })
    }

    /// Acknowledge a purchase token.
    pub async fn acknowledge_purchase(
        &self,
        params: &AcknowledgePurchaseParams,
    ) -> BillingResult<AcknowledgeOutcome> {
        let developer_payload = match params.extra_params.get("developerPayload") {
            Some(vending_types::ParamValue::Str(payload)) => Some(payload.clone()),
            _ => None,
        };
        let request = wire::AcknowledgePurchaseRequest {
            purchase_token: params.purchase_token.clone(),
            developer_payload,
        };
        let response_body = self
            .post_protobuf(&self.config.acknowledge_purchase_url(), request.encode_to_vec())
            .await?;
        let response = Self::decode_payload(&response_body)?
            .acknowledge_purchase
            .ok_or_else(|| BillingError::protocol("missing acknowledgePurchase payload"))?;

        if let Some(failed) = response.failed {
            return Ok(AcknowledgeOutcome {
                item: None,
                bundle: ResultBundle::raw_status(failed.status_code, failed.msg),
            });
        }
        let group = response
            .purchase_item
            .ok_or_else(|| BillingError::protocol("acknowledge response missing purchase item"))?;
        if group.data.len() != 1 {
            return Err(BillingError::protocol(format!(
                "acknowledge purchase item count {} != 1",
                group.data.len()
            )));
        }
        let item = parser::parse_purchase_item_group(&group).into_iter().next();
        Ok(AcknowledgeOutcome { item, bundle: ResultBundle::status(ResponseCode::Ok, "") })
    }

    /// Fetch one page of purchase history.
    pub async fn purchase_history(
        &self,
        params: &GetPurchaseHistoryParams,
    ) -> BillingResult<HistoryOutcome> {
        let mut query = vec![
            ("bav".to_string(), params.api_version.to_string()),
            ("shpn".to_string(), self.client.package_name.clone()),
            ("iabt".to_string(), params.kind.clone()),
        ];
        if let Some(token) = params.continuation_token.as_deref().filter(|t| !t.is_empty()) {
            query.push(("ctntkn".to_string(), token.to_string()));
        }
        if !params.extra_params.is_empty() {
            let iabx =
                wire::ExtraParams { sku_param: assemble::params_to_wire(&params.extra_params) };
            query.push(("iabx".to_string(), URL_SAFE_NO_PAD.encode(iabx.encode_to_vec())));
        }

        let headers = default_headers(&self.auth, &self.device);
        let response = self
            .transport
            .get(&self.config.purchase_history_url(), &headers, &query)
            .await?;
        if !response.is_success() {
            return Err(BillingError::transport(format!(
                "request failed with status {}",
                response.status
            )));
        }
        let history = Self::decode_payload(&response.body)?
            .purchase_history
            .ok_or_else(|| BillingError::protocol("missing purchaseHistory payload"))?;

        if let Some(failed) = history.failed {
            return Ok(HistoryOutcome {
                items: Vec::new(),
                continuation_token: None,
                bundle: ResultBundle::raw_status(failed.status_code, failed.msg),
            });
        }
        if history.product_id.len() != history.purchase_json.len()
            || history.purchase_json.len() != history.signature.len()
        {
            return Err(BillingError::protocol(format!(
                "purchase history item count mismatch: {}/{}/{}",
                history.product_id.len(),
                history.purchase_json.len(),
                history.signature.len()
            )));
        }
        let items = history
            .product_id
            .iter()
            .zip(history.purchase_json.iter())
            .zip(history.signature.iter())
            .map(|((sku, json_data), signature)| HistoryItem {
                sku: sku.clone(),
                json_data: json_data.clone(),
                signature: signature.clone(),
            })
            .collect();
        Ok(HistoryOutcome {
            items,
            continuation_token: history.continuation_token.filter(|t| !t.is_empty()),
            bundle: ResultBundle::status(ResponseCode::Ok, ""),
        })
    }

    /// Exchange the account password for an auth proof token.
    pub async fn request_auth_proof_token(
        &self,
        password: &str,
    ) -> BillingResult<AuthProofOutcome> {
        let body = serde_json::json!({
            "credentialType": "password",
            "credential": password,
        });
        let headers = base_headers(&self.auth);
        let response = self
            .transport
            .post(
                &self.config.auth_proof_url,
                &headers,
                body.to_string().into_bytes(),
                CONTENT_TYPE_JSON,
            )
            .await?;
        if !response.is_success() {
            return Ok(AuthProofOutcome { status: response.status, token: None });
        }
        let token = serde_json::from_slice::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|v| v.get("encodedRapt").and_then(|t| t.as_str()).map(str::to_string));
        Ok(AuthProofOutcome { status: response.status, token })
    }
}
