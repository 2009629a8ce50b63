//! End-to-end buy-flow scenarios against fake collaborators.

use crate::config::ApiConfig;
use crate::dispatch::BillingService;
use crate::flow::action::{Action, ActionKind, UiType};
use crate::flow::FlowEvent;
use crate::providers::{
    AuthProvider, ChallengeSolver, DeviceIdentityProvider, MemorySettings, ProviderError,
};
use crate::services::EngineServices;
use crate::transport::{HttpResponse, Transport};
use crate::wire;
use async_trait::async_trait;
use prost::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use vending_types::response::{
    KEY_DATA_SIGNATURE, KEY_PURCHASE_DATA, KEY_RESPONSE_CODE,
};
use vending_types::{
    AuthContext, BillingResult, BuyFlowParams, ClientIdentity, DeviceProfile, ParamMap,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeAuth;

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn obtain(&self, account_id: &str) -> Result<AuthContext, ProviderError> {
        if account_id == "missing@example.com" {
            return Err(ProviderError::NoAccount(account_id.to_string()));
        }
        Ok(AuthContext::new(account_id, "auth-token", "3f2a77", "ck-token"))
    }
}

struct FakeIdentity;

#[async_trait]
impl DeviceIdentityProvider for FakeIdentity {
    async fn snapshot(&self) -> DeviceProfile {
        DeviceProfile {
            device: "walleye".to_string(),
            locale: "en-US".to_string(),
            store_package_name: "com.android.vending".to_string(),
            store_version_code: 81010200,
            ..Default::default()
        }
    }

    async fn resolve(&self, package_name: &str) -> Result<ClientIdentity, ProviderError> {
        Ok(ClientIdentity::new(package_name, 42, "d41d8cd98f00b204e9800998ecf8427e"))
    }
}

struct FakeSolver {
    token: String,
}

#[async_trait]
impl ChallengeSolver for FakeSolver {
    async fn solve(&self, _flow_name: &str, _challenge: HashMap<String, String>) -> String {
        self.token.clone()
    }
}

#[derive(Clone)]
struct RecordedCall {
    url: String,
    body: Vec<u8>,
}

/// Transport serving a scripted queue of responses and recording calls.
struct ScriptedTransport {
    responses: parking_lot::Mutex<VecDeque<HttpResponse>>,
    calls: parking_lot::Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: parking_lot::Mutex::new(VecDeque::new()),
            calls: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn push_raw(&self, status: u16, body: Vec<u8>) {
        self.responses
            .lock()
            .push_back(HttpResponse { status, body: body.into() });
    }

    fn push_payload(&self, payload: wire::ResponsePayload) {
        let wrapper = wire::ResponseWrapper { payload: Some(payload) };
        self.push_raw(200, wrapper.encode_to_vec());
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn call(&self, index: usize) -> RecordedCall {
        self.calls.lock()[index].clone()
    }

    fn next_response(&self, url: &str, body: Vec<u8>) -> BillingResult<HttpResponse> {
        self.calls.lock().push(RecordedCall { url: url.to_string(), body });
        Ok(self
            .responses
            .lock()
            .pop_front()
            .unwrap_or(HttpResponse { status: 500, body: bytes::Bytes::new() }))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        _headers: &[(String, String)],
        body: Vec<u8>,
        _content_type: &str,
    ) -> BillingResult<HttpResponse> {
        self.next_response(url, body)
    }

    async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _query: &[(String, String)],
    ) -> BillingResult<HttpResponse> {
        self.next_response(url, Vec::new())
    }
}

fn test_service(transport: Arc<ScriptedTransport>) -> BillingService {
    let services = EngineServices::new(
        Arc::new(FakeAuth),
        Arc::new(FakeIdentity),
        transport,
        Arc::new(FakeSolver { token: "solved-token".to_string() }),
        Arc::new(MemorySettings::new(false)),
        ApiConfig::with_base_url("http://billing.test"),
    );
    BillingService::new(services)
}

// ---------------------------------------------------------------------------
// Wire response builders
// ---------------------------------------------------------------------------

fn show_wire_action(screen_id: &str) -> wire::WireAction {
    wire::WireAction {
        show: Some(Box::new(wire::ShowAction {
            screen_id: screen_id.to_string(),
            action: None,
        })),
        ..Default::default()
    }
}

fn wire_screen(ui_type: i32) -> wire::WireScreen {
    wire::WireScreen {
        ui_info: Some(wire::UiInfo { class_type: 0, ui_type }),
        components: None,
        action: None,
    }
}

fn acquire_payload(response: wire::AcquireResponse) -> wire::ResponsePayload {
    wire::ResponsePayload { acquire: Some(response), ..Default::default() }
}

fn cart_response(context_token: &[u8]) -> wire::AcquireResponse {
    let mut screen_map = HashMap::new();
    screen_map.insert("cart".to_string(), wire_screen(UiType::CartBuyButton as i32));
    screen_map.insert("loading".to_string(), wire_screen(UiType::LoadingSpinner as i32));
    screen_map.insert("authscreen".to_string(), wire_screen(UiType::AuthScreen as i32));
    wire::AcquireResponse {
        action: Some(show_wire_action("cart")),
        screen_map,
        result: None,
        server_context_token: Some(context_token.to_vec()),
    }
}

fn purchase_result_response(token: &str) -> wire::AcquireResponse {
    let json = format!(
        r#"{{"packageName":"com.example.app","purchaseToken":"{}","purchaseState":0}}"#,
        token
    );
    let bundle = wire::ResponseBundle {
        item: vec![
            wire::BundleItem {
                key: KEY_RESPONSE_CODE.to_string(),
                i32v: Some(0),
                ..Default::default()
            },
            wire::BundleItem {
                key: KEY_PURCHASE_DATA.to_string(),
                sv: Some(json),
                ..Default::default()
            },
            wire::BundleItem {
                key: KEY_DATA_SIGNATURE.to_string(),
                sv: Some("sig".to_string()),
                ..Default::default()
            },
        ],
    };
    wire::AcquireResponse {
        result: Some(wire::AcquireResultInfo {
            purchase_response: Some(wire::PurchaseResponse { response_bundle: Some(bundle) }),
            owned_purchase: None,
        }),
        ..Default::default()
    }
}

fn buy_click(target_screen: &str) -> Action {
    Action {
        kind: ActionKind::Show { screen_id: target_screen.to_string() },
        ui_type: Some(UiType::CartBuyButton),
        action_context: vec![vec![0xaa, 0xbb]],
        ..Default::default()
    }
}

fn buy_params() -> BuyFlowParams {
    BuyFlowParams::new(17, "premium", "inapp")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_purchase_scenario_buy_button_to_ledger() {
    let transport = ScriptedTransport::new();
    transport.push_payload(acquire_payload(cart_response(b"ctx-1")));
    transport.push_payload(acquire_payload(purchase_result_response("tok-99")));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.expect("flow should start");
    match started.event {
        FlowEvent::ShowScreen { screen_id, screen, .. } => {
            assert_eq!(screen_id, "cart");
            assert_eq!(screen.ui_type, Some(UiType::CartBuyButton));
        }
        other => panic!("expected cart screen, got {:?}", other),
    }

    let event = service.submit_click(&flow_token, buy_click("loading")).await;
    match event {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(0)),
        other => panic!("expected finished flow, got {:?}", other),
    }

    // The purchase landed in the ledger
    let purchases =
        service.get_purchases("user@example.com", "com.example.app", 17, "inapp", None);
    assert!(purchases.is_ok());
    let ledger_items =
        service.services().ledger.by_kind("user@example.com", "com.example.app", "inapp");
    assert_eq!(ledger_items.len(), 1);
    assert_eq!(ledger_items[0].purchase_token, "tok-99");

    // The continuation request carried the previous round trip forward
    assert_eq!(transport.call_count(), 2);
    assert!(transport.call(0).url.contains("/ees/acquire"));
    let first = wire::AcquireRequest::decode(transport.call(0).body.as_slice()).unwrap();
    let second = wire::AcquireRequest::decode(transport.call(1).body.as_slice()).unwrap();
    assert_eq!(second.server_context_token, Some(b"ctx-1".to_vec()));
    assert_eq!(second.cache_key, first.cache_key);
    assert_eq!(second.nonce, first.nonce);
    assert_eq!(second.client_token, first.client_token);
    assert!(second.action_context.contains(&vec![0xaa, 0xbb]));
}

#[tokio::test]
async fn test_auth_scenario_wrong_password_keeps_flow_alive() {
    let transport = ScriptedTransport::new();
    transport.push_payload(acquire_payload(cart_response(b"ctx-1")));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.unwrap();

    // Buy button targets the authentication screen
    let event = service.submit_click(&flow_token, buy_click("authscreen")).await;
    match event {
        FlowEvent::PasswordRequired { has_error, .. } => assert!(!has_error),
        other => panic!("expected password prompt, got {:?}", other),
    }

    // Password proof endpoint answers 400: wrong password
    transport.push_raw(400, b"{}".to_vec());
    let event = service.submit_password(&flow_token, "wrong", true).await;
    match event {
        FlowEvent::PasswordRequired { has_error, message, .. } => {
            assert!(has_error);
            assert!(message.contains("password"));
        }
        other => panic!("expected password retry, got {:?}", other),
    }

    // The flow is still alive: a correct password resumes the negotiation
    transport.push_raw(200, br#"{"encodedRapt":"rapt-token"}"#.to_vec());
    transport.push_payload(acquire_payload(purchase_result_response("tok-42")));
    let event = service.submit_password(&flow_token, "correct", true).await;
    match event {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(0)),
        other => panic!("expected finished flow, got {:?}", other),
    }

    // Continuation carried the proof token and the fixed auth context blobs
    let last = transport.call_count() - 1;
    let request = wire::AcquireRequest::decode(transport.call(last).body.as_slice()).unwrap();
    assert_eq!(request.auth_tokens.get("rpt").map(String::as_str), Some("rapt-token"));
    assert!(request
        .action_context
        .contains(&vec![0xea, 0x01, 0x04, 0x08, 0x01, 0x10, 0x01, 0xb8, 0x03, 0x01]));
}

#[tokio::test]
async fn test_sku_details_served_from_cache_on_repeat() {
    let transport = ScriptedTransport::new();
    let details = wire::ResponsePayload {
        sku_details: Some(wire::SkuDetailsResponse {
            failed: None,
            details: vec![wire::SkuDetailsEntry {
                sku_details: r#"{"productId":"premium"}"#.to_string(),
                sku_info: None,
            }],
        }),
        ..Default::default()
    };
    transport.push_payload(details);
    let service = test_service(Arc::clone(&transport));

    for _ in 0..2 {
        let bundle = service
            .get_sku_details(
                "user@example.com",
                "com.example.app",
                17,
                "inapp",
                vec!["premium".to_string()],
                ParamMap::new(),
            )
            .await;
        assert!(bundle.is_ok(), "unexpected bundle: {:?}", bundle);
    }
    // Second lookup hit the response cache, not the transport
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_mismatched_history_arrays_raise_protocol_error() {
    let transport = ScriptedTransport::new();
    transport.push_payload(wire::ResponsePayload {
        purchase_history: Some(wire::PurchaseHistoryResponse {
            failed: None,
            product_id: vec!["a".to_string(), "b".to_string()],
            purchase_json: vec!["{}".to_string()],
            signature: vec!["sig".to_string()],
            continuation_token: None,
        }),
        ..Default::default()
    });
    let service = test_service(Arc::clone(&transport));

    let bundle = service
        .get_purchase_history(
            "user@example.com",
            "com.example.app",
            17,
            "inapp",
            None,
            ParamMap::new(),
        )
        .await;
    assert_eq!(bundle.code(), Some(6));
    assert!(bundle.debug_message().unwrap_or_default().contains("mismatch"));
}

#[tokio::test]
async fn test_local_navigation_does_not_touch_the_network() {
    let transport = ScriptedTransport::new();
    let mut response = cart_response(b"ctx-1");
    response
        .screen_map
        .insert("detail".to_string(), wire_screen(UiType::CartContinueButton as i32));
    transport.push_payload(acquire_payload(response));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.unwrap();
    let calls_before = transport.call_count();

    let action = Action {
        kind: ActionKind::Show { screen_id: "detail".to_string() },
        ui_type: Some(UiType::ChangeSubscriptionContinueButton),
        ..Default::default()
    };
    let event = service.submit_click(&flow_token, action).await;
    match event {
        FlowEvent::ShowScreen { screen_id, .. } => assert_eq!(screen_id, "detail"),
        other => panic!("expected local navigation, got {:?}", other),
    }
    assert_eq!(transport.call_count(), calls_before);
}

#[tokio::test]
async fn test_continue_to_missing_screen_terminates() {
    let transport = ScriptedTransport::new();
    transport.push_payload(acquire_payload(cart_response(b"ctx-1")));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.unwrap();

    let action = Action {
        kind: ActionKind::Show { screen_id: "nowhere".to_string() },
        ui_type: Some(UiType::PaymentDeclinedContinueButton),
        ..Default::default()
    };
    match service.submit_click(&flow_token, action).await {
        FlowEvent::Finished { .. } => {}
        other => panic!("expected terminal event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_profile_screen_suspends_for_payment_method() {
    let transport = ScriptedTransport::new();
    let mut screen_map = HashMap::new();
    screen_map.insert("profile".to_string(), wire_screen(UiType::ProfileScreen as i32));
    transport.push_payload(acquire_payload(wire::AcquireResponse {
        action: Some(show_wire_action("profile")),
        screen_map,
        result: None,
        server_context_token: Some(b"ctx-1".to_vec()),
    }));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.unwrap();
    match started.event {
        FlowEvent::PaymentMethodUpdateRequested { account } => {
            assert_eq!(account, "user@example.com");
        }
        other => panic!("expected payment method request, got {:?}", other),
    }

    // External flow reports completion; the engine re-acquires
    transport.push_payload(acquire_payload(purchase_result_response("tok-7")));
    match service.payment_method_updated(&flow_token).await {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(0)),
        other => panic!("expected finished flow, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_delay_screen_auto_fires_its_result() {
    let transport = ScriptedTransport::new();
    let mut bundle = wire::ResponseBundle::default();
    bundle.item.push(wire::BundleItem {
        key: KEY_RESPONSE_CODE.to_string(),
        i32v: Some(0),
        ..Default::default()
    });
    let mut screen_map = HashMap::new();
    screen_map.insert(
        "spinner".to_string(),
        wire::WireScreen {
            ui_info: Some(wire::UiInfo { class_type: 0, ui_type: UiType::LoadingSpinner as i32 }),
            components: None,
            action: Some(wire::WireAction {
                timer: Some(wire::TimerAction {
                    delay_millis: 2_000,
                    response_bundle: Some(bundle),
                }),
                ..Default::default()
            }),
        },
    );
    transport.push_payload(acquire_payload(wire::AcquireResponse {
        action: Some(show_wire_action("spinner")),
        screen_map,
        result: None,
        server_context_token: None,
    }));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    match started.event {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(0)),
        other => panic!("expected auto-fired delay result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_challenge_token_attached_to_next_round_trip() {
    let transport = ScriptedTransport::new();
    let mut response = cart_response(b"ctx-1");
    let mut challenge = HashMap::new();
    challenge.insert("ck".to_string(), "cv".to_string());
    response.action = Some(wire::WireAction {
        ext: Some(Box::new(wire::ActionExt {
            challenge: Some(wire::ChallengeRequest { map: challenge }),
            action: Some(Box::new(show_wire_action("cart"))),
        })),
        ..Default::default()
    });
    transport.push_payload(acquire_payload(response));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.unwrap();

    // Let the fire-and-forget solver task run
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    transport.push_payload(acquire_payload(purchase_result_response("tok-1")));
    service.submit_click(&flow_token, buy_click("loading")).await;

    let last = transport.call_count() - 1;
    let request = wire::AcquireRequest::decode(transport.call(last).body.as_slice()).unwrap();
    assert_eq!(
        request.device_auth.unwrap().challenge_payload.as_deref(),
        Some("solved-token")
    );
}

#[tokio::test]
async fn test_cancel_without_purchase_reports_user_canceled() {
    let transport = ScriptedTransport::new();
    transport.push_payload(acquire_payload(cart_response(b"ctx-1")));
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    let flow_token = started.flow_token.unwrap();
    match service.cancel_flow(&flow_token).await {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(1)),
        other => panic!("expected canceled result, got {:?}", other),
    }

    // The token is gone afterwards
    match service.cancel_flow(&flow_token).await {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(5)),
        other => panic!("expected developer error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_account_surfaces_as_billing_unavailable() {
    let transport = ScriptedTransport::new();
    let service = test_service(Arc::clone(&transport));

    let started = service
        .start_flow("missing@example.com", "com.example.app", buy_params())
        .await;
    match started.event {
        FlowEvent::Finished { result } => assert_eq!(result.code(), Some(3)),
        other => panic!("expected billing unavailable, got {:?}", other),
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_transport_failure_is_not_an_empty_result() {
    let transport = ScriptedTransport::new();
    transport.push_raw(503, Vec::new());
    let service = test_service(Arc::clone(&transport));

    let started = service.start_flow("user@example.com", "com.example.app", buy_params()).await;
    match started.event {
        FlowEvent::Finished { result } => {
            assert_eq!(result.code(), Some(3));
            assert!(result.debug_message().unwrap_or_default().contains("503"));
        }
        other => panic!("expected transport failure result, got {:?}", other),
    }
}
