//! Buy-flow state machine.
//!
//! One [`BuyFlowSession`] per outstanding purchase attempt, driven by
//! server responses and externally delivered click events. The machine
//! decides, per response, whether to continue the negotiation
//! automatically, show an interactive screen, require re-authentication,
//! or terminate with a result bundle.
//!
//! Challenge tokens are solved on a fire-and-forget side channel: the
//! solver task writes into a single-slot cell that the next round trip
//! reads without blocking. A round trip that fires before the solver
//! finishes proceeds without the token.

use crate::flow::action::{Action, ActionKind, Screen, UiType};
use crate::protocol::{AcquireOutcome, AcquireParams};
use crate::services::EngineServices;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use vending_types::response::KEY_PURCHASE_DATA;
use vending_types::{BuyFlowParams, ResponseCode, ResultBundle};

/// Bound on concurrently tracked flows; oldest are evicted beyond this.
const FLOW_CAPACITY: usize = 64;
/// Abandoned flows are swept after this long.
const FLOW_TTL: Duration = Duration::from_secs(30 * 60);
/// Display time of the success screen before the flow reports back.
const SUCCESS_DISPLAY_DELAY: Duration = Duration::from_secs(3);
/// Flow name reported to the challenge solver.
const CHALLENGE_FLOW_NAME: &str = "purchase_flow";

/// Protocol context blob appended after a successful password exchange.
const AUTH_CONTEXT_PRIMARY: &[u8] = &[0xea, 0x01, 0x04, 0x08, 0x01, 0x10, 0x01, 0xb8, 0x03, 0x01];
/// Companion blob always sent together with [`AUTH_CONTEXT_PRIMARY`].
const AUTH_CONTEXT_SECONDARY: &[u8] = &[0x0a, 0x02, 0x08, 0x02, 0xb8, 0x03, 0x01];

/// Lifecycle state of one buy flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    AwaitingServer,
    ShowingScreen { screen_id: String },
    AwaitingPassword,
    AwaitingPaymentMethod,
    Terminal,
}

/// What the engine asks its caller to do next.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// Render this screen and wait for one click event.
    ShowScreen { screen_id: String, screen: Screen, result: ResultBundle },
    /// Collect the account password; `has_error` marks a failed attempt.
    PasswordRequired { account: String, has_error: bool, message: String },
    /// Open the external payment-method flow and report completion.
    PaymentMethodUpdateRequested { account: String },
    /// The flow ended; this is the final result.
    Finished { result: ResultBundle },
}

/// Mutable state of one outstanding purchase attempt.
struct BuyFlowSession {
    package: String,
    account: String,
    buy_params: BuyFlowParams,
    state: FlowState,
    last_outcome: Option<AcquireOutcome>,
    screens: HashMap<String, Screen>,
    result: ResultBundle,
    /// Context accumulated between round trips, sent before clicked context
    pending_context: Vec<Vec<u8>>,
    /// Click action parked while the password prompt is up
    pending_password_action: Option<Action>,
    /// Latest available challenge token, written by the solver task
    challenge_token: Arc<parking_lot::Mutex<Option<String>>>,
}

struct FlowSlot {
    created_at: Instant,
    session: Arc<Mutex<BuyFlowSession>>,
}

/// Registry and driver for all buy flows.
pub struct BuyFlowEngine {
    services: Arc<EngineServices>,
    flows: DashMap<String, FlowSlot>,
}

impl BuyFlowEngine {
    pub fn new(services: Arc<EngineServices>) -> Self {
        Self { services, flows: DashMap::new() }
    }

    /// Start a purchase negotiation; returns the flow token and first event.
    pub async fn start_flow(
        &self,
        package: &str,
        account: &str,
        buy_params: BuyFlowParams,
    ) -> (String, FlowEvent) {
        self.sweep();
        let flow_token = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(BuyFlowSession {
            package: package.to_string(),
            account: account.to_string(),
            buy_params,
            state: FlowState::AwaitingServer,
            last_outcome: None,
            screens: HashMap::new(),
            result: ResultBundle::new(),
            pending_context: Vec::new(),
            pending_password_action: None,
            challenge_token: Arc::new(parking_lot::Mutex::new(None)),
        }));
        self.flows.insert(
            flow_token.clone(),
            FlowSlot { created_at: Instant::now(), session: Arc::clone(&session) },
        );
        tracing::debug!("[BuyFlow] Started flow {} for {}:{}", flow_token, package, account);

        let mut guard = session.lock().await;
        let event = self.round_trip(&mut guard, Vec::new(), None).await;
        (flow_token, event)
    }

    /// Deliver one user click event to the flow.
    pub async fn submit_click(&self, flow_token: &str, action: Action) -> FlowEvent {
        let Some(session) = self.flow(flow_token) else {
            return Self::unknown_flow(flow_token);
        };
        let mut s = session.lock().await;
        tracing::debug!(
            "[BuyFlow] Click on flow {} in state {:?}: uiType={:?}",
            flow_token,
            s.state,
            action.ui_type
        );
        match action.kind.clone() {
            ActionKind::Show { screen_id } => {
                match action.ui_type {
                    Some(UiType::CartBuyButton) => self.buy_button(&mut s, &screen_id, action).await,
                    Some(
                        UiType::CartContinueButton
                        | UiType::ChangeSubscriptionContinueButton
                        | UiType::PaymentDeclinedContinueButton
                        | UiType::CartPaymentOptionsLink
                        | UiType::ProfileAbandon,
                    ) => Self::navigate_local(&mut s, &screen_id),
                    Some(
                        UiType::ProfileOptionCreateInstrument
                        | UiType::ProfileOptionAddCredit
                        | UiType::ProfileOptionRedeemCode,
                    ) => {
                        s.state = FlowState::AwaitingPaymentMethod;
                        FlowEvent::PaymentMethodUpdateRequested { account: s.account.clone() }
                    }
                    Some(UiType::ProfileExistingInstrument) => {
                        let ctx = action.action_context.clone();
                        self.round_trip(&mut s, ctx, None).await
                    }
                    _ => Self::finish(&mut s, None),
                }
            }
            ActionKind::Delay { millis, result } => {
                tokio::time::sleep(Duration::from_millis(millis.max(0) as u64)).await;
                let result = if result.is_empty() { None } else { Some(result) };
                Self::finish(&mut s, result)
            }
            ActionKind::Unknown => match action.ui_type {
                Some(UiType::CartContinueButton) => {
                    let ctx = action.action_context.clone();
                    self.round_trip(&mut s, ctx, None).await
                }
                Some(UiType::SuccessScreenWithAuthChoices) => {
                    tokio::time::sleep(SUCCESS_DISPLAY_DELAY).await;
                    Self::finish(&mut s, None)
                }
                _ => Self::finish(&mut s, None),
            },
        }
    }

    /// Deliver the password collected for an authentication screen.
    ///
    /// `always_require` is the user's choice for future purchases and is
    /// persisted on success.
    pub async fn submit_password(
        &self,
        flow_token: &str,
        password: &str,
        always_require: bool,
    ) -> FlowEvent {
        let Some(session) = self.flow(flow_token) else {
            return Self::unknown_flow(flow_token);
        };
        let mut s = session.lock().await;
        if s.state != FlowState::AwaitingPassword {
            return Self::finish(&mut s, None);
        }

        let protocol = match self.services.session(&s.package, &s.account).await {
            Ok(protocol) => protocol,
            Err(err) => {
                return FlowEvent::PasswordRequired {
                    account: s.account.clone(),
                    has_error: true,
                    message: err.to_string(),
                }
            }
        };
        let proof = protocol.request_auth_proof_token(password).await;
        let token = match proof {
            Ok(outcome) => match outcome.token {
                Some(token) if !token.is_empty() => token,
                _ => {
                    let message = if outcome.status == 400 {
                        "Incorrect password".to_string()
                    } else {
                        "Authentication service unavailable".to_string()
                    };
                    tracing::debug!(
                        "[BuyFlow] Password rejected for flow {} (status {})",
                        flow_token,
                        outcome.status
                    );
                    return FlowEvent::PasswordRequired {
                        account: s.account.clone(),
                        has_error: true,
                        message,
                    };
                }
            },
            Err(err) => {
                return FlowEvent::PasswordRequired {
                    account: s.account.clone(),
                    has_error: true,
                    message: err.to_string(),
                }
            }
        };

        self.services.settings.set_auth_required(always_require);
        let mut ctx = s
            .pending_password_action
            .take()
            .map(|action| action.action_context)
            .unwrap_or_default();
        ctx.push(AUTH_CONTEXT_PRIMARY.to_vec());
        ctx.push(AUTH_CONTEXT_SECONDARY.to_vec());
        self.round_trip(&mut s, ctx, Some(token)).await
    }

    /// Signal that the external payment-method flow completed.
    pub async fn payment_method_updated(&self, flow_token: &str) -> FlowEvent {
        let Some(session) = self.flow(flow_token) else {
            return Self::unknown_flow(flow_token);
        };
        let mut s = session.lock().await;
        self.round_trip(&mut s, Vec::new(), None).await
    }

    /// End the flow from the caller's side.
    pub async fn cancel_flow(&self, flow_token: &str) -> FlowEvent {
        let Some(session) = self.flow(flow_token) else {
            return Self::unknown_flow(flow_token);
        };
        let event = {
            let mut s = session.lock().await;
            let result = if s.result.contains_key(KEY_PURCHASE_DATA) {
                Some(s.result.clone())
            } else {
                Some(ResultBundle::status(ResponseCode::UserCanceled, ""))
            };
            Self::finish(&mut s, result)
        };
        self.flows.remove(flow_token);
        event
    }

    fn flow(&self, flow_token: &str) -> Option<Arc<Mutex<BuyFlowSession>>> {
        self.flows.get(flow_token).map(|slot| Arc::clone(&slot.session))
    }

    fn unknown_flow(flow_token: &str) -> FlowEvent {
        tracing::warn!("[BuyFlow] Unknown flow token {}", flow_token);
        FlowEvent::Finished {
            result: ResultBundle::status(ResponseCode::DeveloperError, "Unknown flow token."),
        }
    }

    /// Drop stale slots; evict the oldest when over capacity.
    fn sweep(&self) {
        let now = Instant::now();
        self.flows.retain(|_, slot| now.duration_since(slot.created_at) < FLOW_TTL);
        while self.flows.len() >= FLOW_CAPACITY {
            let oldest = self
                .flows
                .iter()
                .min_by_key(|slot| slot.created_at)
                .map(|slot| slot.key().clone());
            match oldest {
                Some(key) => {
                    self.flows.remove(&key);
                    tracing::debug!("[BuyFlow] Evicted flow {}", key);
                }
                None => break,
            }
        }
    }

    /// Buy-button click: route by the classification of its target screen.
    async fn buy_button(
        &self,
        s: &mut BuyFlowSession,
        screen_id: &str,
        action: Action,
    ) -> FlowEvent {
        let Some(target) = s.screens.get(screen_id) else {
            return Self::finish(s, None);
        };
        match target.ui_type {
            Some(UiType::LoadingSpinner) => {
                let ctx = action.action_context.clone();
                self.round_trip(s, ctx, None).await
            }
            Some(UiType::AuthScreen) => {
                s.state = FlowState::AwaitingPassword;
                s.pending_password_action = Some(action);
                FlowEvent::PasswordRequired {
                    account: s.account.clone(),
                    has_error: false,
                    message: String::new(),
                }
            }
            other => {
                tracing::debug!("[BuyFlow] Buy button led to unexpected screen {:?}", other);
                Self::finish(s, None)
            }
        }
    }

    /// Switch to a screen already present in the graph, without a network
    /// round trip.
    fn navigate_local(s: &mut BuyFlowSession, screen_id: &str) -> FlowEvent {
        match s.screens.get(screen_id) {
            Some(screen) => {
                s.state = FlowState::ShowingScreen { screen_id: screen_id.to_string() };
                FlowEvent::ShowScreen {
                    screen_id: screen_id.to_string(),
                    screen: screen.clone(),
                    result: s.result.clone(),
                }
            }
            None => Self::finish(s, None),
        }
    }

    /// Issue one acquire round trip and absorb its outcome.
    async fn round_trip(
        &self,
        s: &mut BuyFlowSession,
        clicked_context: Vec<Vec<u8>>,
        auth_token: Option<String>,
    ) -> FlowEvent {
        let protocol = match self.services.session(&s.package, &s.account).await {
            Ok(protocol) => protocol,
            Err(err) => {
                return Self::finish(
                    s,
                    Some(ResultBundle::status(err.response_code(), err.to_string())),
                );
            }
        };

        // Session-pending context first, then the clicked action's own
        let mut action_context = std::mem::take(&mut s.pending_context);
        action_context.extend(clicked_context);

        let challenge_result = s.challenge_token.lock().clone();
        let params = AcquireParams {
            buy_params: &s.buy_params,
            action_context,
            challenge_result,
            auth_token,
            previous: s.last_outcome.as_ref(),
        };
        let outcome = match protocol.acquire(params).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("[BuyFlow] Acquire failed: {}", err);
                return Self::finish(
                    s,
                    Some(ResultBundle::status(err.response_code(), err.to_string())),
                );
            }
        };
        self.absorb_outcome(s, outcome).await
    }

    /// Record a round-trip outcome and decide the next step.
    async fn absorb_outcome(&self, s: &mut BuyFlowSession, outcome: AcquireOutcome) -> FlowEvent {
        for item in &outcome.parsed.purchase_items {
            self.services.ledger.add(&s.account, &s.package, item.clone());
        }
        if !outcome.parsed.action.challenge_request.is_empty() {
            self.spawn_challenge(s, outcome.parsed.action.challenge_request.clone());
        }

        s.screens.extend(outcome.parsed.screens.clone());
        s.result = outcome.parsed.result.clone();
        let action = outcome.parsed.action.clone();
        s.last_outcome = Some(outcome);

        let ActionKind::Show { screen_id } = action.kind else {
            return Self::finish(s, None);
        };
        let Some(screen) = s.screens.get(&screen_id).cloned() else {
            return Self::finish(s, None);
        };

        if screen.ui_type == Some(UiType::ProfileScreen) {
            s.state = FlowState::AwaitingPaymentMethod;
            return FlowEvent::PaymentMethodUpdateRequested { account: s.account.clone() };
        }

        // A screen whose own action is a delay auto-fires once shown
        if let Some(Action { kind: ActionKind::Delay { millis, result }, .. }) = &screen.action {
            tokio::time::sleep(Duration::from_millis((*millis).max(0) as u64)).await;
            let result = if result.is_empty() { None } else { Some(result.clone()) };
            return Self::finish(s, result);
        }

        s.state = FlowState::ShowingScreen { screen_id: screen_id.clone() };
        FlowEvent::ShowScreen { screen_id, screen, result: s.result.clone() }
    }

    /// Request a challenge token without blocking the flow.
    fn spawn_challenge(&self, s: &BuyFlowSession, challenge: HashMap<String, String>) {
        let cell = Arc::clone(&s.challenge_token);
        let solver = Arc::clone(&self.services.solver);
        tokio::spawn(async move {
            let token = solver.solve(CHALLENGE_FLOW_NAME, challenge).await;
            if !token.is_empty() {
                *cell.lock() = Some(token);
            }
        });
    }

    /// Terminate the flow. A bundle without a definitive response code is
    /// replaced by the user-canceled default.
    fn finish(s: &mut BuyFlowSession, result: Option<ResultBundle>) -> FlowEvent {
        let mut result = result.unwrap_or_else(|| s.result.clone());
        if result.code().is_none() {
            result = ResultBundle::status(ResponseCode::UserCanceled, "");
        }
        s.state = FlowState::Terminal;
        s.result = result.clone();
        FlowEvent::Finished { result }
    }
}
