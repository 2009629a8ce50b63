//! Response-to-graph parser.
//!
//! Pure functions from wire acquire responses to the normalized
//! action/screen graph. Flattening walks the wrapper chain until a
//! terminal kind or the chain ends; side data merges with an explicit
//! policy: action context accumulates, `ui_type` is first-writer-wins,
//! the challenge request map is last-writer-wins, navigation sources are
//! recorded as seen.
//!
//! Parsing is deliberately lenient about item payloads: a malformed
//! owned-purchase entry is skipped with a log line, never failing the
//! response it arrived in.

use crate::flow::action::{Action, ActionKind, Screen, UiType};
use crate::wire;
use std::collections::HashMap;
use vending_types::response::{KEY_DATA_SIGNATURE, KEY_PURCHASE_DATA};
use vending_types::{BuyFlowParams, PurchaseItem, ResponseCode, ResultBundle};

/// Fully parsed acquire/submit response.
#[derive(Debug, Clone, Default)]
pub struct ParsedAcquire {
    pub action: Action,
    pub screens: HashMap<String, Screen>,
    pub purchase_items: Vec<PurchaseItem>,
    pub result: ResultBundle,
}

/// Parse one acquire response against the flow's original parameters.
pub fn parse_acquire_response(
    buy: &BuyFlowParams,
    response: &wire::AcquireResponse,
) -> ParsedAcquire {
    let action = match &response.action {
        Some(wire_action) => flatten(wire_action),
        None => Action::default(),
    };
    let screens = response
        .screen_map
        .iter()
        .map(|(id, screen)| (id.clone(), parse_screen(screen)))
        .collect();

    let purchase_response = response
        .result
        .as_ref()
        .and_then(|r| r.purchase_response.as_ref());
    let (result, direct_item) = parse_purchase_response(buy, purchase_response);

    let mut purchase_items = Vec::new();
    purchase_items.extend(direct_item);
    if let Some(owned) = response.result.as_ref().and_then(|r| r.owned_purchase.as_ref()) {
        for group in &owned.purchase_item {
            purchase_items.extend(parse_purchase_item_group(group));
        }
    }

    ParsedAcquire { action, screens, purchase_items, result }
}

/// Flatten a wire action wrapper chain into a single [`Action`].
pub fn flatten(wire_action: &wire::WireAction) -> Action {
    let mut action = Action::default();
    flatten_into(wire_action, &mut action);
    action
}

fn flatten_into(node: &wire::WireAction, out: &mut Action) -> bool {
    if let Some(ctx) = &node.action_context {
        if !ctx.is_empty() {
            out.action_context.push(ctx.clone());
        }
    }
    if let Some(timer) = &node.timer {
        out.kind = ActionKind::Delay {
            millis: timer.delay_millis,
            result: timer
                .response_bundle
                .as_ref()
                .map(bundle_from_wire)
                .unwrap_or_default(),
        };
        return true;
    }
    if let Some(ext) = &node.ext {
        if let Some(challenge) = &ext.challenge {
            out.challenge_request = challenge.map.clone();
        }
        if let Some(inner) = &ext.action {
            return flatten_into(inner, out);
        }
    }
    if let Some(show) = &node.show {
        out.kind = ActionKind::Show { screen_id: show.screen_id.clone() };
        if let Some(inner) = &show.action {
            flatten_into(inner, out);
        }
        return true;
    }
    if let Some(view_click) = &node.view_click {
        if out.ui_type.is_none() {
            if let Some(ui_info) = &view_click.ui_info {
                out.ui_type = Some(parse_ui_type(ui_info));
            }
        }
        return match &view_click.action {
            Some(inner) => flatten_into(inner, out),
            None => false,
        };
    }
    if let Some(optional) = &node.optional {
        return match &optional.action {
            Some(inner) => flatten_into(inner, out),
            None => false,
        };
    }
    if let Some(navigate) = &node.navigate {
        out.from_screen = Some(navigate.from.clone());
        return match &navigate.action {
            Some(inner) => flatten_into(inner, out),
            None => false,
        };
    }
    false
}

fn parse_ui_type(ui_info: &wire::UiInfo) -> UiType {
    if ui_info.class_type == 1 {
        return UiType::Unknown;
    }
    UiType::from_value(ui_info.ui_type)
}

fn parse_screen(screen: &wire::WireScreen) -> Screen {
    Screen {
        ui_type: screen.ui_info.as_ref().map(parse_ui_type),
        action: screen.action.as_ref().map(flatten),
        components: screen.components.clone(),
    }
}

/// Convert a wire response bundle into the domain bundle, keeping order.
pub(crate) fn bundle_from_wire(bundle: &wire::ResponseBundle) -> ResultBundle {
    let mut out = ResultBundle::new();
    for item in &bundle.item {
        if let Some(v) = item.bv {
            out.insert(&item.key, v);
        } else if let Some(v) = item.i32v {
            out.insert(&item.key, v);
        } else if let Some(v) = item.i64v {
            out.insert(&item.key, v);
        } else if let Some(v) = &item.sv {
            out.insert(&item.key, v.clone());
        } else if !item.s_list.is_empty() {
            out.insert(&item.key, item.s_list.clone());
        }
    }
    out
}

/// Decode the direct purchase result, if any.
///
/// The bundle always survives; the item is extracted only when purchase
/// data, signature, and a success code are all present and the data JSON
/// carries the expected fields. Missing pieces drop the item, not the
/// parse.
fn parse_purchase_response(
    buy: &BuyFlowParams,
    purchase_response: Option<&wire::PurchaseResponse>,
) -> (ResultBundle, Option<PurchaseItem>) {
    let ok = || ResultBundle::status(ResponseCode::Ok, "");
    let Some(response) = purchase_response else {
        return (ok(), None);
    };
    let bundle = response
        .response_bundle
        .as_ref()
        .map(bundle_from_wire)
        .unwrap_or_default();
    let Some(code) = bundle.code() else {
        return (ok(), None);
    };
    let Some(json_data) = bundle.get_str(KEY_PURCHASE_DATA).map(str::to_string) else {
        return (bundle, None);
    };
    let Some(signature) = bundle.get_str(KEY_DATA_SIGNATURE).map(str::to_string) else {
        return (bundle, None);
    };
    if code != ResponseCode::Ok.as_i32() {
        return (bundle, None);
    }
    let Some((package_name, purchase_token, purchase_state)) = purchase_fields(&json_data) else {
        return (bundle, None);
    };
    let item = PurchaseItem {
        kind: buy.sku_type.clone(),
        sku: buy.sku.clone(),
        package_name,
        purchase_token,
        purchase_state,
        json_data,
        signature,
    };
    (bundle, Some(item))
}

/// Decode every entry of an owned-purchase group, skipping malformed ones.
pub(crate) fn parse_purchase_item_group(group: &wire::PurchaseItemGroup) -> Vec<PurchaseItem> {
    let mut items = Vec::new();
    for data in &group.data {
        let Some(doc_id) = &data.doc_id else { continue };
        let parts: Vec<&str> = doc_id.backend_doc_id.split(':').collect();
        if parts.len() < 3 {
            tracing::debug!(
                "[Parser] Skipping owned purchase with malformed doc id: {}",
                doc_id.backend_doc_id
            );
            continue;
        }
        let (kind, sku) = (parts[0], parts[2]);
        let payload = match kind {
            "inapp" => data.inapp.as_ref(),
            "subs" => data.subs.as_ref(),
            other => {
                tracing::warn!("[Parser] Unknown sku type in owned purchase: {}", other);
                None
            }
        };
        let Some(payload) = payload else { continue };
        let Some((package_name, purchase_token, purchase_state)) =
            purchase_fields(&payload.json_data)
        else {
            tracing::debug!("[Parser] Skipping owned purchase {} with incomplete data", sku);
            continue;
        };
        items.push(PurchaseItem {
            kind: kind.to_string(),
            sku: sku.to_string(),
            package_name,
            purchase_token,
            purchase_state,
            json_data: payload.json_data.clone(),
            signature: payload.signature.clone(),
        });
    }
    items
}

fn purchase_fields(json_data: &str) -> Option<(String, String, i32)> {
    let value: serde_json::Value = serde_json::from_str(json_data).ok()?;
    let package_name = value.get("packageName")?.as_str()?.to_string();
    let purchase_token = value.get("purchaseToken")?.as_str()?.to_string();
    let purchase_state = i32::try_from(value.get("purchaseState")?.as_i64()?).ok()?;
    Some((package_name, purchase_token, purchase_state))
}
