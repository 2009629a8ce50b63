//! Normalized action and screen types.
//!
//! The backend describes every next step as a deeply nested wrapper
//! message; [`crate::flow::parser`] flattens those into the types here.

use std::collections::HashMap;
use vending_types::ResultBundle;

/// UI classification tag attached to screens and clickable controls.
///
/// Values are protocol constants; anything outside the known set decodes
/// to [`UiType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum UiType {
    Unknown = 0,
    LoadingSpinner = 1,
    ErrorScreen = 2,
    CartBuyButton = 3,
    CartContinueButton = 4,
    CartPaymentOptionsLink = 5,
    AuthScreen = 6,
    ProfileScreen = 7,
    ProfileOptionCreateInstrument = 8,
    ProfileOptionAddCredit = 9,
    ProfileOptionRedeemCode = 10,
    ProfileExistingInstrument = 11,
    ProfileAbandon = 12,
    ChangeSubscriptionContinueButton = 13,
    PaymentDeclinedContinueButton = 14,
    SuccessScreenWithAuthChoices = 15,
}

impl UiType {
    pub fn from_value(value: i32) -> Self {
        match value {
            1 => Self::LoadingSpinner,
            2 => Self::ErrorScreen,
            3 => Self::CartBuyButton,
            4 => Self::CartContinueButton,
            5 => Self::CartPaymentOptionsLink,
            6 => Self::AuthScreen,
            7 => Self::ProfileScreen,
            8 => Self::ProfileOptionCreateInstrument,
            9 => Self::ProfileOptionAddCredit,
            10 => Self::ProfileOptionRedeemCode,
            11 => Self::ProfileExistingInstrument,
            12 => Self::ProfileAbandon,
            13 => Self::ChangeSubscriptionContinueButton,
            14 => Self::PaymentDeclinedContinueButton,
            15 => Self::SuccessScreenWithAuthChoices,
            _ => Self::Unknown,
        }
    }
}

/// Terminal kind of a flattened action.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActionKind {
    /// Show the screen with the given id from the screen graph.
    Show { screen_id: String },
    /// Wait, then report the attached result bundle.
    Delay { millis: i64, result: ResultBundle },
    /// No terminal action was found in the wrapper chain.
    #[default]
    Unknown,
}

/// A server-declared next step, flattened from the wrapper chain.
///
/// Side data collected while unwrapping is merged here: action context
/// blobs accumulate, `ui_type` keeps its first writer, the challenge
/// request keeps its last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub action_context: Vec<Vec<u8>>,
    pub ui_type: Option<UiType>,
    pub challenge_request: HashMap<String, String>,
    /// Source screen id for navigation actions
    pub from_screen: Option<String>,
}

impl Action {
    /// Screen id when this is a `Show` action.
    pub fn screen_id(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Show { screen_id } => Some(screen_id.as_str()),
            _ => None,
        }
    }
}

/// A server-declared UI state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Screen {
    pub ui_type: Option<UiType>,
    /// Action fired automatically when the screen is shown
    pub action: Option<Action>,
    /// Opaque component subtree handed to the renderer untouched
    pub components: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_type_from_value_defaults_to_unknown() {
        assert_eq!(UiType::from_value(3), UiType::CartBuyButton);
        assert_eq!(UiType::from_value(999), UiType::Unknown);
        assert_eq!(UiType::from_value(-1), UiType::Unknown);
    }
}
