//! # Vending Types
//!
//! Core types, result bundles, and error definitions for the vending engine.
//!
//! This crate provides the foundational type system for the workspace:
//!
//! - **`error`** - Typed error hierarchy for validation, transport, and protocol faults
//! - **`models`** - Domain models (AuthContext, DeviceProfile, PurchaseItem)
//! - **`response`** - Response code domain and ordered result bundles
//! - **`params`** - Request parameter structs for the protocol operations
//!
//! ## Architecture Role
//!
//! `vending-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!         vending-types (this crate)
//!                 │
//!                 ▼
//!           vending-core
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for API/IPC
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;
pub mod params;
pub mod response;

// Re-export error types for convenience
pub use error::{BillingError, BillingResult};

// Re-export core model types
pub use models::{AuthContext, ClientIdentity, DeviceProfile, DisplayMetrics, PurchaseItem};

// Re-export request parameter structs
pub use params::{
    AcknowledgePurchaseParams, BuyFlowParams, ConsumePurchaseParams, GetPurchaseHistoryParams,
    GetSkuDetailsParams, ParamMap, ParamValue,
};

// Re-export response primitives
pub use response::{BundleValue, ResponseCode, ResultBundle};
