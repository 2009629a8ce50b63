//! # Vending Core
//!
//! Client-side protocol engine for an in-app purchase flow against a
//! proprietary app-store backend.
//!
//! ## Architecture
//!
//! ```text
//! vending-core/src/
//! ├── wire.rs        # prost message schema (opaque, versioned)
//! ├── transport.rs   # HTTP boundary (reqwest impl + trait)
//! ├── protocol/      # request assembly + the five session operations
//! ├── flow/          # action/screen parser + buy-flow state machine
//! ├── cache/         # response cache (LRU+TTL) + session cache (TTL)
//! ├── ledger.rs      # per-(account,package) purchase tracking
//! ├── providers.rs   # external collaborator traits
//! └── dispatch.rs    # validation + the externally callable surface
//! ```
//!
//! Data flows dispatcher → session cache → protocol client → parser →
//! state machine, which loops back into the client or terminates with a
//! result bundle.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod flow;
pub mod ledger;
pub mod protocol;
pub mod providers;
pub mod services;
pub mod transport;
pub mod wire;

pub use cache::{ResponseCache, SessionCache};
pub use config::ApiConfig;
pub use dispatch::{BillingService, StartedFlow, SUPPORTED_SKU_TYPES};
pub use flow::{Action, ActionKind, BuyFlowEngine, FlowEvent, FlowState, Screen, UiType};
pub use ledger::PurchaseLedger;
pub use protocol::ProtocolSession;
pub use providers::{
    AuthProvider, ChallengeSolver, DeviceIdentityProvider, MemorySettings, ProviderError,
    SettingsStore,
};
pub use services::EngineServices;
pub use transport::{HttpTransport, Transport};

/// Install a global tracing subscriber honoring `RUST_LOG`.
///
/// Intended for binaries and examples embedding the engine; library users
/// bring their own subscriber.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
