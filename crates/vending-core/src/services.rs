//! Shared engine services.
//!
//! Everything with cross-flow lifetime lives here, explicitly owned and
//! injected — the caches, the ledger, and the external collaborators.
//! One `EngineServices` instance backs one engine; tests build theirs
//! from fakes.

use crate::cache::{ResponseCache, SessionCache, SESSION_TTL};
use crate::config::ApiConfig;
use crate::ledger::PurchaseLedger;
use crate::protocol::ProtocolSession;
use crate::providers::{AuthProvider, ChallengeSolver, DeviceIdentityProvider, SettingsStore};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use vending_types::BillingResult;

/// Capacity of the SKU details response cache.
const SKU_CACHE_CAPACITY: usize = 2048;
/// TTL of cached SKU details responses.
const SKU_CACHE_TTL: Duration = Duration::from_secs(7200);

/// Injected collaborators plus the shared caches and ledger.
pub struct EngineServices {
    pub auth: Arc<dyn AuthProvider>,
    pub identity: Arc<dyn DeviceIdentityProvider>,
    pub transport: Arc<dyn Transport>,
    pub solver: Arc<dyn ChallengeSolver>,
    pub settings: Arc<dyn SettingsStore>,
    pub config: Arc<ApiConfig>,
    pub sessions: SessionCache<ProtocolSession>,
    pub sku_cache: Arc<ResponseCache>,
    pub ledger: PurchaseLedger,
}

impl EngineServices {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        identity: Arc<dyn DeviceIdentityProvider>,
        transport: Arc<dyn Transport>,
        solver: Arc<dyn ChallengeSolver>,
        settings: Arc<dyn SettingsStore>,
        config: ApiConfig,
    ) -> Self {
        Self {
            auth,
            identity,
            transport,
            solver,
            settings,
            config: Arc::new(config),
            sessions: SessionCache::new(SESSION_TTL),
            sku_cache: Arc::new(ResponseCache::new(SKU_CACHE_CAPACITY, SKU_CACHE_TTL)),
            ledger: PurchaseLedger::new(),
        }
    }

    /// Live protocol session for `(package, account)`, built on demand.
    pub async fn session(
        &self,
        package: &str,
        account: &str,
    ) -> BillingResult<Arc<ProtocolSession>> {
        self.sessions
            .get_or_create(package, account, || async {
                let auth = self.auth.obtain(account).await?;
                let device = self.identity.snapshot().await;
                let client = self.identity.resolve(package).await?;
                Ok(ProtocolSession::new(
                    auth,
                    device,
                    client,
                    Arc::clone(&self.transport),
                    Arc::clone(&self.config),
                    Arc::clone(&self.sku_cache),
                ))
            })
            .await
    }
}
