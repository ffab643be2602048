use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::ForceConfig;
use crate::database::TenantConnectionRegistry;
use crate::routes::RouteTable;

/// Process-root capability bundle handed to the dispatcher. Constructed
/// once in `main` (or per-test with fabricated parts) and shared by
/// reference, never through module globals.
pub struct AppState {
    pub config: ForceConfig,
    pub registry: TenantConnectionRegistry,
    pub routes: RouteTable,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl AppState {
    pub fn new(
        config: ForceConfig,
        registry: TenantConnectionRegistry,
        routes: RouteTable,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Arc<Self> {
        Arc::new(Self { config, registry, routes, broadcaster })
    }
}
