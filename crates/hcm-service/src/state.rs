//! Application state.

use std::sync::Arc;

use hcm_cloud::AdapterRegistry;
use hcm_store::Store;
use hcm_sync::{MutateResourceAction, Reconciler, ResourceOps, SyncResourceAction};
use hcm_task::{ActionRegistry, Executor};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs submitted tasks.
    pub executor: Executor,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Build the Action registry and the executor over `store` and `adapters`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        adapters: Arc<AdapterRegistry>,
        config: ServiceConfig,
    ) -> Self {
        let registry = build_registry(adapters, &config);
        tracing::info!(actions = ?registry.names(), "Actions registered");

        let executor = Executor::new(Arc::new(registry), store, config.retry);
        Self { executor, config }
    }
}

/// Every Action the service exposes.
fn build_registry(adapters: Arc<AdapterRegistry>, config: &ServiceConfig) -> ActionRegistry {
    let reconciler = Reconciler::new(config.reconcile);
    let ops = ResourceOps::new(Arc::clone(&adapters), reconciler);

    let mut registry = ActionRegistry::new();
    registry
        .register(SyncResourceAction::new(adapters, reconciler))
        .register(MutateResourceAction::new(ops));
    hcm_bill::register_actions(&mut registry, config.bill);
    registry
}
