//! HCM Service - HTTP API and sync scheduler for the hybrid cloud control plane
//!
//! This is the main entry point for the hcm service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hcm_cloud::{gateway_registry, AdapterRegistry};
use hcm_service::{create_router, scheduler, AppState, ServiceConfig};
use hcm_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hcm=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HCM Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_url.is_some(),
        gateway_configured = %config.gateway_url.is_some(),
        sync_scopes = config.sync_scopes.len(),
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;

    let adapters = match (&config.gateway_url, &config.gateway_token) {
        (Some(url), Some(token)) => {
            tracing::info!(gateway_url = %url, "Cloud gateway enabled");
            gateway_registry(url, token, &config.gateway, config.gateway_requests_per_second)?
        }
        _ => {
            tracing::warn!("Cloud gateway not configured - sync and mutation tasks will fail");
            AdapterRegistry::new()
        }
    };

    let state = AppState::new(store, Arc::new(adapters), config.clone());
    let executor = state.executor.clone();

    let scheduler = (config.sync_interval_seconds > 0 && !config.sync_scopes.is_empty()).then(|| {
        scheduler::spawn(
            executor.clone(),
            config.sync_scopes.clone(),
            Duration::from_secs(config.sync_interval_seconds),
            executor.shutdown_token(),
        )
    });

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, cancelling running tasks");
    executor.shutdown();
    if let Some(scheduler) = scheduler {
        scheduler.await?;
    }

    Ok(())
}

async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match &config.database_url {
        #[cfg(feature = "postgres")]
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL store");
            let store = hcm_store::PgStore::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => Err("DATABASE_URL is set but the postgres feature is disabled".into()),
        None => {
            tracing::warn!(
                "DATABASE_URL not set - using the in-memory store, state is lost on restart"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
