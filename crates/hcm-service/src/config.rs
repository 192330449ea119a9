//! Service configuration.

use std::path::Path;

use serde::Deserialize;

use hcm_bill::DailySummaryConfig;
use hcm_cloud::GatewayOptions;
use hcm_sync::{ReconcileConfig, SyncResourceParams};
use hcm_task::RetryPolicy;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. Without it the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum PostgreSQL connections (default: 10).
    pub database_max_connections: u32,

    /// Cloud gateway base URL (optional).
    pub gateway_url: Option<String>,

    /// Cloud gateway bearer token (optional).
    pub gateway_token: Option<String>,

    /// Cloud gateway client options.
    pub gateway: GatewayOptions,

    /// Vendor calls per second, per vendor (default: 20).
    pub gateway_requests_per_second: u32,

    /// Service API key for `/v1` requests.
    pub service_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Task retry policy.
    pub retry: RetryPolicy,

    /// Reconciler paging and batching.
    pub reconcile: ReconcileConfig,

    /// Billing aggregation paging.
    pub bill: DailySummaryConfig,

    /// Seconds between scheduled sync rounds. Zero disables the scheduler.
    pub sync_interval_seconds: u64,

    /// Scopes synced on every scheduled round.
    pub sync_scopes: Vec<SyncResourceParams>,
}

/// Cloud gateway secrets file structure.
#[derive(Debug, Deserialize)]
struct GatewaySecrets {
    url: String,
    token: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (gateway_url, gateway_token) = load_gateway_secrets();

        let retry = RetryPolicy {
            max_attempts: env_parse("TASK_MAX_ATTEMPTS").unwrap_or(defaults.retry.max_attempts),
            initial_backoff_ms: env_parse("TASK_INITIAL_BACKOFF_MS")
                .unwrap_or(defaults.retry.initial_backoff_ms),
            max_backoff_ms: env_parse("TASK_MAX_BACKOFF_MS")
                .unwrap_or(defaults.retry.max_backoff_ms),
        };
        let reconcile = ReconcileConfig {
            batch_size: env_parse("RECONCILE_BATCH_SIZE").unwrap_or(defaults.reconcile.batch_size),
            page_size: env_parse("RECONCILE_PAGE_SIZE").unwrap_or(defaults.reconcile.page_size),
        };
        let bill = DailySummaryConfig {
            item_page_size: env_parse("BILL_ITEM_PAGE_SIZE")
                .unwrap_or(defaults.bill.item_page_size),
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            gateway_url,
            gateway_token,
            gateway: defaults.gateway,
            gateway_requests_per_second: env_parse("CLOUD_GATEWAY_RPS")
                .unwrap_or(defaults.gateway_requests_per_second),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            retry,
            reconcile,
            bill,
            sync_interval_seconds: env_parse("SYNC_INTERVAL_SECONDS")
                .unwrap_or(defaults.sync_interval_seconds),
            sync_scopes: std::env::var("SYNC_SCOPES")
                .map(|raw| parse_sync_scopes(&raw))
                .unwrap_or_default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Parse `SYNC_SCOPES`: a JSON array of `sync_resource` parameters.
///
/// An unparsable value disables scheduled sync instead of aborting startup.
pub fn parse_sync_scopes(raw: &str) -> Vec<SyncResourceParams> {
    match serde_json::from_str(raw) {
        Ok(scopes) => scopes,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparsable SYNC_SCOPES");
            Vec::new()
        }
    }
}

/// Load gateway secrets from file or environment.
fn load_gateway_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/cloud-gateway.json",
        "hcm/.secrets/cloud-gateway.json",
        "../.secrets/cloud-gateway.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<GatewaySecrets>(path) {
            tracing::info!(path = %path, "Loaded cloud gateway secrets from file");
            return (Some(secrets.url), Some(secrets.token));
        }
    }

    tracing::debug!("Cloud gateway secrets file not found, using environment variables");
    (
        std::env::var("CLOUD_GATEWAY_URL").ok(),
        std::env::var("CLOUD_GATEWAY_TOKEN").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 10,
            gateway_url: None,
            gateway_token: None,
            gateway: GatewayOptions::default(),
            gateway_requests_per_second: 20,
            service_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            retry: RetryPolicy::default(),
            reconcile: ReconcileConfig::default(),
            bill: DailySummaryConfig::default(),
            sync_interval_seconds: 0,
            sync_scopes: Vec::new(),
        }
    }
}
