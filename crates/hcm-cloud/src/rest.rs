//! Cloud gateway adapter.
//!
//! Vendor SDK calls live behind an HTTP gateway that exposes one uniform
//! resource API per vendor and kind:
//!
//! | Operation     | Request                                              |
//! |---------------|------------------------------------------------------|
//! | `list`        | `GET  /v1/{vendor}/{kind}?account_id&region&zone&cursor&limit` |
//! | `list_by_ids` | `POST /v1/{vendor}/{kind}/query`                     |
//! | `create`      | `POST /v1/{vendor}/{kind}`                           |
//! | `delete`      | `DELETE /v1/{vendor}/{kind}/{cloud_id}?account_id&region&zone` |
//! | `attach`      | `POST /v1/{vendor}/{kind}/{cloud_id}/attach`         |
//! | `detach`      | `POST /v1/{vendor}/{kind}/{cloud_id}/detach`         |
//!
//! Errors use the `{ "error": { "code", "message" } }` envelope.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hcm_core::{CloudResource, ResourceKind, Scope, Vendor};

use crate::adapter::{check_query_limit, CloudPage, ResourceAdapter};
use crate::error::{CloudError, Result};
use crate::rate_limit::{RateLimitedAdapter, TokenBucket};
use crate::registry::AdapterRegistry;

/// Gateway client options.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Page size requested from `list` (default: 100).
    pub page_size: u32,
    /// Maximum ids per `list_by_ids` call (default: 100).
    pub query_limit: usize,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            page_size: 100,
            query_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ScopedRequest<'a, T: Serialize> {
    account_id: &'a str,
    region: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<&'a str>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    cloud_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    spec: &'a Value,
}

#[derive(Debug, Serialize)]
struct AttachBody<'a> {
    target_cloud_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    details: Vec<CloudResource>,
}

/// Adapter for one vendor and kind behind the cloud gateway.
#[derive(Debug, Clone)]
pub struct RestAdapter {
    client: Client,
    base_url: String,
    token: String,
    vendor: Vendor,
    kind: ResourceKind,
    page_size: u32,
    query_limit: usize,
}

impl RestAdapter {
    /// Create a gateway adapter.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Configuration` if the base URL is empty or the HTTP
    /// client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        vendor: Vendor,
        kind: ResourceKind,
        options: &GatewayOptions,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| CloudError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(client, base_url, token, vendor, kind, options)
    }

    /// Create a gateway adapter sharing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Configuration` if the base URL is empty.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        vendor: Vendor,
        kind: ResourceKind,
        options: &GatewayOptions,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CloudError::Configuration("gateway URL is empty".into()));
        }
        Ok(Self {
            client,
            base_url,
            token: token.into(),
            vendor,
            kind,
            page_size: options.page_size,
            query_limit: options.query_limit,
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v1/{}/{}{suffix}", self.base_url, self.vendor, self.kind)
    }

    fn scope_query(scope: &Scope) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("account_id", scope.account_id.clone()),
            ("region", scope.region.clone()),
        ];
        if let Some(zone) = &scope.zone {
            query.push(("zone", zone.clone()));
        }
        query
    }

    fn scoped<'a, T: Serialize>(scope: &'a Scope, body: T) -> ScopedRequest<'a, T> {
        ScopedRequest {
            account_id: &scope.account_id,
            region: &scope.region,
            zone: scope.zone.as_deref(),
            body,
        }
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: std::result::Result<ApiErrorResponse, _> = response.json().await;
        match error_body {
            Ok(api_error) => Err(CloudError::Api {
                code: api_error.error.code,
                message: api_error.error.message,
                status: status.as_u16(),
            }),
            Err(_) => Err(CloudError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }

    /// Like [`handle_response`](Self::handle_response) for bodiless replies.
    async fn handle_empty(&self, response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }
        self.handle_response::<Value>(response).await.map(|_| ())
    }
}

#[async_trait]
impl ResourceAdapter for RestAdapter {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn query_limit(&self) -> usize {
        self.query_limit
    }

    async fn list(&self, scope: &Scope, cursor: Option<&str>) -> Result<CloudPage> {
        let mut query = Self::scope_query(scope);
        query.push(("limit", self.page_size.to_string()));
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(self.url(""))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await?;

        let page: CloudPage = self.handle_response(response).await?;
        tracing::debug!(
            vendor = %self.vendor,
            kind = %self.kind,
            count = page.details.len(),
            has_next = page.next_cursor.is_some(),
            "Listed cloud page"
        );
        Ok(page)
    }

    async fn list_by_ids(&self, scope: &Scope, ids: &[String]) -> Result<Vec<CloudResource>> {
        check_query_limit(self, ids)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.url("/query"))
            .bearer_auth(&self.token)
            .json(&Self::scoped(scope, QueryBody { cloud_ids: ids }))
            .send()
            .await?;

        let body: DetailsResponse = self.handle_response(response).await?;
        Ok(body.details)
    }

    async fn create(&self, scope: &Scope, spec: &Value) -> Result<Vec<CloudResource>> {
        let response = self
            .client
            .post(self.url(""))
            .bearer_auth(&self.token)
            .json(&Self::scoped(scope, CreateBody { spec }))
            .send()
            .await?;

        let body: DetailsResponse = self.handle_response(response).await?;
        Ok(body.details)
    }

    async fn delete(&self, scope: &Scope, cloud_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/{cloud_id}")))
            .bearer_auth(&self.token)
            .query(&Self::scope_query(scope))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.handle_empty(response).await
    }

    async fn attach(&self, scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/{cloud_id}/attach")))
            .bearer_auth(&self.token)
            .json(&Self::scoped(scope, AttachBody { target_cloud_id }))
            .send()
            .await?;
        self.handle_empty(response).await
    }

    async fn detach(&self, scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/{cloud_id}/detach")))
            .bearer_auth(&self.token)
            .json(&Self::scoped(scope, AttachBody { target_cloud_id }))
            .send()
            .await?;
        self.handle_empty(response).await
    }
}

/// Build a registry with a rate-limited gateway adapter for every vendor and
/// kind. Adapters of one vendor share one token bucket.
///
/// # Errors
///
/// Returns `CloudError::Configuration` if an adapter cannot be built.
pub fn gateway_registry(
    base_url: &str,
    token: &str,
    options: &GatewayOptions,
    requests_per_second: u32,
) -> Result<AdapterRegistry> {
    let client = Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .build()
        .map_err(|e| CloudError::Configuration(format!("failed to build HTTP client: {e}")))?;

    let mut registry = AdapterRegistry::new();
    for vendor in Vendor::ALL {
        let bucket = Arc::new(TokenBucket::per_second(requests_per_second));
        for kind in ResourceKind::ALL {
            let adapter =
                RestAdapter::with_client(client.clone(), base_url, token, vendor, kind, options)?;
            registry.register(Arc::new(RateLimitedAdapter::new(
                Arc::new(adapter),
                Arc::clone(&bucket),
            )));
        }
    }

    tracing::info!(
        gateway = %base_url,
        adapters = registry.len(),
        requests_per_second,
        "Cloud gateway adapters registered"
    );
    Ok(registry)
}
