//! Rate limiting for vendor calls.
//!
//! Vendor APIs throttle per account and per API family. A [`TokenBucket`] is
//! shared by every adapter of one vendor, and [`RateLimitedAdapter`] waits
//! for a token before each call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use hcm_core::{CloudResource, ResourceKind, Scope, Vendor};

use crate::adapter::{CloudPage, ResourceAdapter};
use crate::error::Result;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter.
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket holding up to `capacity` tokens, refilled continuously
    /// at `refill_per_second`.
    #[must_use]
    pub fn new(capacity: u32, refill_per_second: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_second: f64::from(refill_per_second.max(1)),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// A bucket allowing bursts of one second's worth of calls.
    #[must_use]
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(requests_per_second, requests_per_second)
    }

    /// Take a token, waiting until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                (1.0 - state.tokens) / self.refill_per_second
            };
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }

    /// Take a token if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Adapter wrapper that takes a token before every vendor call.
pub struct RateLimitedAdapter {
    inner: Arc<dyn ResourceAdapter>,
    bucket: Arc<TokenBucket>,
}

impl RateLimitedAdapter {
    /// Wrap `inner`, drawing tokens from `bucket`.
    #[must_use]
    pub fn new(inner: Arc<dyn ResourceAdapter>, bucket: Arc<TokenBucket>) -> Self {
        Self { inner, bucket }
    }
}

#[async_trait]
impl ResourceAdapter for RateLimitedAdapter {
    fn vendor(&self) -> Vendor {
        self.inner.vendor()
    }

    fn kind(&self) -> ResourceKind {
        self.inner.kind()
    }

    fn query_limit(&self) -> usize {
        self.inner.query_limit()
    }

    async fn list(&self, scope: &Scope, cursor: Option<&str>) -> Result<CloudPage> {
        self.bucket.acquire().await;
        self.inner.list(scope, cursor).await
    }

    async fn list_by_ids(&self, scope: &Scope, ids: &[String]) -> Result<Vec<CloudResource>> {
        self.bucket.acquire().await;
        self.inner.list_by_ids(scope, ids).await
    }

    async fn create(&self, scope: &Scope, spec: &Value) -> Result<Vec<CloudResource>> {
        self.bucket.acquire().await;
        self.inner.create(scope, spec).await
    }

    async fn delete(&self, scope: &Scope, cloud_id: &str) -> Result<()> {
        self.bucket.acquire().await;
        self.inner.delete(scope, cloud_id).await
    }

    async fn attach(&self, scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        self.bucket.acquire().await;
        self.inner.attach(scope, cloud_id, target_cloud_id).await
    }

    async fn detach(&self, scope: &Scope, cloud_id: &str, target_cloud_id: &str) -> Result<()> {
        self.bucket.acquire().await;
        self.inner.detach(scope, cloud_id, target_cloud_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCloud;

    #[tokio::test(start_paused = true)]
    async fn burst_then_throttle() {
        let bucket = TokenBucket::new(2, 1);
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bucket.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_refill() {
        let bucket = TokenBucket::new(1, 2);
        bucket.acquire().await;

        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn wrapper_delegates() {
        let fake = Arc::new(FakeCloud::new(Vendor::Aws, ResourceKind::Eip));
        let scope = Scope::new(Vendor::Aws, "acc", "r");
        fake.insert(&scope, CloudResource::new("eip-1", "a"));

        let limited = RateLimitedAdapter::new(fake.clone(), Arc::new(TokenBucket::per_second(5)));
        let page = limited.list(&scope, None).await.unwrap();
        assert_eq!(page.details.len(), 1);
        assert_eq!(limited.kind(), ResourceKind::Eip);
        assert_eq!(fake.list_calls(), 1);
    }
}
