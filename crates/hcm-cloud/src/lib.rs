//! Vendor adapters for the hybrid cloud control plane.
//!
//! This crate defines the [`ResourceAdapter`] contract the reconciler relies
//! on, the [`AdapterRegistry`] that resolves an adapter for a vendor and
//! resource kind, and the implementations:
//!
//! - [`RestAdapter`]: talks to the cloud gateway over HTTP
//! - [`RateLimitedAdapter`]: token-bucket throttling around any adapter
//! - `testing::FakeCloud` (feature `test-utils`): a scripted in-memory vendor
//!
//! # Example
//!
//! ```no_run
//! use hcm_cloud::{gateway_registry, GatewayOptions};
//! use hcm_core::{ResourceKind, Scope, Vendor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = gateway_registry(
//!     "http://cloud-gateway.hcm.svc:8080",
//!     "gateway-token",
//!     &GatewayOptions::default(),
//!     20,
//! )?;
//!
//! let vpcs = registry.get(Vendor::Aws, ResourceKind::Vpc)?;
//! let scope = Scope::new(Vendor::Aws, "account-1", "us-east-1");
//! let page = vpcs.list(&scope, None).await?;
//! println!("{} VPCs on the first page", page.details.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod adapter;
mod error;
mod rate_limit;
mod registry;
mod rest;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapter::{CloudPage, ResourceAdapter};
pub use error::{CloudError, Result};
pub use rate_limit::{RateLimitedAdapter, TokenBucket};
pub use registry::AdapterRegistry;
pub use rest::{gateway_registry, GatewayOptions, RestAdapter};
