//! Adapter registry.
//!
//! Built once at process start and shared by reference. Vendor dispatch
//! happens here and nowhere else.

use std::collections::HashMap;
use std::sync::Arc;

use hcm_core::{HcmError, ResourceKind, Vendor};

use crate::adapter::ResourceAdapter;

/// Adapters keyed by `(vendor, kind)`.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(Vendor, ResourceKind), Arc<dyn ResourceAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own vendor and kind, replacing any
    /// previous one.
    pub fn register(&mut self, adapter: Arc<dyn ResourceAdapter>) -> &mut Self {
        let key = (adapter.vendor(), adapter.kind());
        if self.adapters.insert(key, adapter).is_some() {
            tracing::warn!(vendor = %key.0, kind = %key.1, "Adapter replaced");
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn ResourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Resolve the adapter for a vendor and kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if no adapter is registered.
    pub fn get(
        &self,
        vendor: Vendor,
        kind: ResourceKind,
    ) -> Result<Arc<dyn ResourceAdapter>, HcmError> {
        self.adapters
            .get(&(vendor, kind))
            .cloned()
            .ok_or_else(|| {
                HcmError::invalid_parameter(format!("no adapter registered for {vendor}/{kind}"))
            })
    }

    /// Registered `(vendor, kind)` pairs, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<(Vendor, ResourceKind)> {
        let mut keys: Vec<_> = self.adapters.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
