//! Name to Action resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use hcm_core::{HcmError, Result};

use crate::action::{Action, DynAction};

/// Name and parameter schema of a registered Action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    /// Action name.
    pub name: &'static str,
    /// JSON schema of the parameters.
    pub parameter_shape: Value,
}

/// Registry of Actions keyed by name. Built at process start and shared
/// read-only afterwards.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Arc<dyn DynAction>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an Action, replacing any previous one with the same name.
    pub fn register<A: Action>(&mut self, action: A) -> &mut Self {
        if self.actions.insert(A::NAME, Arc::new(action)).is_some() {
            tracing::warn!(action = A::NAME, "Action registered twice, keeping the last one");
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<A: Action>(mut self, action: A) -> Self {
        self.register(action);
        self
    }

    /// Look up an Action by name.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::InvalidParameter` for an unknown name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DynAction>> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| HcmError::invalid_parameter(format!("unknown action: {name}")))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }

    /// Names and parameter schemas of every registered Action.
    #[must_use]
    pub fn describe(&self) -> Vec<ActionDescriptor> {
        self.actions
            .iter()
            .map(|(name, action)| ActionDescriptor {
                name,
                parameter_shape: action.parameter_shape(),
            })
            .collect()
    }

    /// Number of registered Actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
