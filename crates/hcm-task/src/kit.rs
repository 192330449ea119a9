//! Execution context handed to a running Action.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use hcm_core::{HcmError, Result};
use hcm_store::Store;

/// What an Action sees while it runs.
#[derive(Clone)]
pub struct ExecuteKit {
    rid: String,
    cancel: CancellationToken,
    store: Arc<dyn Store>,
}

impl ExecuteKit {
    /// Create a kit with a fresh cancellation token.
    pub fn new(rid: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self::with_token(rid, store, CancellationToken::new())
    }

    /// Create a kit observing an existing token.
    pub fn with_token(
        rid: impl Into<String>,
        store: Arc<dyn Store>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rid: rid.into(),
            cancel,
            store,
        }
    }

    /// Correlation id for logs.
    #[must_use]
    pub fn rid(&self) -> &str {
        &self.rid
    }

    /// The storage layer.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// The cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Checkpoint: fail with `Cancelled` if cancellation was requested.
    ///
    /// Long-running Actions call this before every vendor page, chunk and
    /// write batch.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::Cancelled` once the token is cancelled.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(HcmError::Cancelled(format!("task {} cancelled", self.rid)));
        }
        Ok(())
    }
}

impl fmt::Debug for ExecuteKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteKit")
            .field("rid", &self.rid)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcm_core::ErrorKind;
    use hcm_store::MemoryStore;

    #[test]
    fn checkpoint_fails_after_cancel() {
        let kit = ExecuteKit::new("rid-1", Arc::new(MemoryStore::new()));
        assert!(kit.ensure_active().is_ok());

        kit.cancel_token().cancel();
        let err = kit.ensure_active().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.to_string().contains("rid-1"));
    }
}
