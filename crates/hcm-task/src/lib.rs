//! Task action framework for the hybrid cloud control plane.
//!
//! Every unit of control plane work is an [`Action`]: a named, idempotent
//! operation with typed parameters. Parameters arrive as JSON, are decoded
//! and validated before the Action runs, and are described by a JSON schema
//! so callers can discover them.
//!
//! - [`ActionRegistry`]: resolves an Action by name, built once at startup
//! - [`ExecuteKit`]: what a running Action gets (correlation id, cancellation
//!   token, storage handle)
//! - [`Executor`]: submits tasks, retries transient failures with bounded
//!   exponential backoff, and tracks each task's outcome
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! use hcm_core::Result;
//! use hcm_store::MemoryStore;
//! use hcm_task::{Action, ActionRegistry, ExecuteKit, Executor, RetryPolicy, Validate};
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Greet {
//!     name: String,
//! }
//!
//! impl Validate for Greet {}
//!
//! struct GreetAction;
//!
//! #[async_trait]
//! impl Action for GreetAction {
//!     const NAME: &'static str = "greet";
//!     type Params = Greet;
//!     type Output = String;
//!
//!     async fn run(&self, _kit: &ExecuteKit, params: Greet) -> Result<String> {
//!         Ok(format!("hello {}", params.name))
//!     }
//! }
//!
//! # async fn example() -> hcm_core::Result<()> {
//! let registry = ActionRegistry::new().with(GreetAction);
//! let executor = Executor::new(
//!     Arc::new(registry),
//!     Arc::new(MemoryStore::new()),
//!     RetryPolicy::default(),
//! );
//!
//! let handle = executor
//!     .submit("greet", serde_json::json!({"name": "ops"}))
//!     .await?;
//! let record = handle.wait().await?;
//! println!("{:?}", record.result);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod action;
mod executor;
mod kit;
mod registry;
mod retry;

pub use action::{Action, ActionName, DynAction, Validate};
pub use executor::{Executor, TaskError, TaskHandle, TaskRecord, TaskState};
pub use kit::ExecuteKit;
pub use registry::{ActionDescriptor, ActionRegistry};
pub use retry::RetryPolicy;
