//! The Action contract and its type-erased form.

use async_trait::async_trait;
use schemars::gen::SchemaGenerator;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use hcm_core::{HcmError, Result};

use crate::kit::ExecuteKit;

/// Stable, globally unique name of an Action.
pub type ActionName = &'static str;

/// Semantic checks on decoded parameters, beyond what the type enforces.
pub trait Validate {
    /// Check the parameters. The default accepts everything.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::InvalidParameter` describing the first problem.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A named, idempotent unit of work with typed parameters.
///
/// `run` may be called more than once for the same parameters (retries,
/// duplicate submissions), so it must converge to the same end state.
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// The name tasks are submitted under.
    const NAME: ActionName;

    /// Decoded parameters.
    type Params: DeserializeOwned + JsonSchema + Validate + Send;

    /// Value reported on success.
    type Output: Serialize + Send;

    /// JSON schema of [`Self::Params`].
    fn parameter_shape() -> RootSchema
    where
        Self: Sized,
    {
        SchemaGenerator::default().into_root_schema_for::<Self::Params>()
    }

    /// Do the work.
    ///
    /// # Errors
    ///
    /// The error kind decides whether the executor retries.
    async fn run(&self, kit: &ExecuteKit, params: Self::Params) -> Result<Self::Output>;
}

/// An Action with its parameter and output types erased to JSON, as stored in
/// the [`ActionRegistry`](crate::ActionRegistry).
#[async_trait]
pub trait DynAction: Send + Sync {
    /// The Action's name.
    fn name(&self) -> ActionName;

    /// JSON schema of the parameters.
    fn parameter_shape(&self) -> Value;

    /// Decode and validate parameters without running.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::InvalidParameter` if decoding or validation fails.
    fn check(&self, params: &Value) -> Result<()>;

    /// Decode, validate and run.
    ///
    /// # Errors
    ///
    /// Returns `HcmError::InvalidParameter` before running if the parameters
    /// are rejected, otherwise whatever the Action returns.
    async fn run_json(&self, kit: &ExecuteKit, params: Value) -> Result<Value>;
}

fn decode<A: Action>(params: Value) -> Result<A::Params> {
    let decoded: A::Params = serde_json::from_value(params)
        .map_err(|e| HcmError::invalid_parameter(format!("{}: {e}", A::NAME)))?;
    decoded.validate()?;
    Ok(decoded)
}

#[async_trait]
impl<A: Action> DynAction for A {
    fn name(&self) -> ActionName {
        A::NAME
    }

    fn parameter_shape(&self) -> Value {
        serde_json::to_value(A::parameter_shape()).unwrap_or(Value::Null)
    }

    fn check(&self, params: &Value) -> Result<()> {
        decode::<A>(params.clone()).map(|_| ())
    }

    async fn run_json(&self, kit: &ExecuteKit, params: Value) -> Result<Value> {
        let params = decode::<A>(params)?;
        let output = self.run(kit, params).await?;
        serde_json::to_value(output)
            .map_err(|e| HcmError::invariant(format!("{}: unserializable output: {e}", A::NAME)))
    }
}
