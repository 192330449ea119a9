//! Executor retry, cancellation and reporting tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Notify;

use hcm_core::{ErrorKind, HcmError, Result};
use hcm_store::MemoryStore;
use hcm_task::{Action, ActionRegistry, ExecuteKit, Executor, RetryPolicy, TaskState, Validate};

#[derive(Deserialize, JsonSchema)]
struct Flaky {
    /// Attempts that fail before one succeeds.
    failures: u32,
    /// Failure kind: "upstream", "storage", "invariant".
    kind: String,
}

impl Validate for Flaky {
    fn validate(&self) -> Result<()> {
        match self.kind.as_str() {
            "upstream" | "storage" | "invariant" => Ok(()),
            other => Err(HcmError::invalid_parameter(format!("unknown kind {other}"))),
        }
    }
}

#[derive(Default)]
struct FlakyAction {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Action for FlakyAction {
    const NAME: &'static str = "flaky";
    type Params = Flaky;
    type Output = u32;

    async fn run(&self, _kit: &ExecuteKit, params: Flaky) -> Result<u32> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= params.failures {
            return Err(match params.kind.as_str() {
                "upstream" => HcmError::upstream("aws", "throttled"),
                "storage" => HcmError::storage("deadlock"),
                _ => HcmError::invariant("two pull tasks"),
            });
        }
        Ok(call)
    }
}

#[derive(Deserialize, JsonSchema)]
struct Steps {
    steps: u32,
}

impl Validate for Steps {}

/// Runs `steps` checkpointed steps, pausing on `gate` after the first.
struct SteppedAction {
    gate: Arc<Notify>,
    done: Arc<AtomicU32>,
}

#[async_trait]
impl Action for SteppedAction {
    const NAME: &'static str = "stepped";
    type Params = Steps;
    type Output = u32;

    async fn run(&self, kit: &ExecuteKit, params: Steps) -> Result<u32> {
        for step in 0..params.steps {
            kit.ensure_active()?;
            self.done.fetch_add(1, Ordering::SeqCst);
            if step == 0 {
                self.gate.notified().await;
            }
        }
        Ok(params.steps)
    }
}

fn executor(registry: ActionRegistry) -> Executor {
    Executor::new(
        Arc::new(registry),
        Arc::new(MemoryStore::new()),
        RetryPolicy::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let exec = executor(ActionRegistry::new().with(FlakyAction {
        calls: Arc::clone(&calls),
    }));

    let handle = exec
        .submit("flaky", json!({"failures": 2, "kind": "upstream"}))
        .await
        .unwrap();
    let record = handle.wait().await.unwrap();

    assert_eq!(record.state, TaskState::Succeeded);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.result, Some(json!(3)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let calls = Arc::new(AtomicU32::new(0));
    let exec = executor(ActionRegistry::new().with(FlakyAction {
        calls: Arc::clone(&calls),
    }));

    let record = exec
        .submit("flaky", json!({"failures": 10, "kind": "storage"}))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(record.state, TaskState::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.error.unwrap().kind, ErrorKind::StorageFailure);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invariant_violations_are_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let exec = executor(ActionRegistry::new().with(FlakyAction {
        calls: Arc::clone(&calls),
    }));

    let record = exec
        .submit("flaky", json!({"failures": 1, "kind": "invariant"}))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(record.state, TaskState::Failed);
    assert_eq!(record.attempts, 1);
    let error = record.error.unwrap();
    assert_eq!(error.kind, ErrorKind::InvariantViolation);
    assert!(error.message.contains("two pull tasks"));
}

#[tokio::test]
async fn invalid_parameters_never_start_a_task() {
    let calls = Arc::new(AtomicU32::new(0));
    let exec = executor(ActionRegistry::new().with(FlakyAction {
        calls: Arc::clone(&calls),
    }));

    let bad_kind = exec
        .submit("flaky", json!({"failures": 0, "kind": "meteor"}))
        .await
        .unwrap_err();
    assert_eq!(bad_kind.kind(), ErrorKind::InvalidParameter);

    let missing = exec.submit("flaky", json!({})).await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::InvalidParameter);

    let unknown = exec.submit("nope", json!({})).await.unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::InvalidParameter);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(exec.active().await.is_empty());
}

#[tokio::test]
async fn cancellation_stops_at_next_checkpoint() {
    let gate = Arc::new(Notify::new());
    let done = Arc::new(AtomicU32::new(0));
    let exec = executor(ActionRegistry::new().with(SteppedAction {
        gate: Arc::clone(&gate),
        done: Arc::clone(&done),
    }));

    let handle = exec.submit("stepped", json!({"steps": 5})).await.unwrap();
    let id = handle.id();

    while done.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(exec.cancel(&id).await);
    gate.notify_one();

    let record = handle.wait().await.unwrap();
    assert_eq!(record.state, TaskState::Cancelled);
    assert_eq!(record.error.unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(done.load(Ordering::SeqCst), 1);

    let stored = exec.get(&id).await.unwrap();
    assert_eq!(stored.state, TaskState::Cancelled);
    assert!(!exec.cancel(&id).await);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let exec = Executor::new(
        Arc::new(ActionRegistry::new().with(FlakyAction::default())),
        Arc::new(MemoryStore::new()),
        RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
        },
    );

    let handle = exec
        .submit("flaky", json!({"failures": 5, "kind": "upstream"}))
        .await
        .unwrap();
    let id = handle.id();

    // Let the first attempt fail and the retry wait begin.
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel();

    let record = handle.wait().await.unwrap();
    assert_eq!(record.state, TaskState::Cancelled);
    assert_eq!(record.attempts, 1);
    assert_eq!(exec.get(&id).await.unwrap().state, TaskState::Cancelled);
}

#[tokio::test]
async fn shutdown_cancels_new_and_running_tasks() {
    let exec = executor(ActionRegistry::new().with(FlakyAction::default()));
    exec.shutdown();

    let record = exec
        .submit("flaky", json!({"failures": 0, "kind": "upstream"}))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(record.state, TaskState::Cancelled);
    assert_eq!(record.attempts, 0);
}
