//! HTTP API for the hybrid cloud control plane.
//!
//! The service is a thin shell around the task framework: every operation is
//! submitted as a named Action with JSON parameters and runs in the
//! background on the [`Executor`](hcm_task::Executor).
//!
//! - `GET /health` reports liveness
//! - `GET /v1/actions` lists the registered Actions and their parameter shapes
//! - `POST /v1/tasks` submits a task, `GET /v1/tasks/{id}` reads it back
//! - `POST /v1/tasks/{id}/cancel` requests cancellation
//!
//! A [`scheduler`] submits periodic `sync_resource` tasks for the configured
//! scopes.
//!
//! # Authentication
//!
//! Everything under `/v1` requires the service API key in `x-api-key`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
