//! Reconciliation of cloud resources into the local system-of-record.
//!
//! The [`Reconciler`] drives one resource kind in one scope to convergence
//! with the vendor:
//!
//! 1. **Forward pass**: page the vendor listing and upsert every descriptor.
//! 2. **Reverse pass**: collect local cloud ids the listing did not report.
//! 3. **Confirmation pass**: look those ids up by id at the vendor; any that
//!    still exist are kept.
//! 4. **Batched delete**: delete what remains, one transaction per chunk.
//!
//! Each step is a separate method over plain id sets, so a run can be tested
//! step by step. [`ResourceOps`] wraps vendor mutations with the targeted
//! sync that follows them, and the [`SyncResourceAction`] and
//! [`MutateResourceAction`] expose both to the task executor.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod action;
mod config;
pub mod jobs;
mod ops;
mod reconciler;
pub mod relations;

pub use action::{
    MutateResourceAction, MutateResourceParams, Mutation, MutationReport, SyncResourceAction,
    SyncResourceParams,
};
pub use config::ReconcileConfig;
pub use jobs::{job_for, CvmSync, DiskSync, EipSync, SyncJob, VpcSync};
pub use ops::ResourceOps;
pub use reconciler::{ForwardOutcome, ReconcileReport, Reconciler};
