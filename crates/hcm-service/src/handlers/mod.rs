//! API handlers.

pub mod actions;
pub mod health;
pub mod tasks;
