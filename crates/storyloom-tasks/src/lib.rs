//! Storyloom — background task orchestration.
//!
//! Accepts units of work, runs each one on its own detached tokio task and
//! records the outcome in the task registry, which the batched status
//! query reads from.

pub mod application;
pub mod domain;
