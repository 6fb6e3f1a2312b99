//! Storyloom — resilient polling client for background tasks.
//!
//! Tracks the tasks a user submitted, keeps a durable snapshot of the
//! unfinished ones so a restart can pick them up again, polls the server
//! with one batched query per tick while anything is unfinished, and fires
//! each task's completion callback and notification exactly once.

pub mod dispatcher;
pub mod error;
pub mod http;
pub mod notify;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod tracked;
pub mod tracker;
