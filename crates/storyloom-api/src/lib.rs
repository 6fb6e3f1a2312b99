//! Storyloom API — HTTP server for submitting background tasks and polling
//! their status.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod telemetry;
pub mod work;
