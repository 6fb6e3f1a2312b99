//! Application services: submission, execution and status queries.

pub mod command_handlers;
pub mod executor;
pub mod query_handlers;
