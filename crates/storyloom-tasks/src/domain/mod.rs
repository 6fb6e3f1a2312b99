//! Domain types for task orchestration.

pub mod catalog;
pub mod commands;
