//! Storyloom Core — shared task vocabulary.
//!
//! This crate defines the task model and the traits at the seams of the
//! orchestration subsystem: the registry, the unit of work, the client's
//! view of the task service, and user notifications. It contains no
//! infrastructure code.

pub mod clock;
pub mod error;
pub mod notify;
pub mod registry;
pub mod service;
pub mod task;
pub mod work;
