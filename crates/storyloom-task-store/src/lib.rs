//! In-memory task registry for the Storyloom narrative engine.
//!
//! Tasks live only as long as the server process; a restart drops them and
//! clients resolve the vanished ids as orphans.

pub mod memory_registry;
pub mod retention;
