//! Shared test doubles for the Storyloom task orchestration crates.

mod clock;
mod notify;
mod registry;
mod service;
mod work;

pub use clock::{FixedClock, ManualClock};
pub use notify::RecordingNotifier;
pub use registry::{CountingTaskRegistry, FailingTaskRegistry};
pub use service::ScriptedTaskService;
pub use work::{FailingWork, GatedWork, PanickingWork, ProgressWork, StaticWork};
