//! Periodic retention sweep of finished tasks.
//!
//! Spawns a background task that applies the retention policy to the
//! registry on a fixed interval. Abort the returned handle to stop it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use storyloom_task_store::memory_registry::InMemoryTaskRegistry;
use storyloom_task_store::retention::RetentionPolicy;

/// Starts sweeping `registry` every `every`. The first sweep runs one
/// interval after start.
pub fn spawn_retention_sweeper(
    registry: Arc<InMemoryTaskRegistry>,
    policy: RetentionPolicy,
    every: Duration,
) -> JoinHandle<()> {
    info!(
        max_age_secs = policy.max_age.as_secs(),
        max_entries = policy.max_entries,
        interval_secs = every.as_secs(),
        "retention sweeper started"
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = registry.sweep(&policy);
            if evicted == 0 {
                debug!("retention sweep found nothing to evict");
            }
        }
    })
}
