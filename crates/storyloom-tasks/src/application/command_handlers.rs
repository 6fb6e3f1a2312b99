//! Command handlers for task orchestration.
//!
//! Submission validates the input, allocates an id, hands the work to the
//! executor and returns without waiting for the work itself.

use tracing::info;

use storyloom_core::error::DomainError;
use storyloom_core::registry::TaskRegistry;
use storyloom_core::task::TaskId;

use crate::application::executor::TaskExecutor;
use crate::domain::catalog::WorkCatalog;
use crate::domain::commands::SubmitTask;

/// Handles the `SubmitTask` command.
///
/// Validation failures are reported before any id is allocated.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank label, a non-object payload,
/// an unknown kind, or input the unit of work rejects;
/// `DomainError::WorkUnavailable` when no unit is registered for the kind;
/// and the registry's error if the task cannot be stored.
pub async fn handle_submit_task(
    command: SubmitTask,
    catalog: &WorkCatalog,
    registry: &dyn TaskRegistry,
    executor: &TaskExecutor,
) -> Result<TaskId, DomainError> {
    let label = command.label.trim();
    if label.is_empty() {
        return Err(DomainError::Validation("label must not be empty".into()));
    }
    if !command.payload.is_object() {
        return Err(DomainError::Validation("payload must be a JSON object".into()));
    }

    let work = catalog.resolve(command.kind)?;
    work.validate(&command.payload)?;

    let task_id = registry.create(command.kind, label).await?;
    info!(
        correlation_id = %command.correlation_id,
        task_id = %task_id,
        kind = %command.kind,
        "task submitted"
    );

    executor.spawn(task_id, work, command.payload);

    Ok(task_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};
    use storyloom_core::error::DomainError;
    use storyloom_core::registry::TaskRegistry;
    use storyloom_core::task::{TaskKind, TaskStatus};
    use storyloom_task_store::memory_registry::InMemoryTaskRegistry;
    use storyloom_test_support::{FailingTaskRegistry, FixedClock, GatedWork};
    use uuid::Uuid;

    use super::handle_submit_task;
    use crate::application::executor::TaskExecutor;
    use crate::domain::catalog::WorkCatalog;
    use crate::domain::commands::SubmitTask;

    fn command(kind: TaskKind, label: &str, payload: Value) -> SubmitTask {
        SubmitTask {
            correlation_id: Uuid::new_v4(),
            kind,
            label: label.to_owned(),
            payload,
        }
    }

    fn registry() -> Arc<InMemoryTaskRegistry> {
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Arc::new(InMemoryTaskRegistry::new(Arc::new(FixedClock(fixed_now))))
    }

    #[tokio::test]
    async fn test_submit_returns_id_before_work_finishes() {
        // Arrange
        let registry = registry();
        let executor = TaskExecutor::new(registry.clone());
        let work = Arc::new(GatedWork::new());
        let catalog = WorkCatalog::new().with(TaskKind::Analyze, work.clone());

        // Act
        let task_id = handle_submit_task(
            command(TaskKind::Analyze, "Chapter one", json!({ "text": "Once" })),
            &catalog,
            registry.as_ref(),
            &executor,
        )
        .await
        .unwrap();

        // Assert
        let found = registry.get(&[task_id]).await.unwrap();
        assert!(!found[&task_id].is_terminal());
        assert_eq!(found[&task_id].label, "Chapter one");

        work.release();
        loop {
            let found = registry.get(&[task_id]).await.unwrap();
            if found[&task_id].status() == TaskStatus::Completed {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_rejected_payload_allocates_no_task() {
        // Arrange
        let registry = registry();
        let executor = TaskExecutor::new(registry.clone());
        let catalog = WorkCatalog::new().with(TaskKind::Analyze, Arc::new(GatedWork::new()));

        // Act
        let result = handle_submit_task(
            command(TaskKind::Analyze, "Chapter one", json!({ "title": "no text" })),
            &catalog,
            registry.as_ref(),
            &executor,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_blank_label_and_non_object_payload_are_rejected() {
        let registry = registry();
        let executor = TaskExecutor::new(registry.clone());
        let catalog = WorkCatalog::new().with(TaskKind::Analyze, Arc::new(GatedWork::new()));

        let blank = handle_submit_task(
            command(TaskKind::Analyze, "   ", json!({ "text": "x" })),
            &catalog,
            registry.as_ref(),
            &executor,
        )
        .await;
        let not_object = handle_submit_task(
            command(TaskKind::Analyze, "label", json!("text")),
            &catalog,
            registry.as_ref(),
            &executor,
        )
        .await;

        assert!(matches!(blank, Err(DomainError::Validation(_))));
        assert!(matches!(not_object, Err(DomainError::Validation(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_unavailable() {
        let registry = registry();
        let executor = TaskExecutor::new(registry.clone());

        let result = handle_submit_task(
            command(TaskKind::GenerateDescription, "Eldoria", json!({})),
            &WorkCatalog::new(),
            registry.as_ref(),
            &executor,
        )
        .await;

        assert!(matches!(
            result,
            Err(DomainError::WorkUnavailable(TaskKind::GenerateDescription))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let registry = Arc::new(FailingTaskRegistry);
        let executor = TaskExecutor::new(registry.clone());
        let catalog = WorkCatalog::new().with(TaskKind::Analyze, Arc::new(GatedWork::new()));

        let result = handle_submit_task(
            command(TaskKind::Analyze, "label", json!({ "text": "x" })),
            &catalog,
            registry.as_ref(),
            &executor,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
