//! Query handlers for task orchestration.
//!
//! Batched status lookups for pollers and a single-task detail view.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use storyloom_core::error::DomainError;
use storyloom_core::registry::TaskRegistry;
use storyloom_core::task::{TaskId, TaskKind, TaskProgress, TaskStatus, TaskStatusEntry};

/// Returns the status of every requested id the registry still holds.
///
/// Ids the registry does not know are omitted, never reported as pending.
/// An empty request returns immediately without touching the registry.
/// Duplicate ids are answered once, in first-seen order.
///
/// # Errors
///
/// Returns the registry's error if the lookup fails.
pub async fn query_task_statuses(
    ids: &[TaskId],
    registry: &dyn TaskRegistry,
) -> Result<Vec<TaskStatusEntry>, DomainError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::with_capacity(ids.len());
    let unique: Vec<TaskId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let found = registry.get(&unique).await?;
    Ok(unique
        .iter()
        .filter_map(|id| found.get(id).map(storyloom_core::task::Task::to_status_entry))
        .collect())
}

/// Read-only view of a single task.
#[derive(Debug, Serialize)]
pub struct TaskDetailView {
    /// Task identifier.
    pub id: TaskId,
    /// Kind of work.
    pub kind: TaskKind,
    /// Caller-supplied label.
    pub label: String,
    /// Current status.
    pub status: TaskStatus,
    /// Payload or error description once terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Latest progress while processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
    /// When the task was submitted.
    pub created_at: DateTime<Utc>,
    /// When the task last changed.
    pub updated_at: DateTime<Utc>,
}

/// Retrieves one task by id.
///
/// # Errors
///
/// Returns `DomainError::TaskNotFound` if the registry does not hold the id.
pub async fn get_task_by_id(
    task_id: TaskId,
    registry: &dyn TaskRegistry,
) -> Result<TaskDetailView, DomainError> {
    let mut found = registry.get(&[task_id]).await?;
    let task = found
        .remove(&task_id)
        .ok_or(DomainError::TaskNotFound(task_id))?;
    let entry = task.to_status_entry();
    Ok(TaskDetailView {
        id: task.id,
        kind: task.kind,
        label: task.label,
        status: entry.status,
        result: entry.result,
        progress: entry.progress,
        created_at: task.created_at,
        updated_at: task.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use storyloom_core::error::DomainError;
    use storyloom_core::registry::TaskRegistry;
    use storyloom_core::task::{TaskId, TaskKind, TaskStatus, TaskUpdate};
    use storyloom_task_store::memory_registry::InMemoryTaskRegistry;
    use storyloom_test_support::{CountingTaskRegistry, FixedClock};

    use super::{get_task_by_id, query_task_statuses};

    fn registry() -> InMemoryTaskRegistry {
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        InMemoryTaskRegistry::new(Arc::new(FixedClock(fixed_now)))
    }

    #[tokio::test]
    async fn test_empty_query_never_touches_registry() {
        let registry = CountingTaskRegistry::new();

        let entries = query_task_statuses(&[], &registry).await.unwrap();

        assert!(entries.is_empty());
        assert_eq!(registry.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_query_omits_unknown_ids_and_keeps_request_order() {
        // Arrange
        let registry = registry();
        let first = registry.create(TaskKind::Analyze, "first").await.unwrap();
        let second = registry.create(TaskKind::Analyze, "second").await.unwrap();
        registry
            .set_result(second, TaskUpdate::Completed(json!({ "chars": 3 })))
            .await
            .unwrap();
        let gone = TaskId::new();

        // Act
        let entries = query_task_statuses(&[second, gone, first, second], &registry)
            .await
            .unwrap();

        // Assert
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second);
        assert_eq!(entries[0].status, TaskStatus::Completed);
        assert_eq!(entries[0].result, Some(json!({ "chars": 3 })));
        assert_eq!(entries[1].id, first);
        assert_eq!(entries[1].status, TaskStatus::Pending);
        assert!(entries[1].result.is_none());
    }

    #[tokio::test]
    async fn test_get_task_by_id_returns_detail() {
        let registry = registry();
        let id = registry.create(TaskKind::ExtractEvents, "Timeline").await.unwrap();

        let view = get_task_by_id(id, &registry).await.unwrap();

        assert_eq!(view.id, id);
        assert_eq!(view.kind, TaskKind::ExtractEvents);
        assert_eq!(view.label, "Timeline");
        assert_eq!(view.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_task_by_id_returns_not_found() {
        let registry = registry();
        let id = TaskId::new();

        let result = get_task_by_id(id, &registry).await;

        match result {
            Err(DomainError::TaskNotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected TaskNotFound, got {other:?}"),
        }
    }
}
