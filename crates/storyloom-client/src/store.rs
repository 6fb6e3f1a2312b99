//! Client task store: the durable snapshot of unfinished tracked tasks.
//!
//! Only non-terminal tasks are ever written. A finished task that made it
//! back into the snapshot would be recovered after a restart and announce
//! its completion a second time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use storyloom_core::task::{TaskId, TaskKind, TaskProgress, TaskStatus};

use crate::error::ClientError;
use crate::snapshot::SnapshotSlot;

/// What the client knows about one task it tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTaskRecord {
    /// Task identifier.
    pub id: TaskId,
    /// Label supplied at submission.
    pub label: String,
    /// Kind of work.
    pub kind: TaskKind,
    /// Last status observed from the server.
    pub status: TaskStatus,
    /// Last progress observed from the server.
    pub progress: Option<TaskProgress>,
}

impl ClientTaskRecord {
    /// Creates a record for a freshly submitted task.
    #[must_use]
    pub fn pending(id: TaskId, kind: TaskKind, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            status: TaskStatus::Pending,
            progress: None,
        }
    }
}

/// Serialized form of one record in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEntry {
    label: String,
    kind: TaskKind,
    status: TaskStatus,
}

/// Reads and writes the snapshot through a `SnapshotSlot`.
///
/// Every write goes through one lock shared by all clones of the store, so
/// a read-modify-write never loses an update made by a concurrent writer.
#[derive(Clone)]
pub struct ClientTaskStore {
    slot: Arc<dyn SnapshotSlot>,
    write_lock: Arc<Mutex<()>>,
}

impl ClientTaskStore {
    /// Creates a store persisting to `slot`.
    #[must_use]
    pub fn new(slot: Arc<dyn SnapshotSlot>) -> Self {
        Self {
            slot,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Persists the non-terminal records in `records`, replacing the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the slot's error if the write fails.
    pub async fn save<'a>(
        &self,
        records: impl IntoIterator<Item = &'a ClientTaskRecord>,
    ) -> Result<(), ClientError> {
        let contents = encode(records.into_iter().map(|r| (r.id, entry_of(r))).collect());
        let _guard = self.write_lock.lock().await;
        self.slot.write(&contents).await
    }

    /// Writes the records produced by `records` over their snapshot entries.
    /// Terminal records are removed; entries for ids not in `records` stay.
    ///
    /// `records` runs while the write lock is held, so it sees every change
    /// made before any concurrent eviction that is still waiting.
    ///
    /// # Errors
    ///
    /// Returns the slot's error if the write fails.
    pub async fn merge_with(
        &self,
        records: impl FnOnce() -> Vec<ClientTaskRecord> + Send,
    ) -> Result<(), ClientError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_entries().await;
        for record in records() {
            if record.status.is_terminal() {
                snapshot.remove(&record.id);
            } else {
                snapshot.insert(record.id, entry_of(&record));
            }
        }
        self.slot.write(&encode(snapshot)).await
    }

    /// Loads the last snapshot. Missing, unreadable or corrupt data yields an
    /// empty map; malformed ids and terminal entries are dropped.
    pub async fn load(&self) -> HashMap<TaskId, ClientTaskRecord> {
        self.read_entries()
            .await
            .into_iter()
            .map(|(id, entry)| {
                (
                    id,
                    ClientTaskRecord {
                        id,
                        label: entry.label,
                        kind: entry.kind,
                        status: entry.status,
                        progress: None,
                    },
                )
            })
            .collect()
    }

    /// Removes `id` from the snapshot, leaving every other entry in place.
    ///
    /// # Errors
    ///
    /// Returns the slot's error if the write fails.
    pub async fn evict(&self, id: TaskId) -> Result<(), ClientError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read_entries().await;
        snapshot.remove(&id);
        self.slot.write(&encode(snapshot)).await
    }

    async fn read_entries(&self) -> HashMap<TaskId, SnapshotEntry> {
        let contents = match self.slot.read().await {
            Ok(Some(contents)) => contents,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                warn!(error = %e, "task snapshot unreadable; starting with no tracked tasks");
                return HashMap::new();
            }
        };

        let snapshot: BTreeMap<String, SnapshotEntry> = match serde_json::from_str(&contents) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "task snapshot corrupt; starting with no tracked tasks");
                return HashMap::new();
            }
        };

        snapshot
            .into_iter()
            .filter(|(_, entry)| !entry.status.is_terminal())
            .filter_map(|(id, entry)| Some((id.parse().ok()?, entry)))
            .collect()
    }
}

fn entry_of(record: &ClientTaskRecord) -> SnapshotEntry {
    SnapshotEntry {
        label: record.label.clone(),
        kind: record.kind,
        status: record.status,
    }
}

fn encode(entries: HashMap<TaskId, SnapshotEntry>) -> String {
    let snapshot: BTreeMap<String, SnapshotEntry> = entries
        .into_iter()
        .filter(|(_, entry)| !entry.status.is_terminal())
        .map(|(id, entry)| (id.to_string(), entry))
        .collect();
    // Serializing string-keyed maps of plain structs cannot fail.
    serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_owned())
}

impl std::fmt::Debug for ClientTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTaskStore").finish_non_exhaustive()
    }
}

/// Merges records recovered from the snapshot with registrations made
/// before the snapshot was read. Fresh registrations win on collision.
#[must_use]
pub fn reconcile(
    fresh: HashMap<TaskId, ClientTaskRecord>,
    recovered: HashMap<TaskId, ClientTaskRecord>,
) -> HashMap<TaskId, ClientTaskRecord> {
    let mut merged = recovered;
    merged.extend(fresh);
    merged
}
