//! In-process task store.
//!
//! Tasks are keyed by [`JobId`] and move through
//! `pending → running → completed | failed | cancelled` (or straight from
//! `pending` to `cancelled`). Each task has at most one [`TaskWriter`]; only
//! the writer changes its state. Anyone may request cancellation, which the
//! writer's pipeline observes through a watch channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};
use vnarr_models::{JobId, JobState};

use crate::error::{WorkerError, WorkerResult};

/// Snapshot of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: JobId,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct Entry {
    record: TaskRecord,
    claimed: bool,
    cancel_tx: watch::Sender<bool>,
}

impl Entry {
    fn transition(&mut self, to: JobState) -> WorkerResult<()> {
        let from = self.record.state;
        if !from.can_transition_to(to) {
            return Err(WorkerError::InvalidTransition {
                id: self.record.id.to_string(),
                from,
                to,
            });
        }
        self.record.state = to;
        self.record.updated_at = Utc::now();
        debug!(task_id = %self.record.id, from = %from, to = %to, "Task transition");
        Ok(())
    }
}

/// Shared task registry.
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<HashMap<JobId, Entry>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new pending task.
    pub fn create(&self) -> JobId {
        let id = JobId::new();
        let now = Utc::now();
        let (cancel_tx, _) = watch::channel(false);
        self.lock().insert(
            id.clone(),
            Entry {
                record: TaskRecord {
                    id: id.clone(),
                    state: JobState::Pending,
                    message: None,
                    output: None,
                    created_at: now,
                    updated_at: now,
                },
                claimed: false,
                cancel_tx,
            },
        );
        id
    }

    pub fn get(&self, id: &JobId) -> Option<TaskRecord> {
        self.lock().get(id).map(|e| e.record.clone())
    }

    /// All tasks, oldest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.lock().values().map(|e| e.record.clone()).collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Take the single writer handle for `id`.
    pub fn claim(&self, id: &JobId) -> WorkerResult<TaskWriter> {
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| WorkerError::TaskNotFound(id.to_string()))?;
        if entry.record.state.is_terminal() {
            return Err(WorkerError::InvalidTransition {
                id: id.to_string(),
                from: entry.record.state,
                to: JobState::Running,
            });
        }
        if entry.claimed {
            return Err(WorkerError::AlreadyClaimed(id.to_string()));
        }
        entry.claimed = true;
        Ok(TaskWriter {
            id: id.clone(),
            cancel_rx: entry.cancel_tx.subscribe(),
            store: self.clone(),
        })
    }

    /// Ask a task to stop. A pending task nobody has claimed is cancelled
    /// immediately; otherwise the writer sees the signal.
    pub fn request_cancel(&self, id: &JobId) -> WorkerResult<()> {
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| WorkerError::TaskNotFound(id.to_string()))?;
        if entry.record.state.is_terminal() {
            return Ok(());
        }

        entry.cancel_tx.send_replace(true);
        if !entry.claimed && entry.record.state == JobState::Pending {
            entry.transition(JobState::Cancelled)?;
        }
        info!(task_id = %id, "Cancellation requested");
        Ok(())
    }

    fn update(
        &self,
        id: &JobId,
        to: JobState,
        message: Option<String>,
        output: Option<PathBuf>,
    ) -> WorkerResult<TaskRecord> {
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| WorkerError::TaskNotFound(id.to_string()))?;
        entry.transition(to)?;
        if message.is_some() {
            entry.record.message = message;
        }
        if output.is_some() {
            entry.record.output = output;
        }
        Ok(entry.record.clone())
    }

    fn release(&self, id: &JobId) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.claimed = false;
        }
    }
}

/// Exclusive right to change one task's state. Dropping it releases the claim.
pub struct TaskWriter {
    id: JobId,
    cancel_rx: watch::Receiver<bool>,
    store: TaskStore,
}

impl TaskWriter {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Receiver that flips to `true` when cancellation is requested.
    pub fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    pub fn start(&self) -> WorkerResult<TaskRecord> {
        self.store.update(&self.id, JobState::Running, None, None)
    }

    pub fn complete(self, output: PathBuf) -> WorkerResult<TaskRecord> {
        self.store
            .update(&self.id, JobState::Completed, None, Some(output))
    }

    pub fn fail(self, message: impl Into<String>) -> WorkerResult<TaskRecord> {
        self.store
            .update(&self.id, JobState::Failed, Some(message.into()), None)
    }

    pub fn cancel(self) -> WorkerResult<TaskRecord> {
        self.store.update(&self.id, JobState::Cancelled, None, None)
    }
}

impl Drop for TaskWriter {
    fn drop(&mut self) {
        self.store.release(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let store = TaskStore::new();
        let id = store.create();
        assert_eq!(store.get(&id).unwrap().state, JobState::Pending);

        let writer = store.claim(&id).unwrap();
        assert_eq!(writer.start().unwrap().state, JobState::Running);
        let record = writer.complete(PathBuf::from("out.mp4")).unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.output, Some(PathBuf::from("out.mp4")));
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_single_writer() {
        let store = TaskStore::new();
        let id = store.create();
        let writer = store.claim(&id).unwrap();
        assert!(matches!(store.claim(&id), Err(WorkerError::AlreadyClaimed(_))));
        drop(writer);
        assert!(store.claim(&id).is_ok());
    }

    #[test]
    fn test_illegal_transition() {
        let store = TaskStore::new();
        let id = store.create();
        let writer = store.claim(&id).unwrap();
        let result = writer.complete(PathBuf::from("x"));
        assert!(matches!(
            result,
            Err(WorkerError::InvalidTransition {
                from: JobState::Pending,
                to: JobState::Completed,
                ..
            })
        ));
    }

    #[test]
    fn test_cancel_pending_task() {
        let store = TaskStore::new();
        let id = store.create();
        store.request_cancel(&id).unwrap();
        assert_eq!(store.get(&id).unwrap().state, JobState::Cancelled);
        assert!(matches!(
            store.claim(&id),
            Err(WorkerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_running_task_signals_writer() {
        let store = TaskStore::new();
        let id = store.create();
        let writer = store.claim(&id).unwrap();
        writer.start().unwrap();
        assert!(!writer.is_cancel_requested());

        store.request_cancel(&id).unwrap();
        assert!(writer.is_cancel_requested());
        assert_eq!(store.get(&id).unwrap().state, JobState::Running);

        assert_eq!(writer.cancel().unwrap().state, JobState::Cancelled);
    }

    #[test]
    fn test_cancel_wakes_receiver() {
        let store = TaskStore::new();
        let id = store.create();
        let writer = store.claim(&id).unwrap();
        let mut rx = writer.cancel_receiver();

        store.request_cancel(&id).unwrap();
        tokio_test::block_on(rx.changed()).unwrap();
        assert!(*rx.borrow());
    }

    #[test]
    fn test_unknown_task() {
        let store = TaskStore::new();
        let id = JobId::from_string("missing");
        assert!(matches!(store.claim(&id), Err(WorkerError::TaskNotFound(_))));
        assert!(matches!(
            store.request_cancel(&id),
            Err(WorkerError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_list_orders_by_creation() {
        let store = TaskStore::new();
        let first = store.create();
        let second = store.create();
        let ids: Vec<JobId> = store.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first) && ids.contains(&second));
    }
}
