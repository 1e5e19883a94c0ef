use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::schedule::types::{
    Submission, TaskEvent, TaskRecord, TaskSnapshot, TaskState, TaskStats,
};

type TaskMap<T> = HashMap<String, TaskRecord<T>>;

const EVENT_CAPACITY: usize = 64;

/// Single-flight executor keyed by opaque strings.
///
/// Work handed to [`TaskRegistry::submit`] runs detached on the tokio runtime;
/// callers observe it only by polling the status methods. A key stays known
/// (running, then terminal) until [`TaskRegistry::clear`] removes it, and any
/// submission under a known key is a no-op.
pub struct TaskRegistry<T> {
    tasks: Arc<RwLock<TaskMap<T>>>,
    runtime: Handle,
    events: broadcast::Sender<TaskEvent>,
}

impl<T> TaskRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Binds the registry to the runtime of the calling context.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            runtime,
            events,
        }
    }

    /// Starts `work` under `key` unless the key is already known.
    ///
    /// Never blocks on the work itself. When the key is running or still holds
    /// an unacknowledged terminal state, `work` is dropped without being polled.
    pub fn submit<F>(&self, key: impl Into<String>, work: F) -> Submission
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let key = key.into();

        let generation = {
            let mut tasks = write(&self.tasks);
            if let Some(record) = tasks.get(&key) {
                let submission = if record.state.is_terminal() {
                    Submission::AwaitingAcknowledgement
                } else {
                    Submission::AlreadyRunning
                };
                debug!("Ignoring submission for task {}: {:?}", key, submission);
                return submission;
            }
            let record = TaskRecord::running();
            let generation = record.id;
            tasks.insert(key.clone(), record);
            generation
        };

        info!("Starting task {}", key);

        let tasks = self.tasks.clone();
        let events = self.events.clone();
        let runtime = self.runtime.clone();
        self.runtime.spawn(async move {
            // the inner spawn isolates panics in `work` from the bookkeeping below
            let outcome = match runtime.spawn(work).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(e) => Err(describe_join_error(e)),
            };
            complete(&tasks, &events, &key, generation, outcome);
        });

        Submission::Started
    }

    pub fn is_running(&self, key: &str) -> bool {
        read(&self.tasks)
            .get(key)
            .map(|record| record.state == TaskState::Running)
            .unwrap_or(false)
    }

    /// True iff the key is known and terminal.
    pub fn is_complete(&self, key: &str) -> bool {
        read(&self.tasks)
            .get(key)
            .map(|record| record.state.is_terminal())
            .unwrap_or(false)
    }

    pub fn get_result(&self, key: &str) -> Option<T> {
        read(&self.tasks).get(key).and_then(|record| record.result.clone())
    }

    pub fn get_error(&self, key: &str) -> Option<String> {
        read(&self.tasks).get(key).and_then(|record| record.error.clone())
    }

    pub fn snapshot(&self, key: &str) -> TaskSnapshot<T> {
        let tasks = read(&self.tasks);
        let Some(record) = tasks.get(key) else {
            return TaskSnapshot::Absent;
        };
        match record.state {
            TaskState::Running => TaskSnapshot::Running,
            TaskState::CompleteOk => match &record.result {
                Some(value) => TaskSnapshot::Done(value.clone()),
                None => TaskSnapshot::Failed("task completed without a result".to_string()),
            },
            TaskState::CompleteError => TaskSnapshot::Failed(
                record.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            ),
        }
    }

    /// Returns the key to `Absent`. Returns whether anything was removed.
    pub fn clear(&self, key: &str) -> bool {
        let removed = write(&self.tasks).remove(key);
        match &removed {
            Some(record) if record.state == TaskState::Running => {
                warn!("Cleared task {} while it was still running", key);
            }
            Some(_) => debug!("Cleared task {}", key),
            None => {}
        }
        removed.is_some()
    }

    pub fn stats(&self) -> TaskStats {
        let mut stats = TaskStats::default();
        for record in read(&self.tasks).values() {
            match record.state {
                TaskState::Running => stats.running += 1,
                TaskState::CompleteOk => stats.completed += 1,
                TaskState::CompleteError => stats.failed += 1,
            }
        }
        stats
    }

    /// Terminal transitions are also published here for hosts that can react
    /// to push notifications. Polling stays authoritative.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }
}

fn complete<T>(
    tasks: &RwLock<TaskMap<T>>,
    events: &broadcast::Sender<TaskEvent>,
    key: &str,
    generation: Uuid,
    outcome: Result<T, String>,
) {
    let event = match &outcome {
        Ok(_) => TaskEvent::Completed { key: key.to_string() },
        Err(error) => TaskEvent::Failed {
            key: key.to_string(),
            error: error.clone(),
        },
    };

    {
        let mut tasks = write(tasks);
        match tasks.get_mut(key) {
            Some(record) if record.id == generation => record.finish(outcome),
            _ => {
                warn!("Discarding outcome of task {}: key was cleared while running", key);
                return;
            }
        }
    }

    match &event {
        TaskEvent::Completed { .. } => info!("Task {} completed successfully", key),
        TaskEvent::Failed { error, .. } => warn!("Task {} failed: {}", key, error),
    }
    // no subscribers is fine
    let _ = events.send(event);
}

fn describe_join_error(error: JoinError) -> String {
    if !error.is_panic() {
        return "task was cancelled".to_string();
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("task panicked: {}", message)
}

// records are replaced wholesale under the write lock, so a poisoned map is
// still consistent
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
