use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt::Display;
use uuid::Uuid;

/// Lifecycle of a known task key. `Absent` is represented by the key not
/// being in the registry at all.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Running,
    CompleteOk,
    CompleteError,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct TaskRecord<T> {
    // generation of this submission; stale workers never write over a newer one
    pub id: Uuid,
    pub state: TaskState,
    pub result: Option<T>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<T> TaskRecord<T> {
    pub(crate) fn running() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: TaskState::Running,
            result: None,
            error: None,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    pub(crate) fn finish(&mut self, outcome: Result<T, String>) {
        match outcome {
            Ok(value) => {
                self.state = TaskState::CompleteOk;
                self.result = Some(value);
                self.error = None;
            }
            Err(error) => {
                self.state = TaskState::CompleteError;
                self.result = None;
                self.error = Some(error);
            }
        }
        self.completed_at = Some(Utc::now());
    }
}

/// Consistent view of one key, taken under a single read lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value")]
pub enum TaskSnapshot<T> {
    Absent,
    Running,
    Done(T),
    Failed(String),
}

/// What `submit` did with the work it was handed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Submission {
    /// The key was absent; the work is now running.
    Started,
    /// The key is already running; the original run continues.
    AlreadyRunning,
    /// The key holds a terminal state that has not been cleared yet.
    AwaitingAcknowledgement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Completed { key: String },
    Failed { key: String, error: String },
}

impl TaskEvent {
    pub fn key(&self) -> &str {
        match self {
            TaskEvent::Completed { key } | TaskEvent::Failed { key, .. } => key,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}
