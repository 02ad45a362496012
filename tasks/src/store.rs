//! Consumer-facing task store handle
//!
//! [`TaskStore`] wraps the runtime [`Store`] and turns each operation into a
//! request/response exchange: send a command tagged with a fresh
//! [`RequestId`], wait for the outcome event with the same id, and return it
//! as a `Result`. Each command gets its own reply channel from the runtime,
//! and the outcome is reduced before it is delivered, so by the time an
//! operation returns, [`TaskStore::tasks`] already reflects it.
//!
//! # Example
//!
//! ```ignore
//! let store = TaskStore::new(HttpTaskService::new("http://localhost:3000"), Arc::new(SystemClock));
//! store.load().await?;
//! let task = store.add(TaskDraft::titled("Buy milk")).await?;
//! store.toggle_done(task.id).await?;
//! ```

use crate::config::TaskConfig;
use crate::error::TaskError;
use crate::reducer::{TaskEnvironment, TaskReducer};
use crate::service::TaskService;
use crate::types::{RequestId, Task, TaskAction, TaskDraft, TaskId, TaskPatch, TaskState};
use std::sync::Arc;
use std::time::Duration;
use tasklist_core::environment::Clock;
use tasklist_runtime::Store;
use tokio::sync::watch;

type Runtime<S> = Store<TaskState, TaskAction, TaskEnvironment<S>, TaskReducer<S>>;

/// Handle to the task cache
///
/// Clones share the same store. Construct one per application and pass it to
/// whatever needs tasks.
pub struct TaskStore<S: TaskService> {
    store: Runtime<S>,
    response_timeout: Duration,
}

impl<S: TaskService> Clone for TaskStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            response_timeout: self.response_timeout,
        }
    }
}

/// Point-in-time view of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Tasks in presentation order
    pub tasks: Vec<Task>,
    /// Whether a load is in flight
    pub loading: bool,
    /// Failure of the most recently issued operation that failed and has not
    /// been superseded by a later success
    pub last_error: Option<TaskError>,
}

impl TaskSnapshot {
    fn of(state: &TaskState) -> Self {
        Self {
            tasks: state.tasks.clone(),
            loading: state.loading,
            last_error: state.last_error.clone(),
        }
    }
}

impl<S: TaskService> TaskStore<S> {
    /// Create an empty store with default settings
    #[must_use]
    pub fn new(service: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(service, clock, &TaskConfig::default())
    }

    /// Create an empty store using the response timeout in `config`
    #[must_use]
    pub fn with_config(service: S, clock: Arc<dyn Clock>, config: &TaskConfig) -> Self {
        let store = Store::new(
            TaskState::new(),
            TaskReducer::new(),
            TaskEnvironment::new(service, clock),
        );
        Self {
            store,
            response_timeout: config.response_timeout(),
        }
    }

    /// Change how long operations wait for their outcome
    ///
    /// A timed-out operation returns [`TaskError::Store`], but its request
    /// keeps running and its outcome is still applied when it arrives.
    #[must_use]
    pub const fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Send a command and wait for its outcome event
    async fn request(&self, command: TaskAction) -> Result<TaskAction, TaskError> {
        let request_id = command.request_id();
        let outcome = self
            .store
            .send_and_wait_for(
                command,
                move |action| action.is_outcome_of(request_id),
                self.response_timeout,
            )
            .await?;

        match outcome {
            TaskAction::Failed { error, .. } | TaskAction::LoadFailed { error, .. } => Err(error),
            outcome => Ok(outcome),
        }
    }

    /// Replace the cache with the server's collection
    ///
    /// # Errors
    ///
    /// Returns the service error; the previous collection is kept.
    pub async fn load(&self) -> Result<(), TaskError> {
        match self.request(TaskAction::Load { request_id: RequestId::new() }).await? {
            TaskAction::Loaded { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Validate and create a task, inserting it at the front
    ///
    /// # Errors
    ///
    /// - [`TaskError::Validation`] with every invalid field; nothing is sent
    /// - the service error otherwise; the cache is unchanged
    pub async fn add(&self, draft: TaskDraft) -> Result<Task, TaskError> {
        let command = TaskAction::Add {
            request_id: RequestId::new(),
            draft,
        };
        match self.request(command).await? {
            TaskAction::Added { task, .. } => Ok(task),
            other => Err(unexpected(&other)),
        }
    }

    /// Validate and apply a partial update, replacing the task in place
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFoundLocally`] if `id` is not cached; nothing is sent
    /// - [`TaskError::Validation`] for an invalid title or description
    /// - the service error otherwise; the cache is unchanged
    pub async fn edit(&self, id: TaskId, patch: TaskPatch) -> Result<Task, TaskError> {
        let command = TaskAction::Edit {
            request_id: RequestId::new(),
            id,
            patch,
        };
        match self.request(command).await? {
            TaskAction::Edited { task, .. } => Ok(task),
            other => Err(unexpected(&other)),
        }
    }

    /// Flip `done` for a cached task
    ///
    /// The current value is read when the command is reduced, so concurrent
    /// toggles of the same task resolve last-writer-wins.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFoundLocally`] if `id` is not cached
    /// - the service error otherwise; the cache is unchanged
    pub async fn toggle_done(&self, id: TaskId) -> Result<Task, TaskError> {
        let command = TaskAction::ToggleDone {
            request_id: RequestId::new(),
            id,
        };
        match self.request(command).await? {
            TaskAction::Edited { task, .. } => Ok(task),
            other => Err(unexpected(&other)),
        }
    }

    /// Delete a task and drop it from the cache
    ///
    /// # Errors
    ///
    /// Returns the service error; the cache is unchanged.
    pub async fn remove(&self, id: TaskId) -> Result<(), TaskError> {
        let command = TaskAction::Remove {
            request_id: RequestId::new(),
            id,
        };
        match self.request(command).await? {
            TaskAction::Removed { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// All cached tasks in order
    pub async fn tasks(&self) -> Vec<Task> {
        self.store.state(|s| s.tasks.clone()).await
    }

    /// A cached task by id
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.store.state(|s| s.get(id).cloned()).await
    }

    /// Whether a load is in flight
    pub async fn is_loading(&self) -> bool {
        self.store.state(|s| s.loading).await
    }

    /// Number of cached tasks
    pub async fn count(&self) -> usize {
        self.store.state(TaskState::count).await
    }

    /// Number of cached tasks marked done
    pub async fn completed_count(&self) -> usize {
        self.store.state(TaskState::completed_count).await
    }

    /// Number of cached tasks not done
    pub async fn pending_count(&self) -> usize {
        self.store.state(TaskState::pending_count).await
    }

    /// Current tasks, loading flag and last error
    pub async fn snapshot(&self) -> TaskSnapshot {
        self.store.state(TaskSnapshot::of).await
    }

    /// Observe state changes
    #[must_use]
    pub fn subscribe(&self) -> TaskSubscription<S> {
        TaskSubscription {
            store: self.clone(),
            revisions: self.store.subscribe_state(),
        }
    }

    /// Stop accepting operations and wait for in-flight requests
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if requests are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), TaskError> {
        self.store.shutdown(timeout).await.map_err(TaskError::from)
    }
}

fn unexpected(action: &TaskAction) -> TaskError {
    TaskError::Store(format!("unexpected outcome {action:?}"))
}

/// Stream of [`TaskSnapshot`]s, one per state change
///
/// Changes that happen while nobody is waiting are coalesced; `changed`
/// always yields the latest state.
pub struct TaskSubscription<S: TaskService> {
    store: TaskStore<S>,
    revisions: watch::Receiver<u64>,
}

impl<S: TaskService> TaskSubscription<S> {
    /// Wait for the next change and return the state after it
    ///
    /// Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<TaskSnapshot> {
        self.revisions.changed().await.ok()?;
        Some(self.store.snapshot().await)
    }

    /// The current state, without waiting
    pub async fn current(&self) -> TaskSnapshot {
        self.store.snapshot().await
    }
}
