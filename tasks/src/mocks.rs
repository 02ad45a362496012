//! In-memory task service for tests
//!
//! Behaves like a minimal `/tasks` server: sequential ids starting at 1,
//! insertion order on `list`, partial updates, and 404s for unknown ids.
//! Failures and latency can be injected per [`Operation`].

use crate::error::TaskError;
use crate::service::{Operation, TaskService};
use crate::types::{NewTask, Task, TaskId, TaskPatch};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockServer {
    tasks: Vec<Task>,
    next_id: i64,
    failures: HashMap<Operation, VecDeque<TaskError>>,
    latency: HashMap<Operation, Duration>,
    calls: HashMap<Operation, usize>,
}

impl MockServer {
    /// Count the call and return the injected failure or latency for it
    fn begin(&mut self, operation: Operation) -> (Option<TaskError>, Option<Duration>) {
        *self.calls.entry(operation).or_default() += 1;
        let failure = self
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        (failure, self.latency.get(&operation).copied())
    }
}

/// Mock task service.
///
/// Clones share the same in-memory collection.
#[derive(Debug, Clone)]
pub struct MockTaskService {
    server: Arc<Mutex<MockServer>>,
}

impl MockTaskService {
    /// Create an empty mock server
    #[must_use]
    pub fn new() -> Self {
        Self {
            server: Arc::new(Mutex::new(MockServer {
                next_id: 1,
                ..MockServer::default()
            })),
        }
    }

    /// Create a mock server already holding `tasks`
    ///
    /// Ids handed out afterwards continue after the largest seeded id.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let service = Self::new();
        {
            let mut server = service.lock();
            server.next_id = tasks.iter().map(|t| t.id.get()).max().unwrap_or(0) + 1;
            server.tasks = tasks;
        }
        service
    }

    /// Make the next call of `operation` fail with `error`
    ///
    /// Queued failures are consumed one per call, in order.
    pub fn fail_next(&self, operation: Operation, error: TaskError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delay every call of `operation` by `latency`
    pub fn set_latency(&self, operation: Operation, latency: Duration) {
        self.lock().latency.insert(operation, latency);
    }

    /// Number of calls made to `operation`
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Total number of calls across all operations
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Snapshot of the server-side collection
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Insert or overwrite a task server-side, bypassing the API
    pub fn put(&self, task: Task) {
        let mut server = self.lock();
        server.next_id = server.next_id.max(task.id.get() + 1);
        match server.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => server.tasks.push(task),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, operation: Operation) -> (Option<TaskError>, Option<Duration>) {
        self.lock().begin(operation)
    }
}

impl Default for MockTaskService {
    fn default() -> Self {
        Self::new()
    }
}

async fn pause(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

impl TaskService for MockTaskService {
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, TaskError>> + Send {
        let service = self.clone();

        async move {
            let (failure, latency) = service.begin(Operation::List);
            pause(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            Ok(service.tasks())
        }
    }

    fn create(&self, task: NewTask) -> impl Future<Output = Result<Task, TaskError>> + Send {
        let service = self.clone();

        async move {
            let (failure, latency) = service.begin(Operation::Create);
            pause(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }

            let mut server = service.lock();
            let created = task.into_task(TaskId::new(server.next_id));
            server.next_id += 1;
            server.tasks.push(created.clone());
            Ok(created)
        }
    }

    fn update(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<Task, TaskError>> + Send {
        let service = self.clone();

        async move {
            let (failure, latency) = service.begin(Operation::Update);
            pause(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }

            let mut server = service.lock();
            let task = server
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(TaskError::NotFound(id))?;
            patch.apply_to(task);
            Ok(task.clone())
        }
    }

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), TaskError>> + Send {
        let service = self.clone();

        async move {
            let (failure, latency) = service.begin(Operation::Delete);
            pause(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }

            let mut server = service.lock();
            let before = server.tasks.len();
            server.tasks.retain(|t| t.id != id);
            if server.tasks.len() == before {
                return Err(TaskError::NotFound(id));
            }
            Ok(())
        }
    }
}
