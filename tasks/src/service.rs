//! Remote task service abstraction
//!
//! The reducer only talks to the API through [`TaskService`], so the store can
//! run against [`HttpTaskService`](crate::http::HttpTaskService) in production
//! and [`MockTaskService`](crate::mocks::MockTaskService) in tests.

use crate::error::TaskError;
use crate::types::{NewTask, Task, TaskId, TaskPatch};
use std::fmt;
use std::future::Future;

/// Remote operations on the task collection
///
/// Implementations are cheap to clone; effects clone the service into the
/// spawned future.
pub trait TaskService: Clone + Send + Sync + 'static {
    /// Fetch every task
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The API is unreachable → [`TaskError::Network`]
    /// - The API answers with an error status → [`TaskError::Server`]
    /// - The body is not a task list → [`TaskError::InvalidResponse`]
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, TaskError>> + Send;

    /// Create a task; the server assigns its id
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The API refuses the payload → [`TaskError::Rejected`]
    /// - Any transport or status failure as for [`TaskService::list`]
    fn create(&self, task: NewTask) -> impl Future<Output = Result<Task, TaskError>> + Send;

    /// Apply a partial update and return the full updated task
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The task does not exist → [`TaskError::NotFound`]
    /// - The API refuses the payload → [`TaskError::Rejected`]
    /// - Any transport or status failure as for [`TaskService::list`]
    fn update(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<Task, TaskError>> + Send;

    /// Delete a task
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The task does not exist → [`TaskError::NotFound`]
    /// - Any transport or status failure as for [`TaskService::list`]
    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), TaskError>> + Send;
}

/// The remote operations, used as a label in logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /tasks`
    List,
    /// `POST /tasks`
    Create,
    /// `PUT /tasks/{id}`
    Update,
    /// `DELETE /tasks/{id}`
    Delete,
}

impl Operation {
    /// Static label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
