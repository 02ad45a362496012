//! HTTP implementation of [`TaskService`]
//!
//! Talks JSON to a `/tasks` resource collection:
//!
//! | Operation | Request              | Success response   |
//! |-----------|----------------------|--------------------|
//! | list      | `GET /tasks`         | array of tasks     |
//! | create    | `POST /tasks`        | created task       |
//! | update    | `PUT /tasks/{id}`    | full updated task  |
//! | delete    | `DELETE /tasks/{id}` | status only        |
//!
//! Requests are never retried.

use crate::config::{ConfigError, TaskConfig};
use crate::error::TaskError;
use crate::service::{Operation, TaskService};
use crate::types::{NewTask, Task, TaskId, TaskPatch};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;

/// Task API client
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: String,
}

impl HttpTaskService {
    /// Create a client for `base_url` with default connection settings
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client reusing an existing `reqwest` client
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if the HTTP client cannot be built
    pub fn from_config(config: &TaskConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: TaskId) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }
}

impl TaskService for HttpTaskService {
    fn list(&self) -> impl Future<Output = Result<Vec<Task>, TaskError>> + Send {
        let request = self.client.get(self.collection_url());

        async move {
            let response = execute(Operation::List, request, None).await?;
            decode(Operation::List, response).await
        }
    }

    fn create(&self, task: NewTask) -> impl Future<Output = Result<Task, TaskError>> + Send {
        let request = self.client.post(self.collection_url()).json(&task);

        async move {
            let response = execute(Operation::Create, request, None).await?;
            decode(Operation::Create, response).await
        }
    }

    fn update(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<Task, TaskError>> + Send {
        let request = self.client.put(self.task_url(id)).json(&patch);

        async move {
            let response = execute(Operation::Update, request, Some(id)).await?;
            decode(Operation::Update, response).await
        }
    }

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), TaskError>> + Send {
        let request = self.client.delete(self.task_url(id));

        async move {
            execute(Operation::Delete, request, Some(id)).await?;
            record(Operation::Delete, "ok");
            Ok(())
        }
    }
}

/// Send a request and turn any non-success status into a [`TaskError`]
async fn execute(
    operation: Operation,
    request: RequestBuilder,
    id: Option<TaskId>,
) -> Result<Response, TaskError> {
    tracing::debug!(%operation, task_id = ?id, "Sending task API request");

    let response = request.send().await.map_err(|e| {
        tracing::warn!(%operation, error = %e, "Task API unreachable");
        record(operation, "network_error");
        TaskError::Network(e.to_string())
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    let error = status_error(status, message, id);
    tracing::warn!(%operation, status = status.as_u16(), error = %error, "Task API returned an error");
    record(operation, outcome_label(&error));
    Err(error)
}

async fn decode<T: DeserializeOwned>(operation: Operation, response: Response) -> Result<T, TaskError> {
    match response.json::<T>().await {
        Ok(value) => {
            record(operation, "ok");
            Ok(value)
        },
        Err(e) => {
            tracing::warn!(%operation, error = %e, "Task API response did not decode");
            record(operation, "invalid_response");
            Err(TaskError::InvalidResponse(e.to_string()))
        },
    }
}

fn status_error(status: StatusCode, message: String, id: Option<TaskId>) -> TaskError {
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => TaskError::NotFound(id),
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => TaskError::Rejected {
            status: status.as_u16(),
            message,
        },
        _ => TaskError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

const fn outcome_label(error: &TaskError) -> &'static str {
    match error {
        TaskError::NotFound(_) => "not_found",
        TaskError::Rejected { .. } => "rejected",
        _ => "server_error",
    }
}

fn record(operation: Operation, outcome: &'static str) {
    metrics::counter!(
        "tasks.http.requests",
        "operation" => operation.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
