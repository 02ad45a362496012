//! Task reducer.
//!
//! Every change to the task cache goes through here. Commands are validated
//! against the rules in [`crate::validation`] and the current local snapshot;
//! accepted commands become a single [`Effect::Future`] that calls the
//! [`TaskService`] and resolves into the outcome event. Outcome events are the
//! only actions that modify `tasks`.
//!
//! # Flow
//!
//! ```text
//! Add ──validate──▶ create() ──▶ Added  ──▶ prepend
//!   └─invalid────────────────▶ Failed ──▶ unchanged
//! Edit/ToggleDone ─local check─▶ update() ──▶ Edited ──▶ replace in place
//! Remove ──▶ delete() ──▶ Removed ──▶ drop entry
//! Load ──▶ list() ──▶ Loaded ──▶ replace collection
//!                  └▶ LoadFailed ──▶ keep previous collection
//! ```

use crate::error::TaskError;
use crate::service::TaskService;
use crate::types::{NewTask, RequestId, TaskAction, TaskId, TaskPatch, TaskState};
use crate::validation;
use std::sync::Arc;
use tasklist_core::effect::Effect;
use tasklist_core::environment::Clock;
use tasklist_core::reducer::Reducer;
use tasklist_core::{SmallVec, smallvec};

/// Dependencies of the task reducer
#[derive(Clone)]
pub struct TaskEnvironment<S: TaskService> {
    /// Remote task API
    pub service: S,
    /// Time source for `createdAt`
    pub clock: Arc<dyn Clock>,
}

impl<S: TaskService> TaskEnvironment<S> {
    /// Create an environment
    #[must_use]
    pub fn new(service: S, clock: Arc<dyn Clock>) -> Self {
        Self { service, clock }
    }
}

/// Reducer for [`TaskState`]
#[derive(Debug, Clone)]
pub struct TaskReducer<S> {
    _phantom: std::marker::PhantomData<S>,
}

impl<S> TaskReducer<S> {
    /// Create a new task reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S> Default for TaskReducer<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a command rejected before any request
fn reject(request_id: RequestId, error: TaskError) -> SmallVec<[Effect<TaskAction>; 4]> {
    tracing::debug!(%request_id, %error, "Command rejected locally");
    smallvec![Effect::send(TaskAction::Failed { request_id, error })]
}

fn update_effect<S: TaskService>(
    service: &S,
    request_id: RequestId,
    id: TaskId,
    patch: TaskPatch,
) -> Effect<TaskAction> {
    let service = service.clone();
    Effect::task(async move {
        match service.update(id, patch).await {
            Ok(task) => TaskAction::Edited { request_id, task },
            Err(error) => TaskAction::Failed { request_id, error },
        }
    })
}

impl<S: TaskService> Reducer for TaskReducer<S> {
    type State = TaskState;
    type Action = TaskAction;
    type Environment = TaskEnvironment<S>;

    fn reduce(
        &self,
        state: &mut TaskState,
        action: TaskAction,
        env: &TaskEnvironment<S>,
    ) -> SmallVec<[Effect<TaskAction>; 4]> {
        if action.is_command() {
            state.begin_request(action.request_id());
        }

        match action {
            // ───── Commands ─────
            TaskAction::Load { request_id } => {
                state.begin_load();
                let service = env.service.clone();
                smallvec![Effect::task(async move {
                    match service.list().await {
                        Ok(tasks) => TaskAction::Loaded { request_id, tasks },
                        Err(error) => TaskAction::LoadFailed { request_id, error },
                    }
                })]
            },

            TaskAction::Add { request_id, draft } => {
                let draft = match validation::validate_draft(&draft) {
                    Ok(draft) => draft,
                    Err(errors) => return reject(request_id, errors.into()),
                };

                let new_task = NewTask::from_validated(draft, env.clock.now());
                let service = env.service.clone();
                smallvec![Effect::task(async move {
                    match service.create(new_task).await {
                        Ok(task) => TaskAction::Added { request_id, task },
                        Err(error) => TaskAction::Failed { request_id, error },
                    }
                })]
            },

            TaskAction::Edit {
                request_id,
                id,
                patch,
            } => {
                if !state.exists(id) {
                    return reject(request_id, TaskError::NotFoundLocally(id));
                }
                match validation::validate_patch(&patch) {
                    Ok(patch) => smallvec![update_effect(&env.service, request_id, id, patch)],
                    Err(errors) => reject(request_id, errors.into()),
                }
            },

            TaskAction::ToggleDone { request_id, id } => {
                let Some(current) = state.get(id).map(|task| task.done) else {
                    return reject(request_id, TaskError::NotFoundLocally(id));
                };
                let patch = TaskPatch::new().done(!current);
                smallvec![update_effect(&env.service, request_id, id, patch)]
            },

            TaskAction::Remove { request_id, id } => {
                let service = env.service.clone();
                smallvec![Effect::task(async move {
                    match service.delete(id).await {
                        Ok(()) => TaskAction::Removed { request_id, id },
                        Err(error) => TaskAction::Failed { request_id, error },
                    }
                })]
            },

            // ───── Events ─────
            TaskAction::Loaded { request_id, tasks } => {
                state.finish_load();
                state.replace_all(tasks);
                state.record_success(request_id);
                SmallVec::new()
            },

            TaskAction::LoadFailed { request_id, error } => {
                tracing::warn!(%error, "Failed to load tasks; keeping cached collection");
                state.finish_load();
                state.record_failure(request_id, error);
                SmallVec::new()
            },

            TaskAction::Added { request_id, task } => {
                tracing::info!(task_id = %task.id, "Task created");
                state.insert_created(task);
                state.record_success(request_id);
                SmallVec::new()
            },

            TaskAction::Edited { request_id, task } => {
                let id = task.id;
                if state.apply_updated(task) {
                    tracing::info!(task_id = %id, "Task updated");
                } else {
                    tracing::debug!(task_id = %id, "Ignoring update for task no longer cached");
                }
                state.record_success(request_id);
                SmallVec::new()
            },

            TaskAction::Removed { request_id, id } => {
                state.remove(id);
                tracing::info!(task_id = %id, "Task deleted");
                state.record_success(request_id);
                SmallVec::new()
            },

            TaskAction::Failed { request_id, error } => {
                tracing::warn!(%error, "Task operation failed");
                state.record_failure(request_id, error);
                SmallVec::new()
            },
        }
    }
}
