//! Client-side task store synchronized with a remote to-do API.
//!
//! The remote API owns the tasks; this crate keeps a local cache of them and
//! routes every change through the API first:
//!
//! - [`validation`]: field rules checked before anything is sent
//! - [`TaskService`]: the four remote operations, with an HTTP implementation
//!   ([`HttpTaskService`]) and an in-memory one for tests ([`mocks::MockTaskService`])
//! - [`TaskReducer`]: the only code that changes the cache
//! - [`TaskStore`]: the handle consumers use to read tasks, run operations and
//!   subscribe to changes
//!
//! A failed operation never changes the cache. A failed load keeps the last
//! collection that loaded successfully.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasklist::{HttpTaskService, SystemClock, TaskDraft, TaskStore};
//!
//! # async fn example() -> Result<(), tasklist::TaskError> {
//! let store = TaskStore::new(HttpTaskService::new("http://localhost:3000"), Arc::new(SystemClock));
//! store.load().await?;
//!
//! let task = store.add(TaskDraft::new("Buy milk", "2 liters")).await?;
//! store.toggle_done(task.id).await?;
//!
//! println!("Completed: {}/{}", store.completed_count().await, store.count().await);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod mocks;
pub mod reducer;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::{ConfigError, TaskConfig};
pub use error::{FieldError, TaskError, TaskField, ValidationErrorKind, ValidationErrors};
pub use http::HttpTaskService;
pub use reducer::{TaskEnvironment, TaskReducer};
pub use service::{Operation, TaskService};
pub use store::{TaskSnapshot, TaskStore, TaskSubscription};
pub use tasklist_core::environment::{Clock, SystemClock};
pub use types::{NewTask, RequestId, Task, TaskAction, TaskDraft, TaskId, TaskPatch, TaskState};
