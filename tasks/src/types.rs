//! Domain types for the task list
//!
//! The remote API is the source of truth for tasks; [`TaskState`] is the
//! client-side cache of what it last returned.

use crate::error::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Server-assigned task identifier
///
/// Unique within the collection and never reused by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A to-do item as stored by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier
    pub id: TaskId,
    /// Short summary, trimmed, 1..=100 characters
    pub title: String,
    /// Free text, possibly empty
    #[serde(default)]
    pub description: String,
    /// Completion flag
    #[serde(default)]
    pub done: bool,
    /// Creation timestamp, fixed when the task is created
    ///
    /// `None` when the server sent no `createdAt`.
    #[serde(default, with = "iso8601::option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `createdAt` wire format
///
/// Written the way JavaScript's `Date.toISOString` writes it. Read leniently:
/// RFC 3339, a date-time without offset (taken as UTC), or a bare date
/// (midnight UTC).
pub mod iso8601 {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    /// Parse an ISO-8601 timestamp, treating a missing offset as UTC
    #[must_use]
    pub fn parse(text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Some(at.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .map(|naive| naive.and_utc())
    }

    /// Format as `YYYY-MM-DDTHH:MM:SS.mmmZ`
    #[must_use]
    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub(crate) fn serialize<S: Serializer>(
        at: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| invalid::<D>(&text))
    }

    fn invalid<'de, D: Deserializer<'de>>(text: &str) -> D::Error {
        D::Error::custom(format!("invalid ISO-8601 timestamp {text:?}"))
    }

    pub(crate) mod option {
        use super::{DateTime, Deserialize, Deserializer, Serializer, Utc};

        #[allow(clippy::ref_option)] // serde `with` passes &Option<T>
        pub(crate) fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => super::serialize(at, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| super::parse(&text).ok_or_else(|| super::invalid::<D>(&text)))
                .transpose()
        }
    }
}

/// Raw user input for a new task, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Title as typed
    pub title: String,
    /// Description as typed (may be empty)
    pub description: String,
}

impl TaskDraft {
    /// Create a draft from title and description text
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Create a draft with an empty description
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self::new(title, String::new())
    }
}

/// Payload sent to the API when creating a task
///
/// Built only from a validated [`TaskDraft`]; new tasks always start not done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Validated, trimmed title
    pub title: String,
    /// Validated, trimmed description
    pub description: String,
    /// Always `false` for new tasks
    pub done: bool,
    /// Client timestamp at the moment of creation
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    /// Build a creation payload from an already-validated draft
    #[must_use]
    pub fn from_validated(draft: TaskDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            title: draft.title,
            description: draft.description,
            done: false,
            created_at,
        }
    }

    /// The task the server would store for this payload under `id`
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            done: self.done,
            created_at: Some(self.created_at),
        }
    }
}

/// Partial update of a task
///
/// Only present fields are sent. There is deliberately no way to express a
/// change of `id` or `createdAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New completion flag, if changing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl TaskPatch {
    /// An empty patch
    #[must_use]
    pub const fn new() -> Self {
        Self {
            title: None,
            description: None,
            done: None,
        }
    }

    /// Set the title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the completion flag
    #[must_use]
    pub fn done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }

    /// True when no field is present
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.done.is_none()
    }

    /// Apply the present fields to `task`
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(done) = self.done {
            task.done = done;
        }
    }
}

/// Correlation id pairing a command with its outcome event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-side cache of the task collection
///
/// Ids are unique within `tasks`. Newly created tasks sit at the front;
/// after a load the order is whatever the server returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    /// Cached tasks in presentation order
    pub tasks: Vec<Task>,
    /// True while at least one load is in flight
    pub loading: bool,
    /// Error of the most recently issued operation that failed
    ///
    /// Cleared only by the success of an operation issued after it, so an
    /// older request completing late does not hide a newer failure.
    pub last_error: Option<TaskError>,
    loads_in_flight: usize,
    /// Commands issued so far
    issued: u64,
    /// Issue order of commands still awaiting their outcome
    requests: HashMap<RequestId, u64>,
    /// Issue order of the request behind `last_error`
    last_error_seq: u64,
}

impl TaskState {
    /// Empty, idle state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State pre-populated with `tasks` (duplicates dropped)
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let mut state = Self::new();
        state.replace_all(tasks);
        state
    }

    /// Look up a cached task
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Whether a task with `id` is cached
    #[must_use]
    pub fn exists(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Number of cached tasks
    #[must_use]
    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of cached tasks marked done
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.done).count()
    }

    /// Number of cached tasks not yet done
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.count() - self.completed_count()
    }

    pub(crate) fn begin_load(&mut self) {
        self.loads_in_flight += 1;
        self.loading = true;
    }

    pub(crate) fn finish_load(&mut self) {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        self.loading = self.loads_in_flight > 0;
    }

    /// Record that a command was issued
    pub(crate) fn begin_request(&mut self, request_id: RequestId) {
        self.issued += 1;
        self.requests.insert(request_id, self.issued);
    }

    fn finish_request(&mut self, request_id: RequestId) -> u64 {
        // An outcome with no recorded command ranks with the newest request.
        self.requests.remove(&request_id).unwrap_or(self.issued)
    }

    /// Clear `last_error` if it belongs to a request issued before this one
    pub(crate) fn record_success(&mut self, request_id: RequestId) {
        let seq = self.finish_request(request_id);
        if seq >= self.last_error_seq {
            self.last_error = None;
        }
    }

    /// Keep `error` unless a newer request has already failed
    pub(crate) fn record_failure(&mut self, request_id: RequestId, error: TaskError) {
        let seq = self.finish_request(request_id);
        if self.last_error.is_none() || seq >= self.last_error_seq {
            self.last_error = Some(error);
            self.last_error_seq = seq;
        }
    }

    /// Replace the whole collection, keeping the first of any duplicated id
    pub(crate) fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut unique: Vec<Task> = Vec::with_capacity(tasks.len());
        for task in tasks {
            if unique.iter().any(|kept| kept.id == task.id) {
                tracing::warn!(task_id = %task.id, "Dropping duplicate task id from listing");
                continue;
            }
            unique.push(task);
        }
        self.tasks = unique;
    }

    /// Insert a created task at the front, or replace it in place if cached
    pub(crate) fn insert_created(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|cached| cached.id == task.id) {
            Some(cached) => *cached = task,
            None => self.tasks.insert(0, task),
        }
    }

    /// Replace a cached task with its updated version
    ///
    /// Keeps the cached position and creation time. Returns false if `task`
    /// is no longer cached (it was removed or reloaded away meanwhile).
    pub(crate) fn apply_updated(&mut self, mut task: Task) -> bool {
        let Some(cached) = self.tasks.iter_mut().find(|cached| cached.id == task.id) else {
            return false;
        };
        if cached.created_at.is_some() && cached.created_at != task.created_at {
            tracing::warn!(task_id = %task.id, "Server changed createdAt; keeping original");
            task.created_at = cached.created_at;
        }
        *cached = task;
        true
    }

    /// Remove a cached task; returns whether it was present
    pub(crate) fn remove(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }
}

/// Everything that can happen to the task store
///
/// Commands are sent by callers; events are produced by effects once the
/// remote API has answered (or the reducer rejected the command locally).
/// Every action carries the [`RequestId`] of the command it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskAction {
    // Commands
    /// Fetch the full collection from the API
    Load {
        /// Correlation id
        request_id: RequestId,
    },
    /// Validate and create a task
    Add {
        /// Correlation id
        request_id: RequestId,
        /// Unvalidated user input
        draft: TaskDraft,
    },
    /// Validate and apply a partial update
    Edit {
        /// Correlation id
        request_id: RequestId,
        /// Task to update
        id: TaskId,
        /// Fields to change
        patch: TaskPatch,
    },
    /// Flip the completion flag of a cached task
    ToggleDone {
        /// Correlation id
        request_id: RequestId,
        /// Task to toggle
        id: TaskId,
    },
    /// Delete a task
    Remove {
        /// Correlation id
        request_id: RequestId,
        /// Task to delete
        id: TaskId,
    },

    // Events
    /// The API returned the full collection
    Loaded {
        /// Correlation id
        request_id: RequestId,
        /// Tasks in server order
        tasks: Vec<Task>,
    },
    /// Listing failed; the cache keeps its previous contents
    LoadFailed {
        /// Correlation id
        request_id: RequestId,
        /// Why it failed
        error: TaskError,
    },
    /// The API created a task
    Added {
        /// Correlation id
        request_id: RequestId,
        /// Task with its server-assigned id
        task: Task,
    },
    /// The API updated a task
    Edited {
        /// Correlation id
        request_id: RequestId,
        /// Full updated task
        task: Task,
    },
    /// The API deleted a task
    Removed {
        /// Correlation id
        request_id: RequestId,
        /// Deleted task
        id: TaskId,
    },
    /// A mutation failed locally or remotely; the cache is unchanged
    Failed {
        /// Correlation id
        request_id: RequestId,
        /// Why it failed
        error: TaskError,
    },
}

impl TaskAction {
    /// Correlation id of this action
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::Load { request_id }
            | Self::Add { request_id, .. }
            | Self::Edit { request_id, .. }
            | Self::ToggleDone { request_id, .. }
            | Self::Remove { request_id, .. }
            | Self::Loaded { request_id, .. }
            | Self::LoadFailed { request_id, .. }
            | Self::Added { request_id, .. }
            | Self::Edited { request_id, .. }
            | Self::Removed { request_id, .. }
            | Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// Whether this action is a caller command
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::Load { .. }
                | Self::Add { .. }
                | Self::Edit { .. }
                | Self::ToggleDone { .. }
                | Self::Remove { .. }
        )
    }

    /// Whether this action is an outcome event
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }

    /// Whether this is the outcome event of the command `request_id`
    #[must_use]
    pub fn is_outcome_of(&self, request_id: RequestId) -> bool {
        self.is_event() && self.request_id() == request_id
    }

    /// Error carried by a failure event
    #[must_use]
    pub const fn error(&self) -> Option<&TaskError> {
        match self {
            Self::LoadFailed { error, .. } | Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can unwrap
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn task(id: i64, title: &str) -> Task {
        Task {
            id: TaskId::new(id),
            title: title.to_string(),
            description: String::new(),
            done: false,
            created_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn task_uses_camel_case_wire_format() {
        let json = serde_json::to_value(task(3, "Buy milk")).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["createdAt"], "2025-01-01T00:00:00.000Z");
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn task_defaults_missing_description_and_done() {
        let task: Task = serde_json::from_str(
            r#"{"id": 1, "title": "Call mom", "createdAt": "2025-03-04T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(task.description, "");
        assert!(!task.done);
    }

    #[test]
    fn created_at_accepts_iso8601_without_offset() {
        let cases = [
            ("2025-03-04T10:00:00.000Z", (2025, 3, 4, 10, 0, 0)),
            ("2025-03-04T12:00:00+02:00", (2025, 3, 4, 10, 0, 0)),
            ("2025-03-04T10:00:00", (2025, 3, 4, 10, 0, 0)),
            ("2025-03-04T10:00:00.250", (2025, 3, 4, 10, 0, 0)),
            ("2025-03-04 10:00:00", (2025, 3, 4, 10, 0, 0)),
            ("2025-03-04", (2025, 3, 4, 0, 0, 0)),
        ];
        for (text, (y, mo, d, h, mi, sec)) in cases {
            let json = format!(r#"{{"id": 1, "title": "t", "createdAt": "{text}"}}"#);
            let task: Task = serde_json::from_str(&json).unwrap();
            let at = task.created_at.unwrap();
            assert_eq!(
                at.with_nanosecond(0).unwrap(),
                Utc.with_ymd_and_hms(y, mo, d, h, mi, sec).unwrap(),
                "{text}"
            );
        }
    }

    #[test]
    fn created_at_missing_or_null_is_none() {
        let missing: Task = serde_json::from_str(r#"{"id": 1, "title": "t"}"#).unwrap();
        let null: Task =
            serde_json::from_str(r#"{"id": 2, "title": "t", "createdAt": null}"#).unwrap();
        assert_eq!(missing.created_at, None);
        assert_eq!(null.created_at, None);
        assert!(serde_json::to_value(&missing).unwrap().get("createdAt").is_none());
    }

    #[test]
    fn created_at_rejects_garbage() {
        let result = serde_json::from_str::<Task>(r#"{"id": 1, "title": "t", "createdAt": "soon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn new_task_writes_javascript_iso_string() {
        let payload = NewTask::from_validated(
            TaskDraft::titled("t"),
            Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap(),
        );
        let json = serde_json::to_value(payload).unwrap();
        assert_eq!(json["createdAt"], "2025-03-04T10:00:00.000Z");
    }

    #[test]
    fn apply_updated_adopts_server_created_at_when_unknown() {
        let mut unknown = task(1, "a");
        unknown.created_at = None;
        let mut state = TaskState::with_tasks(vec![unknown]);

        assert!(state.apply_updated(task(1, "b")));
        assert_eq!(state.get(TaskId::new(1)).unwrap().created_at, task(1, "b").created_at);
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let json = serde_json::to_string(&TaskPatch::new().done(true)).unwrap();
        assert_eq!(json, r#"{"done":true}"#);
        assert!(TaskPatch::new().is_empty());
    }

    #[test]
    fn replace_all_keeps_first_duplicate() {
        let mut state = TaskState::new();
        state.replace_all(vec![task(1, "first"), task(2, "two"), task(1, "again")]);
        assert_eq!(state.count(), 2);
        assert_eq!(state.get(TaskId::new(1)).unwrap().title, "first");
    }

    #[test]
    fn insert_created_prepends_or_replaces() {
        let mut state = TaskState::with_tasks(vec![task(1, "old")]);
        state.insert_created(task(2, "new"));
        assert_eq!(state.tasks[0].id, TaskId::new(2));

        state.insert_created(task(1, "renamed"));
        assert_eq!(state.count(), 2);
        assert_eq!(state.tasks[1].title, "renamed");
    }

    #[test]
    fn apply_updated_keeps_created_at() {
        let mut state = TaskState::with_tasks(vec![task(1, "a")]);
        let mut updated = task(1, "b");
        updated.created_at = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());

        assert!(state.apply_updated(updated));
        let cached = state.get(TaskId::new(1)).unwrap();
        assert_eq!(cached.title, "b");
        assert_eq!(cached.created_at, task(1, "a").created_at);

        assert!(!state.apply_updated(task(9, "gone")));
    }

    #[test]
    fn late_success_of_older_request_keeps_newer_error() {
        let (older, newer, latest) = (RequestId::new(), RequestId::new(), RequestId::new());
        let mut state = TaskState::new();
        state.begin_request(older);
        state.begin_request(newer);

        state.record_failure(newer, TaskError::Network("offline".into()));
        state.record_success(older);
        assert_eq!(state.last_error, Some(TaskError::Network("offline".into())));

        state.begin_request(latest);
        state.record_success(latest);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn older_failure_does_not_replace_newer_one() {
        let (older, newer) = (RequestId::new(), RequestId::new());
        let mut state = TaskState::new();
        state.begin_request(older);
        state.begin_request(newer);

        state.record_failure(newer, TaskError::NotFound(TaskId::new(2)));
        state.record_failure(older, TaskError::NotFound(TaskId::new(1)));
        assert_eq!(state.last_error, Some(TaskError::NotFound(TaskId::new(2))));
    }

    #[test]
    fn overlapping_loads_keep_loading_flag() {
        let mut state = TaskState::new();
        state.begin_load();
        state.begin_load();
        state.finish_load();
        assert!(state.loading);
        state.finish_load();
        assert!(!state.loading);
    }

    #[test]
    fn counts_split_done_and_pending() {
        let mut done = task(2, "done");
        done.done = true;
        let state = TaskState::with_tasks(vec![task(1, "open"), done]);
        assert_eq!(state.completed_count(), 1);
        assert_eq!(state.pending_count(), 1);
    }

    #[test]
    fn outcome_matching_ignores_commands() {
        let request_id = RequestId::new();
        let command = TaskAction::Load { request_id };
        let event = TaskAction::Loaded { request_id, tasks: vec![] };
        assert!(!command.is_outcome_of(request_id));
        assert!(event.is_outcome_of(request_id));
        assert!(!event.is_outcome_of(RequestId::new()));
    }

    #[test]
    fn task_id_parses_from_cli_text() {
        assert_eq!(" 42 ".parse::<TaskId>().unwrap(), TaskId::new(42));
        assert!("abc".parse::<TaskId>().is_err());
    }
}
