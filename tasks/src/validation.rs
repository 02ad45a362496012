//! Validation rules for user-entered task text
//!
//! Rules apply in order and the first failing rule decides a field's error:
//!
//! | Field       | Rules                                                 |
//! |-------------|-------------------------------------------------------|
//! | title       | non-empty after trim, ≤ 100 chars, allowed characters |
//! | description | optional, ≤ 500 chars, allowed characters if present  |
//!
//! Lengths count characters (Unicode scalar values) of the raw input, before
//! trimming. Allowed characters are letters and digits of any script, space,
//! CR, LF and `. , - _ : ( ) ¡ ! ¿ ?`.

use crate::error::{TaskField, ValidationErrorKind, ValidationErrors};
use crate::types::{TaskDraft, TaskPatch};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 100;

/// Maximum description length in characters
pub const DESCRIPTION_MAX_CHARS: usize = 500;

#[allow(clippy::expect_used)] // Pattern is a constant, covered by tests
static ALLOWED_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N} .,\-_:()¡!¿?\n\r]+$").expect("allowed-text pattern is valid")
});

fn has_only_allowed_characters(value: &str) -> bool {
    ALLOWED_TEXT.is_match(value)
}

/// Validate a title, returning it trimmed
///
/// # Errors
///
/// - [`ValidationErrorKind::EmptyField`] if empty or whitespace-only
/// - [`ValidationErrorKind::TooLong`] if longer than [`TITLE_MAX_CHARS`]
/// - [`ValidationErrorKind::InvalidCharacters`] if any character is outside the allowed set
pub fn validate_title(value: &str) -> Result<String, ValidationErrorKind> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationErrorKind::EmptyField);
    }
    if value.chars().count() > TITLE_MAX_CHARS {
        return Err(ValidationErrorKind::TooLong { max: TITLE_MAX_CHARS });
    }
    if !has_only_allowed_characters(value) {
        return Err(ValidationErrorKind::InvalidCharacters);
    }
    Ok(trimmed.to_string())
}

/// Validate a description, returning it trimmed
///
/// Empty or whitespace-only input is valid and yields an empty string.
///
/// # Errors
///
/// - [`ValidationErrorKind::TooLong`] if longer than [`DESCRIPTION_MAX_CHARS`]
/// - [`ValidationErrorKind::InvalidCharacters`] if any character is outside the allowed set
pub fn validate_description(value: &str) -> Result<String, ValidationErrorKind> {
    if value.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ValidationErrorKind::TooLong {
            max: DESCRIPTION_MAX_CHARS,
        });
    }
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !has_only_allowed_characters(value) {
        return Err(ValidationErrorKind::InvalidCharacters);
    }
    Ok(trimmed.to_string())
}

/// Validate a draft, reporting every failing field
///
/// # Errors
///
/// Returns all field errors when title or description is invalid.
pub fn validate_draft(draft: &TaskDraft) -> Result<TaskDraft, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = validate_title(&draft.title)
        .map_err(|kind| errors.push(TaskField::Title, kind))
        .ok();
    let description = validate_description(&draft.description)
        .map_err(|kind| errors.push(TaskField::Description, kind))
        .ok();

    match (title, description) {
        (Some(title), Some(description)) => Ok(TaskDraft { title, description }),
        _ => Err(errors),
    }
}

/// Validate the text fields present in a patch
///
/// Absent fields are not checked; `done` needs no validation.
///
/// # Errors
///
/// Returns all field errors for present fields that are invalid.
pub fn validate_patch(patch: &TaskPatch) -> Result<TaskPatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut cleaned = TaskPatch {
        done: patch.done,
        ..TaskPatch::new()
    };

    if let Some(title) = &patch.title {
        match validate_title(title) {
            Ok(title) => cleaned.title = Some(title),
            Err(kind) => errors.push(TaskField::Title, kind),
        }
    }
    if let Some(description) = &patch.description {
        match validate_description(description) {
            Ok(description) => cleaned.description = Some(description),
            Err(kind) => errors.push(TaskField::Description, kind),
        }
    }

    errors.into_result(cleaned)
}
