//! Error types for the cloud-ocr-task library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrTaskError`] is **fatal**. The invocation is misconfigured and
//!   cannot run at all (invalid request, missing schema, broken transport
//!   settings). Returned as `Err(OcrTaskError)` from the top-level
//!   `process_*` functions.
//!
//! * [`TaskError`] is **non-fatal**. Something went wrong on the remote side
//!   or during result validation. Stored inside
//!   [`crate::output::ResultRecord`] so callers always receive exactly one
//!   record, including the task id and credits observed before the failure.
//!
//! [`ValidationError`] is the return type of the result validators. It
//! converts into [`TaskError`] when the orchestrator captures it.

use crate::params::ExportFormat;
use crate::task::TaskStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the cloud-ocr-task library.
///
/// Remote-side failures use [`TaskError`] and are stored in
/// [`crate::output::ResultRecord`] rather than propagated here.
#[derive(Debug, Error)]
pub enum OcrTaskError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A field parameter could not be parsed from its string form.
    #[error("Invalid value '{value}' for {field}")]
    InvalidParameter { field: &'static str, value: String },

    // ── Schema errors ─────────────────────────────────────────────────────
    /// The result schema is missing or malformed.
    #[error("Result schema '{name}' is unusable: {detail}")]
    Schema { name: String, detail: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The HTTP client could not be built from the transport settings.
    #[error("Failed to build HTTP transport: {0}")]
    TransportSetup(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal task failure.
///
/// Captured into [`crate::output::ResultRecord::error`]; never propagated
/// past the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TaskError {
    /// The source payload could not be read or downloaded.
    #[error("Cannot read source '{source_ref}': {detail}")]
    SourceUnreadable { source_ref: String, detail: String },

    /// The submission was rejected or the transport failed.
    #[error("Task submission failed{}: {message}", status_suffix(.status_code))]
    RemoteSubmission {
        status_code: Option<u16>,
        message: String,
    },

    /// A status query failed. Logged and reported to the observer while
    /// polling continues; never stored in a record.
    #[error("Status query for task '{task_id}' failed{}: {message}", status_suffix(.status_code))]
    PollingTransport {
        task_id: String,
        status_code: Option<u16>,
        message: String,
    },

    /// The remote service reported that processing failed.
    #[error("Task '{task_id}' failed on the remote service")]
    RemoteTaskFailed { task_id: String },

    /// The account has insufficient credits to process the task.
    #[error("Task '{task_id}' was not processed: insufficient credits")]
    InsufficientCredits { task_id: String },

    /// The task completed but advertised no result location.
    #[error("Task '{task_id}' completed without a result URL")]
    NoResultAvailable { task_id: String },

    /// Pre-download validation: the advertised size exceeds the ceiling.
    #[error("The {format} result is {size} bytes, exceeding the maximum of {max} bytes")]
    ResultTooLarge {
        format: ExportFormat,
        size: u64,
        max: u64,
    },

    /// Pre-download validation: the size could not be determined.
    #[error("Could not determine the size of the {format} result{}: {detail}", status_suffix(.status_code))]
    ResultSizeUnavailable {
        format: ExportFormat,
        status_code: Option<u16>,
        detail: String,
    },

    /// The result download failed.
    #[error("Failed to download the result{}: {message}", status_suffix(.status_code))]
    ResultDownload {
        status_code: Option<u16>,
        message: String,
    },

    /// Post-download validation: the content does not match the schema.
    #[error("The response did not pass validation: {detail}")]
    ResultMalformed { detail: String },

    /// The validated content could not be written to the destination.
    #[error("Failed to write destination file '{path}': {detail}")]
    DestinationWrite { path: PathBuf, detail: String },
}

impl TaskError {
    /// Terminal negative outcome for a status, if the status is one.
    pub fn from_terminal_status(task_id: &str, status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Failed => Some(TaskError::RemoteTaskFailed {
                task_id: task_id.to_string(),
            }),
            TaskStatus::NotEnoughCredits => Some(TaskError::InsufficientCredits {
                task_id: task_id.to_string(),
            }),
            TaskStatus::Queued | TaskStatus::InProgress | TaskStatus::Completed => None,
        }
    }
}

impl TaskError {
    /// HTTP status of the failing exchange, when one was received.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            TaskError::RemoteSubmission { status_code, .. }
            | TaskError::PollingTransport { status_code, .. }
            | TaskError::ResultSizeUnavailable { status_code, .. }
            | TaskError::ResultDownload { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

fn status_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" (HTTP {c})")).unwrap_or_default()
}

/// Outcome of a failed result validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Advertised size is above the configured ceiling.
    #[error("{format} result of {size} bytes exceeds the {max}-byte limit")]
    TooLarge {
        format: ExportFormat,
        size: u64,
        max: u64,
    },

    /// The size query failed or carried no usable length.
    #[error("size of {format} result unavailable: {detail}")]
    SizeUnavailable {
        format: ExportFormat,
        status_code: Option<u16>,
        detail: String,
    },

    /// The content failed parsing or schema checks.
    #[error("{0}")]
    Malformed(String),
}

impl From<ValidationError> for TaskError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::TooLarge { format, size, max } => {
                TaskError::ResultTooLarge { format, size, max }
            }
            ValidationError::SizeUnavailable {
                format,
                status_code,
                detail,
            } => TaskError::ResultSizeUnavailable {
                format,
                status_code,
                detail,
            },
            ValidationError::Malformed(detail) => TaskError::ResultMalformed { detail },
        }
    }
}
