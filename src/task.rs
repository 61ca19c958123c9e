//! Task lifecycle types: status, handle, and result descriptor.
//!
//! # State Machine
//!
//! ```text
//! Queued     -> Queued, InProgress, Completed, Failed, NotEnoughCredits
//! InProgress -> InProgress, Completed, Failed, NotEnoughCredits
//! Completed | Failed | NotEnoughCredits -> (terminal, no transitions)
//! ```
//!
//! Repeated observations of the same transient status are normal while
//! polling. A regression (`InProgress -> Queued`) or any change after a
//! terminal status is rejected by [`TaskHandle::advance`], and the handle
//! keeps its previous status.

use crate::params::ExportFormat;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Remote task status, normalised to a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Accepted and waiting for a worker.
    Queued,
    /// A worker is processing the task.
    InProgress,
    /// Finished; result URLs are available (terminal).
    Completed,
    /// Processing failed or the task was deleted (terminal).
    Failed,
    /// The account ran out of credits (terminal).
    NotEnoughCredits,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "Queued"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::NotEnoughCredits => write!(f, "NotEnoughCredits"),
        }
    }
}

impl TaskStatus {
    /// Map the service's status string onto the closed set.
    ///
    /// `Submitted` is folded into `Queued`; `ProcessingFailed` and `Deleted`
    /// into `Failed`. Unknown strings return `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Submitted" | "Queued" => Some(Self::Queued),
            "InProgress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "ProcessingFailed" | "Failed" | "Deleted" => Some(Self::Failed),
            "NotEnoughCredits" => Some(Self::NotEnoughCredits),
            _ => None,
        }
    }

    /// Returns `true` if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::NotEnoughCredits
        )
    }

    /// Returns `true` if moving from this status to `next` keeps the
    /// lifecycle monotonic.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match self {
            Self::Queued => true,
            Self::InProgress => !matches!(next, Self::Queued),
            Self::Completed | Self::Failed | Self::NotEnoughCredits => false,
        }
    }
}

/// Snapshot of one task as reported by a submit or status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: String,
    pub status: TaskStatus,
    pub credits: Option<u32>,
    pub estimated_processing_secs: Option<u32>,
    pub result_urls: Vec<Url>,
}

/// Handle to a submitted task.
///
/// Created by submission and advanced only by the orchestrator while
/// polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    task_id: String,
    status: TaskStatus,
    credits: Option<u32>,
    result_urls: Vec<Url>,
    last_http_status: Option<u16>,
    timed_out: bool,
}

impl TaskHandle {
    /// Start a handle from the submission response.
    pub fn from_submission(info: TaskInfo, http_status: u16) -> Self {
        Self {
            task_id: info.id,
            status: info.status,
            credits: info.credits,
            result_urls: info.result_urls,
            last_http_status: Some(http_status),
            timed_out: false,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn credits(&self) -> Option<u32> {
        self.credits
    }

    pub fn result_urls(&self) -> &[Url] {
        &self.result_urls
    }

    pub fn last_http_status(&self) -> Option<u16> {
        self.last_http_status
    }

    /// Whether polling gave up before a terminal status was observed.
    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Apply a status observation. Returns `false` (and leaves the status
    /// unchanged) when the observation would break monotonicity.
    pub(crate) fn advance(&mut self, info: TaskInfo, http_status: u16) -> bool {
        self.last_http_status = Some(http_status);
        if !self.status.can_transition_to(&info.status) {
            warn!(
                "Task {}: ignoring status {} after {}",
                self.task_id, info.status, self.status
            );
            return false;
        }
        self.status = info.status;
        if info.credits.is_some() {
            self.credits = info.credits;
        }
        if !info.result_urls.is_empty() {
            self.result_urls = info.result_urls;
        }
        true
    }

    pub(crate) fn record_http_status(&mut self, http_status: Option<u16>) {
        if http_status.is_some() {
            self.last_http_status = http_status;
        }
    }

    pub(crate) fn mark_timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }

    /// Describe the producible result of a completed task.
    pub fn result_descriptor(&self, format: ExportFormat) -> ResultDescriptor {
        ResultDescriptor {
            locations: self.result_urls.clone(),
            format,
            advertised_size: None,
        }
    }
}

/// Metadata describing a result artifact before it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDescriptor {
    /// Candidate locations; the first one is authoritative.
    pub locations: Vec<Url>,
    pub format: ExportFormat,
    /// Byte size reported by the existence check, once known.
    pub advertised_size: Option<u64>,
}

impl ResultDescriptor {
    pub fn primary(&self) -> Option<&Url> {
        self.locations.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: TaskStatus) -> TaskInfo {
        TaskInfo {
            id: "t1".into(),
            status,
            credits: Some(1),
            estimated_processing_secs: None,
            result_urls: vec![],
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::NotEnoughCredits.is_terminal());
    }

    #[test]
    fn wire_mapping() {
        assert_eq!(TaskStatus::from_wire("Submitted"), Some(TaskStatus::Queued));
        assert_eq!(TaskStatus::from_wire("ProcessingFailed"), Some(TaskStatus::Failed));
        assert_eq!(TaskStatus::from_wire("Deleted"), Some(TaskStatus::Failed));
        assert_eq!(
            TaskStatus::from_wire("NotEnoughCredits"),
            Some(TaskStatus::NotEnoughCredits)
        );
        assert_eq!(TaskStatus::from_wire("completed"), None);
    }

    #[test]
    fn no_transition_out_of_terminal() {
        for terminal in [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::NotEnoughCredits,
        ] {
            for next in [
                TaskStatus::Queued,
                TaskStatus::InProgress,
                TaskStatus::Completed,
                TaskStatus::Failed,
                TaskStatus::NotEnoughCredits,
            ] {
                assert!(!terminal.can_transition_to(&next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn in_progress_does_not_regress() {
        assert!(!TaskStatus::InProgress.can_transition_to(&TaskStatus::Queued));
        assert!(TaskStatus::InProgress.can_transition_to(&TaskStatus::InProgress));
        assert!(TaskStatus::Queued.can_transition_to(&TaskStatus::InProgress));
    }

    #[test]
    fn handle_ignores_changes_after_terminal() {
        let mut handle = TaskHandle::from_submission(info(TaskStatus::Queued), 200);
        assert!(handle.advance(info(TaskStatus::InProgress), 200));
        assert!(handle.advance(info(TaskStatus::Completed), 200));
        assert!(!handle.advance(info(TaskStatus::Failed), 200));
        assert_eq!(handle.status(), TaskStatus::Completed);
    }

    #[test]
    fn handle_keeps_known_credits() {
        let mut handle = TaskHandle::from_submission(info(TaskStatus::Queued), 200);
        let mut next = info(TaskStatus::InProgress);
        next.credits = None;
        handle.advance(next, 200);
        assert_eq!(handle.credits(), Some(1));
    }
}
