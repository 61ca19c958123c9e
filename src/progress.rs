//! Observer trait for task lifecycle events.
//!
//! Inject an [`ObserverHandle`] through [`crate::config::RunOptions::observer`]
//! to receive events as the orchestrator submits, polls and validates a task.
//!
//! # Example
//!
//! ```rust
//! use cloud_ocr_task::{TaskObserver, TaskStatus, RunOptions};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicUsize,
//! }
//!
//! impl TaskObserver for PollCounter {
//!     fn on_status(&self, task_id: &str, status: TaskStatus) {
//!         let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{task_id}: {status} (check #{n})");
//!     }
//! }
//!
//! let options = RunOptions {
//!     observer: Some(Arc::new(PollCounter { polls: AtomicUsize::new(0) })),
//!     ..RunOptions::default()
//! };
//! ```

use crate::task::TaskStatus;
use std::sync::Arc;

/// Called by the orchestrator at each lifecycle step.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait TaskObserver: Send + Sync {
    /// The service accepted the task.
    fn on_submitted(&self, task_id: &str) {
        let _ = task_id;
    }

    /// A status query succeeded.
    fn on_status(&self, task_id: &str, status: TaskStatus) {
        let _ = (task_id, status);
    }

    /// A status query failed; polling continues until the deadline.
    fn on_poll_error(&self, task_id: &str, error: &str) {
        let _ = (task_id, error);
    }

    /// The downloaded result passed structural validation.
    ///
    /// # Arguments
    /// * `content_len`: byte length of the validated content
    fn on_result_validated(&self, task_id: &str, content_len: usize) {
        let _ = (task_id, content_len);
    }

    /// The run finished, successfully or not.
    fn on_complete(&self, task_id: Option<&str>, succeeded: bool) {
        let _ = (task_id, succeeded);
    }
}

/// Observer that ignores every event. Used when none is configured.
pub struct NoopObserver;

impl TaskObserver for NoopObserver {}

/// Shared observer as stored in [`crate::config::RunOptions`].
pub type ObserverHandle = Arc<dyn TaskObserver>;
