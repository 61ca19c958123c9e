//! The canonical result record.

use crate::error::TaskError;
use crate::task::TaskHandle;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// Outcome of one invocation.
///
/// Exactly one is produced per run. On success `content` holds the
/// validated result (BOM-stripped); on failure `error` says why. A timed-out
/// run has neither and `timed_out` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    content: String,
    destination_path: Option<PathBuf>,
    task_id: Option<String>,
    credits_used: Option<u32>,
    http_status_code: Option<u16>,
    timed_out: bool,
    #[serde(serialize_with = "error_text")]
    error: Option<TaskError>,
}

fn error_text<S: serde::Serializer>(e: &Option<TaskError>, s: S) -> Result<S::Ok, S::Error> {
    match e {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_str(""),
    }
}

impl ResultRecord {
    pub(crate) fn success(
        handle: &TaskHandle,
        content: String,
        destination_path: Option<PathBuf>,
        http_status_code: Option<u16>,
    ) -> Self {
        Self {
            content,
            destination_path,
            task_id: Some(handle.task_id().to_string()),
            credits_used: handle.credits(),
            http_status_code: http_status_code.or(handle.last_http_status()),
            timed_out: false,
            error: None,
        }
    }

    /// Failure before or after a task id was assigned.
    ///
    /// The HTTP status carried by the error wins over the handle's last one.
    pub(crate) fn failure(handle: Option<&TaskHandle>, error: TaskError) -> Self {
        Self {
            content: String::new(),
            destination_path: None,
            task_id: handle.map(|h| h.task_id().to_string()),
            credits_used: handle.and_then(TaskHandle::credits),
            http_status_code: error
                .http_status()
                .or(handle.and_then(TaskHandle::last_http_status)),
            timed_out: false,
            error: Some(error),
        }
    }

    /// Report `status` as the last exchange unless the error carries its own.
    pub(crate) fn or_http_status(mut self, status: Option<u16>) -> Self {
        let own = self.error.as_ref().and_then(TaskError::http_status);
        if let (None, Some(code)) = (own, status) {
            self.http_status_code = Some(code);
        }
        self
    }

    pub(crate) fn timed_out(handle: &TaskHandle) -> Self {
        Self {
            content: String::new(),
            destination_path: None,
            task_id: Some(handle.task_id().to_string()),
            credits_used: handle.credits(),
            http_status_code: handle.last_http_status(),
            timed_out: true,
            error: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn destination_path(&self) -> Option<&Path> {
        self.destination_path.as_deref()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn credits_used(&self) -> Option<u32> {
        self.credits_used
    }

    pub fn http_status_code(&self) -> Option<u16> {
        self.http_status_code
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// No error and not timed out.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !self.timed_out
    }

    /// Flat string map for hosts that consume named outputs.
    ///
    /// Absent values render as empty strings.
    pub fn to_output_map(&self) -> Map<String, Value> {
        let opt = |v: Option<String>| v.unwrap_or_default();
        let mut map = Map::new();
        map.insert("content".into(), json!(self.content));
        map.insert(
            "destinationPath".into(),
            json!(opt(self.destination_path.as_ref().map(|p| p.display().to_string()))),
        );
        map.insert("taskId".into(), json!(opt(self.task_id.clone())));
        map.insert(
            "creditsUsed".into(),
            json!(opt(self.credits_used.map(|c| c.to_string()))),
        );
        map.insert(
            "httpStatusCode".into(),
            json!(opt(self.http_status_code.map(|c| c.to_string()))),
        );
        map.insert("timedOut".into(), json!(self.timed_out.to_string()));
        map.insert(
            "error".into(),
            json!(opt(self.error.as_ref().map(ToString::to_string))),
        );
        map.insert("succeeded".into(), json!(self.succeeded().to_string()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskInfo, TaskStatus};

    fn handle() -> TaskHandle {
        TaskHandle::from_submission(
            TaskInfo {
                id: "task-7".into(),
                status: TaskStatus::Completed,
                credits: Some(2),
                estimated_processing_secs: None,
                result_urls: vec![],
            },
            200,
        )
    }

    #[test]
    fn success_map() {
        let r = ResultRecord::success(&handle(), "<x/>".into(), Some("out.xml".into()), Some(200));
        let m = r.to_output_map();
        assert_eq!(m["content"], "<x/>");
        assert_eq!(m["destinationPath"], "out.xml");
        assert_eq!(m["taskId"], "task-7");
        assert_eq!(m["creditsUsed"], "2");
        assert_eq!(m["httpStatusCode"], "200");
        assert_eq!(m["timedOut"], "false");
        assert_eq!(m["error"], "");
        assert_eq!(m["succeeded"], "true");
    }

    #[test]
    fn timed_out_is_not_success() {
        let r = ResultRecord::timed_out(&handle());
        assert!(!r.succeeded());
        assert!(r.error().is_none());
        assert!(r.content().is_empty());
        assert_eq!(r.to_output_map()["succeeded"], "false");
    }

    #[test]
    fn failure_keeps_task_context() {
        let r = ResultRecord::failure(
            Some(&handle()),
            TaskError::InsufficientCredits {
                task_id: "task-7".into(),
            },
        );
        assert!(!r.succeeded());
        assert_eq!(r.credits_used(), Some(2));
        assert_eq!(r.http_status_code(), Some(200));
        assert!(r.to_output_map()["error"]
            .as_str()
            .unwrap()
            .contains("insufficient credits"));
    }

    #[test]
    fn last_exchange_status_fills_in_for_bare_errors() {
        let malformed = ResultRecord::failure(
            Some(&handle()),
            TaskError::ResultMalformed {
                detail: "bad root".into(),
            },
        )
        .or_http_status(Some(203));
        assert_eq!(malformed.http_status_code(), Some(203));

        let download = ResultRecord::failure(
            Some(&handle()),
            TaskError::ResultDownload {
                status_code: Some(410),
                message: "gone".into(),
            },
        )
        .or_http_status(Some(203));
        assert_eq!(download.http_status_code(), Some(410));

        let untouched = ResultRecord::failure(
            Some(&handle()),
            TaskError::RemoteTaskFailed {
                task_id: "task-7".into(),
            },
        )
        .or_http_status(None);
        assert_eq!(untouched.http_status_code(), Some(200));
    }

    #[test]
    fn serializes_error_as_text() {
        let r = ResultRecord::failure(
            None,
            TaskError::RemoteSubmission {
                status_code: Some(401),
                message: "denied".into(),
            },
        );
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["taskId"], Value::Null);
        assert!(v["error"].as_str().unwrap().contains("denied"));
        assert_eq!(v["httpStatusCode"], 401);
    }
}
