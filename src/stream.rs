//! Streaming status API: emit each status observation as it arrives.
//!
//! [`status_stream`] yields one item per `getTaskStatus` call. The first
//! query fires immediately; every later one waits `interval` first. The
//! stream never ends on its own, so consumers stop pulling once they see a
//! terminal status or run out of patience.
//! [`crate::orchestrator::TaskOrchestrator::await_completion`] is built on
//! it.
//!
//! # Example
//! ```rust,no_run
//! use cloud_ocr_task::{status_stream, RemoteTaskApi, ReqwestTransport, TaskRequest};
//! use futures::StreamExt;
//! use std::{sync::Arc, time::Duration};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = TaskRequest::builder().application_id("app").source("a.png").build()?;
//! let api = RemoteTaskApi::new(Arc::new(ReqwestTransport::from_settings(request.transport())?));
//! let mut polls = status_stream(api, request, "task-id".into(), Duration::from_secs(2));
//! while let Some(reply) = polls.next().await {
//!     let reply = reply?;
//!     println!("{}", reply.info.status);
//!     if reply.info.status.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::api::{ApiError, RemoteTaskApi, TaskReply};
use crate::config::TaskRequest;
use futures::stream;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed, endless stream of status query outcomes.
pub type StatusStream = Pin<Box<dyn Stream<Item = Result<TaskReply, ApiError>> + Send>>;

/// Poll the status of `task_id` every `interval`.
pub fn status_stream(
    api: RemoteTaskApi,
    request: TaskRequest,
    task_id: String,
    interval: Duration,
) -> StatusStream {
    let state = (api, request, task_id, 0u64);
    let s = stream::unfold(state, move |(api, request, task_id, n)| async move {
        if n > 0 {
            tokio::time::sleep(interval).await;
        }
        debug!("Status query #{} for task {}", n + 1, task_id);
        let reply = api.task_status(&request, &task_id).await;
        Some((reply, (api, request, task_id, n + 1)))
    });
    Box::pin(s)
}
