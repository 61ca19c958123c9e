//! Task orchestration: submit → poll → size check → download → validate.
//!
//! ## Ordering
//!
//! Every step of one run happens strictly after the previous one: the size
//! query never precedes the terminal status, the download never precedes
//! the size check and structural validation never precedes the download.
//! Only polling suspends; everything else is a single awaited exchange.
//!
//! ## Failure model
//!
//! [`TaskOrchestrator::run`] always returns exactly one [`ResultRecord`].
//! Remote and validation failures land in the record's `error`; fatal
//! configuration problems are caught earlier, when the orchestrator is
//! built.

use crate::api::RemoteTaskApi;
use crate::config::{PollPolicy, RunOptions, TaskRequest};
use crate::error::{OcrTaskError, TaskError};
use crate::output::ResultRecord;
use crate::pipeline::schema::Schema;
use crate::pipeline::validate::XmlResultValidator;
use crate::pipeline::{clean, sink, source};
use crate::progress::{NoopObserver, ObserverHandle};
use crate::stream::status_stream;
use crate::task::{TaskHandle, TaskStatus};
use crate::transport::Transport;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Drives a single remote task from submission to a result record.
#[derive(Clone)]
pub struct TaskOrchestrator {
    transport: Arc<dyn Transport>,
    api: RemoteTaskApi,
    validator: XmlResultValidator,
    poll: PollPolicy,
    observer: ObserverHandle,
}

impl TaskOrchestrator {
    /// Build an orchestrator over `transport`.
    ///
    /// Loads the result schema named in `options` (or the built-in one);
    /// an unusable schema is fatal.
    pub fn new(transport: Arc<dyn Transport>, options: &RunOptions) -> Result<Self, OcrTaskError> {
        let schema = match options.schema_path {
            Some(ref path) => Schema::load(path)?,
            None => Schema::text_field()?,
        };
        let api = RemoteTaskApi::new(Arc::clone(&transport));
        let validator = XmlResultValidator::new(api.clone(), Arc::new(schema))
            .with_max_size(options.max_result_size);

        Ok(Self {
            transport,
            api,
            validator,
            poll: options.poll,
            observer: options
                .observer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopObserver) as ObserverHandle),
        })
    }

    pub fn api(&self) -> &RemoteTaskApi {
        &self.api
    }

    pub fn validator(&self) -> &XmlResultValidator {
        &self.validator
    }

    /// Read the source and create the remote task.
    pub async fn submit(&self, request: &TaskRequest) -> Result<TaskHandle, TaskError> {
        let payload = source::load_source(
            request.source(),
            self.transport.as_ref(),
            request.transport().socket_timeout,
        )
        .await?;

        let reply = self
            .api
            .submit(request, payload)
            .await
            .map_err(|e| TaskError::RemoteSubmission {
                status_code: e.status_code,
                message: e.message,
            })?;

        info!("Submitted task {} ({})", reply.info.id, reply.info.status);
        self.observer.on_submitted(&reply.info.id);
        Ok(TaskHandle::from_submission(reply.info, reply.status_code))
    }

    /// Poll until the task is terminal or `timeout` has elapsed.
    ///
    /// The first status query always runs, even with a zero timeout. Failed
    /// queries are logged and retried on the next tick. A handle returned
    /// without a terminal status has [`TaskHandle::is_timed_out`] set.
    ///
    /// A `timeout` too large to express as an instant means no deadline.
    pub async fn await_completion(
        &self,
        mut handle: TaskHandle,
        request: &TaskRequest,
        poll_interval: Duration,
        timeout: Duration,
    ) -> TaskHandle {
        if handle.status().is_terminal() {
            return handle;
        }

        let deadline = Instant::now().checked_add(timeout);
        let mut polls = status_stream(
            self.api.clone(),
            request.clone(),
            handle.task_id().to_string(),
            poll_interval,
        );
        let mut first = true;

        loop {
            let next = if first {
                first = false;
                polls.next().await
            } else if let Some(deadline) = deadline {
                match tokio::time::timeout_at(deadline, polls.next()).await {
                    Ok(next) => next,
                    Err(_) => break,
                }
            } else {
                polls.next().await
            };

            match next {
                Some(Ok(reply)) => {
                    handle.advance(reply.info, reply.status_code);
                    debug!("Task {} is {}", handle.task_id(), handle.status());
                    self.observer.on_status(handle.task_id(), handle.status());
                    if handle.status().is_terminal() {
                        return handle;
                    }
                }
                Some(Err(e)) => {
                    handle.record_http_status(e.status_code);
                    let err = TaskError::PollingTransport {
                        task_id: handle.task_id().to_string(),
                        status_code: e.status_code,
                        message: e.message,
                    };
                    warn!("{}", err);
                    self.observer.on_poll_error(handle.task_id(), &err.to_string());
                }
                None => break,
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
        }

        info!(
            "Task {} still {} after {:?}; giving up",
            handle.task_id(),
            handle.status(),
            timeout
        );
        handle.mark_timed_out()
    }

    /// Turn a polled handle into a record, downloading only on completion.
    pub async fn fetch_and_validate(&self, handle: &TaskHandle, request: &TaskRequest) -> ResultRecord {
        match handle.status() {
            TaskStatus::Completed => {}
            status if status.is_terminal() => {
                let err = TaskError::from_terminal_status(handle.task_id(), status).unwrap_or(
                    TaskError::RemoteTaskFailed {
                        task_id: handle.task_id().to_string(),
                    },
                );
                warn!("{}", err);
                return ResultRecord::failure(Some(handle), err);
            }
            _ if handle.is_timed_out() => return ResultRecord::timed_out(handle),
            _ => {
                return ResultRecord::failure(
                    Some(handle),
                    TaskError::NoResultAvailable {
                        task_id: handle.task_id().to_string(),
                    },
                )
            }
        }

        let mut last_status = None;
        match self.download_validated(handle, request, &mut last_status).await {
            Ok(record) => record,
            Err(err) => {
                warn!("Task {}: {}", handle.task_id(), err);
                ResultRecord::failure(Some(handle), err).or_http_status(last_status)
            }
        }
    }

    async fn download_validated(
        &self,
        handle: &TaskHandle,
        request: &TaskRequest,
        last_status: &mut Option<u16>,
    ) -> Result<ResultRecord, TaskError> {
        let format = request.export_format();

        // ── Step 1: Locate the result ────────────────────────────────────
        let mut descriptor = handle.result_descriptor(format);
        let location = descriptor
            .primary()
            .cloned()
            .ok_or_else(|| TaskError::NoResultAvailable {
                task_id: handle.task_id().to_string(),
            })?;

        // ── Step 2: Size check before download ──────────────────────────
        let size = self
            .validator
            .validate_before_download(request, &location)
            .await?;
        *last_status = Some(size.status_code);
        descriptor.advertised_size = size.bytes;

        // ── Step 3: Download ─────────────────────────────────────────────
        let downloaded = self
            .api
            .download(request, &location)
            .await
            .map_err(|e| TaskError::ResultDownload {
                status_code: e.status_code,
                message: e.message,
            })?;
        *last_status = Some(downloaded.status_code);

        let actual = downloaded.bytes.len() as u64;
        if descriptor.advertised_size != Some(actual) {
            warn!(
                "Result is {} bytes but {:?} were advertised; re-checking",
                actual, descriptor.advertised_size
            );
            self.validator.check_size(format, actual)?;
        }

        // ── Step 4: Normalise and validate ───────────────────────────────
        let decoded = clean::decode_result(&downloaded.bytes);
        drop(downloaded.bytes);
        let content = clean::strip_bom(&decoded).to_string();
        self.validator.validate_after_download(&content, format)?;
        self.observer
            .on_result_validated(handle.task_id(), content.len());

        // ── Step 5: Persist ──────────────────────────────────────────────
        let destination = match request.destination() {
            Some(path) => {
                Some(sink::write_destination(path, &content, request.response_charset()).await?)
            }
            None => None,
        };

        Ok(ResultRecord::success(
            handle,
            content,
            destination,
            Some(downloaded.status_code),
        ))
    }

    /// Run the full pipeline for `request` and produce its record.
    pub async fn run(&self, request: &TaskRequest) -> ResultRecord {
        info!("Starting task for source: {}", request.source());

        let record = match self.submit(request).await {
            Ok(handle) => {
                let handle = self
                    .await_completion(handle, request, self.poll.interval, self.poll.timeout)
                    .await;
                self.fetch_and_validate(&handle, request).await
            }
            Err(err) => {
                warn!("{}", err);
                ResultRecord::failure(None, err)
            }
        };

        self.observer.on_complete(record.task_id(), record.succeeded());
        record
    }
}
