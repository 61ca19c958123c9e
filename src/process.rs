//! Top-level entry points.
//!
//! These build the production transport from the request's settings, run
//! the whole pipeline and hand back the record. Use
//! [`crate::orchestrator::TaskOrchestrator`] directly to plug in a custom
//! [`Transport`] or to drive the steps one at a time.

use crate::config::{RunOptions, TaskRequest};
use crate::error::OcrTaskError;
use crate::orchestrator::TaskOrchestrator;
use crate::output::ResultRecord;
use crate::transport::{ReqwestTransport, Transport};
use std::sync::Arc;

/// Recognise one text field with default run options.
///
/// # Errors
/// Returns `Err(OcrTaskError)` only when the run cannot start at all
/// (unusable schema, HTTP client setup failure). Every remote or validation
/// failure is reported inside the returned [`ResultRecord`].
pub async fn process_text_field(request: &TaskRequest) -> Result<ResultRecord, OcrTaskError> {
    process_text_field_with(request, &RunOptions::default()).await
}

/// Recognise one text field with explicit run options.
pub async fn process_text_field_with(
    request: &TaskRequest,
    options: &RunOptions,
) -> Result<ResultRecord, OcrTaskError> {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::from_settings(request.transport())?);
    let orchestrator = TaskOrchestrator::new(transport, options)?;
    Ok(orchestrator.run(request).await)
}

/// Synchronous wrapper around [`process_text_field_with`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_text_field_sync(
    request: &TaskRequest,
    options: &RunOptions,
) -> Result<ResultRecord, OcrTaskError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrTaskError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_text_field_with(request, options))
}
