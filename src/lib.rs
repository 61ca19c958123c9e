//! # cloud-ocr-task
//!
//! Submit field-level OCR work to a cloud OCR service, poll it to
//! completion and fetch the result safely.
//!
//! ## Why this crate?
//!
//! A recognition task is long-running and paid for. The result comes back as
//! a URL to an XML document produced by a remote party. This crate wraps
//! the lifecycle so a caller gets exactly one well-formed record per
//! request, whatever happens on the wire. The result is size-checked before
//! it is downloaded and parsed without any DTD or entity expansion.
//!
//! ## Pipeline Overview
//!
//! ```text
//! TaskRequest
//!  │
//!  ├─ 1. Source    read local file or download from URL
//!  ├─ 2. Submit    POST processTextField (Basic auth)
//!  ├─ 3. Poll      getTaskStatus every interval until terminal or timeout
//!  ├─ 4. Size      HEAD result URL; reject above 2 MiB
//!  ├─ 5. Download  GET result URL; re-check if length differs
//!  ├─ 6. Validate  BOM strip, hardened XML parse, schema check
//!  └─ 7. Output    optional atomic write + ResultRecord
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloud_ocr_task::{process_text_field, TaskRequest, TextType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = TaskRequest::builder()
//!         .application_id("my-app")
//!         .password("secret")
//!         .source("zip-code.png")
//!         .text_type(TextType::Handprinted)
//!         .destination("zip-code.xml")
//!         .build()?;
//!     let record = process_text_field(&request).await?;
//!     if record.succeeded() {
//!         println!("{}", record.content());
//!     } else {
//!         eprintln!("{:?}", record.error());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cloud-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cloud-ocr-task = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod stream;
pub mod task;
pub mod transport;
pub mod wire;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{ApiError, RemoteTaskApi, ResultSize};
pub use config::{
    Credentials, PollPolicy, ProxySettings, RunOptions, TaskRequest, TaskRequestBuilder,
    TransportSettings,
};
pub use error::{OcrTaskError, TaskError, ValidationError};
pub use orchestrator::TaskOrchestrator;
pub use output::ResultRecord;
pub use params::{ExportFormat, LocationId, MarkingType, Region, TextType, WritingStyle};
pub use pipeline::schema::Schema;
pub use pipeline::validate::{XmlResultValidator, MAX_RESULT_SIZE};
pub use process::{process_text_field, process_text_field_sync, process_text_field_with};
pub use progress::{NoopObserver, ObserverHandle, TaskObserver};
pub use stream::{status_stream, StatusStream};
pub use task::{ResultDescriptor, TaskHandle, TaskInfo, TaskStatus};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
