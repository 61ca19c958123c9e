//! Pipeline stages around the remote task.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ (submit/poll) ──▶ validate(size) ──▶ (download) ──▶ clean ──▶ validate(schema) ──▶ sink
//! (path/URL)                   (HEAD)                            (BOM)     (quick-xml)          (atomic)
//! ```
//!
//! 1. [`source`]  : read the local file or download the URL to bytes
//! 2. [`validate`]: advertised-size ceiling before download, structural
//!    check after
//! 3. [`clean`]   : BOM and leading-noise removal
//! 4. [`schema`]  : the declarative element grammar used by `validate`
//! 5. [`sink`]    : charset-aware atomic write of the validated content

pub mod clean;
pub mod schema;
pub mod sink;
pub mod source;
pub mod validate;
