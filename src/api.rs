//! Remote task API: submit, status, size and download calls.
//!
//! Stateless wrapper around a shared [`Transport`]. Each method maps one
//! endpoint onto typed results and leaves the decision of *which* task error
//! to raise to the orchestrator, which knows the phase it is in.

use crate::config::TaskRequest;
use crate::params::ExportFormat;
use crate::task::TaskInfo;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::wire;
use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure of a single API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status when a response was received.
    pub status_code: Option<u16>,
    pub message: String,
}

impl ApiError {
    fn no_response(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
        }
    }

    fn from_response(resp: &HttpResponse) -> Self {
        let body = String::from_utf8_lossy(&resp.body);
        let message = wire::parse_error_message(&body).unwrap_or_else(|| {
            let snippet: String = body.trim().chars().take(200).collect();
            if snippet.is_empty() {
                format!("HTTP {}", resp.status)
            } else {
                snippet
            }
        });
        Self {
            status_code: Some(resp.status),
            message,
        }
    }
}

/// Task snapshot plus the HTTP status it arrived with.
#[derive(Debug, Clone)]
pub struct TaskReply {
    pub info: TaskInfo,
    pub status_code: u16,
}

/// Outcome of a size query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSize {
    /// Advertised `Content-Length`, if the response carried a usable one.
    pub bytes: Option<u64>,
    pub status_code: u16,
}

/// Raw result bytes plus the HTTP status they arrived with.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub bytes: Vec<u8>,
    pub status_code: u16,
}

/// Client for the text-field task endpoints.
#[derive(Clone)]
pub struct RemoteTaskApi {
    transport: Arc<dyn Transport>,
}

impl RemoteTaskApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `POST {base}/processTextField?…` with the source payload as body.
    pub async fn submit(&self, request: &TaskRequest, payload: Vec<u8>) -> Result<TaskReply, ApiError> {
        let url = submit_url(request);
        debug!("Submitting {} bytes to {}", payload.len(), url.path());

        let mut http = HttpRequest::new(Method::POST, url)
            .with_body(payload)
            .with_timeout(request.transport().socket_timeout);
        http.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        authorize(&mut http, request)?;

        let resp = self.send(http).await?;
        task_reply(resp)
    }

    /// `GET {base}/getTaskStatus?taskId=…`.
    pub async fn task_status(&self, request: &TaskRequest, task_id: &str) -> Result<TaskReply, ApiError> {
        let mut url = endpoint(request.base_url(), "getTaskStatus");
        url.query_pairs_mut().append_pair("taskId", task_id);

        let mut http =
            HttpRequest::new(Method::GET, url).with_timeout(request.transport().socket_timeout);
        authorize(&mut http, request)?;

        let resp = self.send(http).await?;
        task_reply(resp)
    }

    /// `HEAD {result}`: report the advertised size without fetching the body.
    ///
    /// Result URLs are pre-signed, so no credentials are sent.
    pub async fn result_size(&self, request: &TaskRequest, location: &Url) -> Result<ResultSize, ApiError> {
        let http = HttpRequest::new(Method::HEAD, location.clone())
            .with_timeout(request.transport().socket_timeout);
        let resp = self.send(http).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp));
        }
        Ok(ResultSize {
            bytes: resp.content_length(),
            status_code: resp.status,
        })
    }

    /// `GET {result}`: fetch the raw result bytes.
    pub async fn download(&self, request: &TaskRequest, location: &Url) -> Result<Downloaded, ApiError> {
        let http = HttpRequest::new(Method::GET, location.clone())
            .with_timeout(request.transport().socket_timeout);
        let resp = self.send(http).await?;
        if !resp.is_success() {
            return Err(ApiError::from_response(&resp));
        }
        Ok(Downloaded {
            bytes: resp.body,
            status_code: resp.status,
        })
    }

    async fn send(&self, http: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.transport
            .execute(http)
            .await
            .map_err(|e| ApiError::no_response(e.to_string()))
    }
}

/// Full submission URL including every field parameter that is set.
pub fn submit_url(request: &TaskRequest) -> Url {
    let mut url = endpoint(request.base_url(), "processTextField");
    {
        let mut q = url.query_pairs_mut();
        if let Some(region) = request.region() {
            q.append_pair("region", &region.to_string());
        }
        q.append_pair("language", &request.languages().join(","));
        if let Some(letters) = request.letter_set() {
            q.append_pair("letterSet", letters);
        }
        if let Some(re) = request.reg_exp() {
            q.append_pair("regExp", re);
        }
        if let Some(t) = request.text_type() {
            q.append_pair("textType", t.as_str());
        }
        if request.one_text_line() {
            q.append_pair("oneTextLine", "true");
        }
        if request.one_word_per_text_line() {
            q.append_pair("oneWordPerTextLine", "true");
        }
        if let Some(m) = request.marking_type() {
            q.append_pair("markingType", m.as_str());
        }
        if request.placeholders_count() > 1 {
            q.append_pair("placeholdersCount", &request.placeholders_count().to_string());
        }
        if let Some(w) = request.writing_style() {
            q.append_pair("writingStyle", w.as_str());
        }
        if let Some(d) = request.description() {
            q.append_pair("description", d);
        }
        if let Some(p) = request.pdf_password() {
            q.append_pair("pdfPassword", p);
        }
        // xml is the service default
        if request.export_format() == ExportFormat::Txt {
            q.append_pair("exportFormat", ExportFormat::Txt.as_str());
        }
    }
    url
}

fn endpoint(base: &Url, name: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), name);
    url.set_path(&path);
    url.set_query(None);
    url
}

fn authorize(http: &mut HttpRequest, request: &TaskRequest) -> Result<(), ApiError> {
    let creds = request.credentials();
    let token = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", creds.application_id, creds.password));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|e| ApiError::no_response(format!("authorization header: {e}")))?;
    value.set_sensitive(true);
    http.headers.insert(AUTHORIZATION, value);
    Ok(())
}

fn task_reply(resp: HttpResponse) -> Result<TaskReply, ApiError> {
    if !resp.is_success() {
        return Err(ApiError::from_response(&resp));
    }
    let body = String::from_utf8_lossy(&resp.body);
    let info = wire::parse_task_response(&body).map_err(|e| ApiError {
        status_code: Some(resp.status),
        message: e.to_string(),
    })?;
    Ok(TaskReply {
        info,
        status_code: resp.status,
    })
}
