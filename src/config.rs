//! Request and run configuration.
//!
//! A [`TaskRequest`] describes one unit of remote work and is only obtainable
//! through [`TaskRequestBuilder::build`], which validates every field and
//! every cross-field combination up front. Once built it is immutable.
//!
//! [`RunOptions`] holds the knobs that belong to the orchestration rather
//! than to the request: poll spacing, the overall timeout, the result size
//! ceiling and an optional observer.

use crate::error::OcrTaskError;
use crate::params::{ExportFormat, LocationId, MarkingType, Region, TextType, WritingStyle};
use crate::pipeline::validate::MAX_RESULT_SIZE;
use crate::progress::ObserverHandle;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Account credentials sent as HTTP Basic auth on service calls.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub application_id: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("application_id", &self.application_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outbound HTTP proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProxySettings {
    /// Proxy URL understood by the HTTP client.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Connection-level settings for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// TCP connect timeout. `None` waits indefinitely. Default: 10 s.
    pub connect_timeout: Option<Duration>,

    /// Per-request timeout covering the full exchange. `None` waits
    /// indefinitely. Default: 60 s.
    pub socket_timeout: Option<Duration>,

    /// Send TCP keep-alive probes on pooled connections. Default: true.
    pub keep_alive: bool,

    /// Idle pooled connections kept per host. Default: 2.
    pub connections_max_per_route: usize,

    pub proxy: Option<ProxySettings>,

    /// Accept any server certificate. Mutually exclusive with `trust_bundle`.
    pub trust_all_roots: bool,

    /// PEM file with additional trusted root certificates.
    pub trust_bundle: Option<PathBuf>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            socket_timeout: Some(Duration::from_secs(60)),
            keep_alive: true,
            connections_max_per_route: 2,
            proxy: None,
            trust_all_roots: false,
            trust_bundle: None,
        }
    }
}

/// Immutable description of one text-field recognition task.
///
/// Built via [`TaskRequest::builder()`].
///
/// # Example
/// ```rust
/// use cloud_ocr_task::{TaskRequest, TextType};
///
/// let request = TaskRequest::builder()
///     .application_id("my-app")
///     .password("secret")
///     .source("field.png")
///     .languages(["English", "German"])
///     .text_type(TextType::Handprinted)
///     .build()
///     .unwrap();
/// assert_eq!(request.languages(), ["English", "German"]);
/// ```
#[derive(Clone)]
pub struct TaskRequest {
    source: String,
    destination: Option<PathBuf>,
    response_charset: &'static encoding_rs::Encoding,
    export_format: ExportFormat,
    region: Option<Region>,
    languages: Vec<String>,
    letter_set: Option<String>,
    reg_exp: Option<String>,
    text_type: Option<TextType>,
    one_text_line: bool,
    one_word_per_text_line: bool,
    marking_type: Option<MarkingType>,
    placeholders_count: u32,
    writing_style: Option<WritingStyle>,
    description: Option<String>,
    pdf_password: Option<String>,
    base_url: Url,
    credentials: Credentials,
    transport: TransportSettings,
}

impl fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("response_charset", &self.response_charset.name())
            .field("export_format", &self.export_format)
            .field("region", &self.region)
            .field("languages", &self.languages)
            .field("letter_set", &self.letter_set)
            .field("reg_exp", &self.reg_exp)
            .field("text_type", &self.text_type)
            .field("one_text_line", &self.one_text_line)
            .field("one_word_per_text_line", &self.one_word_per_text_line)
            .field("marking_type", &self.marking_type)
            .field("placeholders_count", &self.placeholders_count)
            .field("writing_style", &self.writing_style)
            .field("description", &self.description)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &self.credentials)
            .field("transport", &self.transport)
            .finish()
    }
}

impl TaskRequest {
    /// Create a new builder for `TaskRequest`.
    pub fn builder() -> TaskRequestBuilder {
        TaskRequestBuilder::default()
    }

    /// Local path or HTTP(S) URL of the image/PDF to recognise.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Character set used when writing the destination file.
    pub fn response_charset(&self) -> &'static encoding_rs::Encoding {
        self.response_charset
    }

    pub fn export_format(&self) -> ExportFormat {
        self.export_format
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn letter_set(&self) -> Option<&str> {
        self.letter_set.as_deref()
    }

    pub fn reg_exp(&self) -> Option<&str> {
        self.reg_exp.as_deref()
    }

    pub fn text_type(&self) -> Option<TextType> {
        self.text_type
    }

    pub fn one_text_line(&self) -> bool {
        self.one_text_line
    }

    pub fn one_word_per_text_line(&self) -> bool {
        self.one_word_per_text_line
    }

    pub fn marking_type(&self) -> Option<MarkingType> {
        self.marking_type
    }

    pub fn placeholders_count(&self) -> u32 {
        self.placeholders_count
    }

    pub fn writing_style(&self) -> Option<WritingStyle> {
        self.writing_style
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn pdf_password(&self) -> Option<&str> {
        self.pdf_password.as_deref()
    }

    /// Service root, e.g. `https://cloud-eu.ocrsdk.com`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn transport(&self) -> &TransportSettings {
        &self.transport
    }
}

/// Builder for [`TaskRequest`].
#[derive(Clone)]
pub struct TaskRequestBuilder {
    source: Option<String>,
    destination: Option<PathBuf>,
    response_charset: String,
    export_format: ExportFormat,
    region: Option<Region>,
    languages: Vec<String>,
    letter_set: Option<String>,
    reg_exp: Option<String>,
    text_type: Option<TextType>,
    one_text_line: bool,
    one_word_per_text_line: bool,
    marking_type: Option<MarkingType>,
    placeholders_count: u32,
    writing_style: Option<WritingStyle>,
    description: Option<String>,
    pdf_password: Option<String>,
    location: LocationId,
    base_url: Option<String>,
    credentials: Credentials,
    transport: TransportSettings,
}

impl fmt::Debug for TaskRequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequestBuilder")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("export_format", &self.export_format)
            .field("languages", &self.languages)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field("location", &self.location)
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Default for TaskRequestBuilder {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            response_charset: "utf-8".to_string(),
            export_format: ExportFormat::default(),
            region: None,
            languages: vec!["English".to_string()],
            letter_set: None,
            reg_exp: None,
            text_type: None,
            one_text_line: false,
            one_word_per_text_line: false,
            marking_type: None,
            placeholders_count: 1,
            writing_style: None,
            description: None,
            pdf_password: None,
            location: LocationId::default(),
            base_url: None,
            credentials: Credentials::default(),
            transport: TransportSettings::default(),
        }
    }
}

impl TaskRequestBuilder {
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    /// Character-set label, e.g. `utf-8`, `utf-16le`, `windows-1252`.
    pub fn response_charset(mut self, label: impl Into<String>) -> Self {
        self.response_charset = label.into();
        self
    }

    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.export_format = format;
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn letter_set(mut self, letters: impl Into<String>) -> Self {
        self.letter_set = Some(letters.into());
        self
    }

    pub fn reg_exp(mut self, re: impl Into<String>) -> Self {
        self.reg_exp = Some(re.into());
        self
    }

    pub fn text_type(mut self, t: TextType) -> Self {
        self.text_type = Some(t);
        self
    }

    pub fn one_text_line(mut self, v: bool) -> Self {
        self.one_text_line = v;
        self
    }

    pub fn one_word_per_text_line(mut self, v: bool) -> Self {
        self.one_word_per_text_line = v;
        self
    }

    pub fn marking_type(mut self, m: MarkingType) -> Self {
        self.marking_type = Some(m);
        self
    }

    pub fn placeholders_count(mut self, n: u32) -> Self {
        self.placeholders_count = n;
        self
    }

    pub fn writing_style(mut self, w: WritingStyle) -> Self {
        self.writing_style = Some(w);
        self
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.pdf_password = Some(pwd.into());
        self
    }

    pub fn location(mut self, location: LocationId) -> Self {
        self.location = location;
        self
    }

    /// Override the service root derived from the location.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn application_id(mut self, id: impl Into<String>) -> Self {
        self.credentials.application_id = id.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.credentials.password = pwd.into();
        self
    }

    /// Connect timeout in seconds; `0` disables it.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.transport.connect_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Per-request timeout in seconds; `0` disables it.
    pub fn socket_timeout_secs(mut self, secs: u64) -> Self {
        self.transport.socket_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn keep_alive(mut self, v: bool) -> Self {
        self.transport.keep_alive = v;
        self
    }

    pub fn connections_max_per_route(mut self, n: usize) -> Self {
        self.transport.connections_max_per_route = n;
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.transport.proxy = Some(proxy);
        self
    }

    pub fn trust_all_roots(mut self, v: bool) -> Self {
        self.transport.trust_all_roots = v;
        self
    }

    pub fn trust_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport.trust_bundle = Some(path.into());
        self
    }

    /// Build the request, validating constraints.
    pub fn build(self) -> Result<TaskRequest, OcrTaskError> {
        let source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| OcrTaskError::InvalidRequest("source is required".into()))?;

        if self.credentials.application_id.trim().is_empty() {
            return Err(OcrTaskError::InvalidRequest(
                "application id is required".into(),
            ));
        }

        let languages: Vec<String> = self
            .languages
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if languages.is_empty() {
            return Err(OcrTaskError::InvalidRequest(
                "at least one recognition language is required".into(),
            ));
        }

        let response_charset = encoding_rs::Encoding::for_label(
            self.response_charset.trim().as_bytes(),
        )
        .ok_or_else(|| OcrTaskError::InvalidParameter {
            field: "responseCharacterSet",
            value: self.response_charset.clone(),
        })?;

        if self.placeholders_count == 0 {
            return Err(OcrTaskError::InvalidRequest(
                "placeholders count must be ≥ 1".into(),
            ));
        }
        if self.placeholders_count > 1 && !self.marking_type.is_some_and(|m| m.has_cells()) {
            return Err(OcrTaskError::InvalidRequest(format!(
                "placeholders count {} requires a cell-based marking type",
                self.placeholders_count
            )));
        }

        if self.transport.trust_all_roots && self.transport.trust_bundle.is_some() {
            return Err(OcrTaskError::InvalidRequest(
                "trust-all-roots and a trust bundle are mutually exclusive".into(),
            ));
        }
        if let Some(ref proxy) = self.transport.proxy {
            if proxy.host.trim().is_empty() {
                return Err(OcrTaskError::InvalidRequest("proxy host is empty".into()));
            }
            if proxy.password.is_some() && proxy.username.is_none() {
                return Err(OcrTaskError::InvalidRequest(
                    "proxy password given without a proxy username".into(),
                ));
            }
        }

        let base = self
            .base_url
            .unwrap_or_else(|| self.location.base_url());
        let base_url = Url::parse(&base).map_err(|e| OcrTaskError::InvalidParameter {
            field: "baseUrl",
            value: format!("{base} ({e})"),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(OcrTaskError::InvalidRequest(format!(
                "base URL must be http or https, got '{base}'"
            )));
        }

        Ok(TaskRequest {
            source,
            destination: self.destination,
            response_charset,
            export_format: self.export_format,
            region: self.region,
            languages,
            letter_set: self.letter_set.filter(|s| !s.is_empty()),
            reg_exp: self.reg_exp.filter(|s| !s.is_empty()),
            text_type: self.text_type,
            one_text_line: self.one_text_line,
            one_word_per_text_line: self.one_word_per_text_line,
            marking_type: self.marking_type,
            placeholders_count: self.placeholders_count,
            writing_style: self.writing_style,
            description: self.description.filter(|s| !s.is_empty()),
            pdf_password: self.pdf_password.filter(|s| !s.is_empty()),
            base_url,
            credentials: self.credentials,
            transport: self.transport,
        })
    }
}

/// Poll spacing and overall bound for [`crate::TaskOrchestrator::await_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between status queries. Default: 2 s.
    pub interval: Duration,

    /// Give up after this long and report `timed_out`. Default: 10 min.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Orchestration knobs that are not part of the request itself.
#[derive(Clone)]
pub struct RunOptions {
    pub poll: PollPolicy,

    /// Ceiling on the advertised result size. Default: [`MAX_RESULT_SIZE`].
    pub max_result_size: u64,

    /// JSON schema file replacing the built-in text-field schema.
    pub schema_path: Option<PathBuf>,

    pub observer: Option<ObserverHandle>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            max_result_size: MAX_RESULT_SIZE,
            schema_path: None,
            observer: None,
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("poll", &self.poll)
            .field("max_result_size", &self.max_result_size)
            .field("schema_path", &self.schema_path)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn TaskObserver>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> TaskRequestBuilder {
        TaskRequest::builder().application_id("app").source("scan.png")
    }

    #[test]
    fn defaults_build() {
        let r = minimal().build().unwrap();
        assert_eq!(r.languages(), ["English"]);
        assert_eq!(r.response_charset(), encoding_rs::UTF_8);
        assert_eq!(r.base_url().as_str(), "https://cloud-eu.ocrsdk.com/");
        assert_eq!(r.placeholders_count(), 1);
        assert_eq!(r.export_format(), ExportFormat::Xml);
    }

    #[test]
    fn missing_source_fails() {
        let err = TaskRequest::builder().application_id("app").build().unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn missing_application_id_fails() {
        assert!(TaskRequest::builder().source("a.png").build().is_err());
    }

    #[test]
    fn blank_languages_fail() {
        assert!(minimal().languages([" ", ""]).build().is_err());
    }

    #[test]
    fn unknown_charset_fails() {
        let err = minimal().response_charset("klingon-8").build().unwrap_err();
        assert!(err.to_string().contains("responseCharacterSet"), "got: {err}");
    }

    #[test]
    fn placeholders_need_cells() {
        assert!(minimal().placeholders_count(5).build().is_err());
        assert!(minimal()
            .placeholders_count(5)
            .marking_type(MarkingType::SimpleComb)
            .build()
            .is_ok());
    }

    #[test]
    fn conflicting_trust_policy_fails() {
        let err = minimal()
            .trust_all_roots(true)
            .trust_bundle("/etc/ssl/extra.pem")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn proxy_password_without_user_fails() {
        let proxy = ProxySettings {
            host: "proxy.local".into(),
            port: 8080,
            username: None,
            password: Some("x".into()),
        };
        assert!(minimal().proxy(proxy).build().is_err());
    }

    #[test]
    fn base_url_override() {
        let r = minimal().base_url("http://127.0.0.1:9000").build().unwrap();
        assert_eq!(r.base_url().as_str(), "http://127.0.0.1:9000/");
        assert!(minimal().base_url("ftp://x").build().is_err());
        assert!(minimal().base_url("not a url").build().is_err());
    }

    #[test]
    fn zero_timeouts_disable() {
        let r = minimal().connect_timeout_secs(0).socket_timeout_secs(5).build().unwrap();
        assert_eq!(r.transport().connect_timeout, None);
        assert_eq!(r.transport().socket_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn debug_redacts_password() {
        let r = minimal().password("hunter2").build().unwrap();
        assert!(!format!("{r:?}").contains("hunter2"));
    }

    #[test]
    fn debug_redacts_pdf_password() {
        assert!(!format!("{:?}", minimal().pdf_password("open-sesame")).contains("open-sesame"));
        let r = minimal().pdf_password("open-sesame").build().unwrap();
        let shown = format!("{r:?}");
        assert!(!shown.contains("open-sesame"));
        assert!(shown.contains("pdf_password: Some(\"<redacted>\")"));
    }
}
