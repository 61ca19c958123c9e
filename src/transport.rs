//! HTTP transport seam.
//!
//! The orchestrator never talks to reqwest directly. Every call goes through
//! [`Transport::execute`], which takes a fully described [`HttpRequest`] and
//! returns the status, headers and body. Non-success statuses are *not*
//! errors at this layer; [`TransportError`] only covers the cases where no
//! response was received at all.
//!
//! [`ReqwestTransport`] is the production implementation. Tests swap in
//! scripted transports without touching the network.

use crate::config::TransportSettings;
use crate::error::OcrTaskError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One outbound HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Whole-exchange timeout; `None` uses the client default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response as seen by the API layer.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed `Content-Length` header, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(reqwest::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

/// No response was obtained.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Other { url: String, reason: String },
}

/// Executes HTTP requests. Implementations must be stateless per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client honouring proxy, trust, timeout and pooling settings.
    pub fn from_settings(settings: &TransportSettings) -> Result<Self, OcrTaskError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(settings.connections_max_per_route)
            .user_agent(concat!("cloud-ocr-task/", env!("CARGO_PKG_VERSION")));

        if let Some(connect) = settings.connect_timeout {
            builder = builder.connect_timeout(connect);
        }
        if let Some(socket) = settings.socket_timeout {
            builder = builder.timeout(socket);
        }
        builder = if settings.keep_alive {
            builder.tcp_keepalive(Duration::from_secs(60))
        } else {
            builder.pool_max_idle_per_host(0)
        };

        if let Some(ref proxy) = settings.proxy {
            let mut p = reqwest::Proxy::all(proxy.url())
                .map_err(|e| OcrTaskError::TransportSetup(format!("proxy: {e}")))?;
            if let Some(ref user) = proxy.username {
                p = p.basic_auth(user, proxy.password.as_deref().unwrap_or_default());
            }
            builder = builder.proxy(p);
        }

        if settings.trust_all_roots {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ref bundle) = settings.trust_bundle {
            let pem = std::fs::read(bundle).map_err(|e| {
                OcrTaskError::TransportSetup(format!("trust bundle {}: {e}", bundle.display()))
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                OcrTaskError::TransportSetup(format!("trust bundle {}: {e}", bundle.display()))
            })?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder
            .build()
            .map_err(|e| OcrTaskError::TransportSetup(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.to_string();
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&url, e))?
            .to_vec();

        debug!("{} -> HTTP {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxySettings;
    use reqwest::header::{HeaderValue, CONTENT_LENGTH};

    #[test]
    fn content_length_parses() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("2097152"));
        let resp = HttpResponse {
            status: 200,
            headers,
            body: vec![],
        };
        assert_eq!(resp.content_length(), Some(2_097_152));
        assert!(resp.is_success());
    }

    #[test]
    fn content_length_missing_or_garbage() {
        let mut resp = HttpResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: vec![],
        };
        assert_eq!(resp.content_length(), None);
        resp.headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(resp.content_length(), None);
    }

    #[test]
    fn builds_with_proxy_and_trust_all() {
        let settings = TransportSettings {
            proxy: Some(ProxySettings {
                host: "proxy.local".into(),
                port: 3128,
                username: Some("u".into()),
                password: Some("p".into()),
            }),
            trust_all_roots: true,
            ..TransportSettings::default()
        };
        assert!(ReqwestTransport::from_settings(&settings).is_ok());
    }

    #[test]
    fn missing_trust_bundle_is_setup_error() {
        let settings = TransportSettings {
            trust_bundle: Some("/definitely/not/here.pem".into()),
            ..TransportSettings::default()
        };
        let err = ReqwestTransport::from_settings(&settings).unwrap_err();
        assert!(matches!(err, OcrTaskError::TransportSetup(_)));
    }
}
