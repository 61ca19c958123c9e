//! Source resolution: turn the user-supplied path or URL into payload bytes.
//!
//! Remote sources are fetched through the same [`Transport`] as the service
//! calls, so proxy and trust settings apply to them too.

use crate::error::TaskError;
use crate::transport::{HttpRequest, Transport};
use reqwest::{Method, Url};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the source string looks like a URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Read the source payload, downloading it first when it is a URL.
pub async fn load_source(
    source: &str,
    transport: &dyn Transport,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, TaskError> {
    let bytes = if is_url(source) {
        download(source, transport, timeout).await?
    } else {
        read_local(source).await?
    };

    if bytes.is_empty() {
        return Err(unreadable(source, "source is empty"));
    }
    Ok(bytes)
}

async fn read_local(source: &str) -> Result<Vec<u8>, TaskError> {
    let path = Path::new(source);
    let bytes = tokio::fs::read(path).await.map_err(|e| unreadable(source, e))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

async fn download(
    source: &str,
    transport: &dyn Transport,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, TaskError> {
    info!("Downloading source from: {}", source);
    let url = Url::parse(source).map_err(|e| unreadable(source, e))?;
    let resp = transport
        .execute(HttpRequest::new(Method::GET, url).with_timeout(timeout))
        .await
        .map_err(|e| unreadable(source, e))?;
    if !resp.is_success() {
        return Err(unreadable(source, format!("HTTP {}", resp.status)));
    }
    Ok(resp.body)
}

fn unreadable(source: &str, detail: impl ToString) -> TaskError {
    TaskError::SourceUnreadable {
        source_ref: source.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, TransportError};
    use async_trait::async_trait;

    struct Fixed(u16, &'static [u8]);

    #[async_trait]
    impl Transport for Fixed {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: self.0,
                headers: Default::default(),
                body: self.1.to_vec(),
            })
        }
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/scan.png"));
        assert!(is_url("http://example.com/scan.png"));
        assert!(!is_url("/tmp/scan.png"));
        assert!(!is_url("scan.png"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn local_file_read() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut tmp, b"PNGDATA").unwrap();
        let path = tmp.path().to_string_lossy().to_string();
        let bytes = load_source(&path, &Fixed(500, b""), None).await.unwrap();
        assert_eq!(bytes, b"PNGDATA");
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let err = load_source("/no/such/scan.png", &Fixed(200, b"x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::SourceUnreadable { .. }));
    }

    #[tokio::test]
    async fn url_source_uses_transport() {
        let ok = load_source("https://host/scan.png", &Fixed(200, b"IMG"), None)
            .await
            .unwrap();
        assert_eq!(ok, b"IMG");
        let err = load_source("https://host/scan.png", &Fixed(404, b"nope"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn empty_payload_rejected() {
        let err = load_source("https://host/empty", &Fixed(200, b""), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
