//! Parsing of the service's XML response envelopes.
//!
//! ```text
//! <response>
//!   <task id="…" status="Queued" credits="1" estimatedProcessingTime="5"
//!         resultUrl="https://…" resultUrl2="https://…"/>
//! </response>
//!
//! <error><message language="english">…</message></error>
//! ```

use crate::task::{TaskInfo, TaskStatus};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Url;
use thiserror::Error;

/// A response body that does not match the expected envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected service response: {0}")]
pub struct WireError(pub String);

/// Extract the first `<task>` element of a `<response>` envelope.
pub fn parse_task_response(body: &str) -> Result<TaskInfo, WireError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"task" => {
                return task_from_element(&e);
            }
            Ok(Event::DocType(_)) => {
                return Err(WireError("DOCTYPE not allowed".into()));
            }
            Ok(Event::Eof) => return Err(WireError("no <task> element".into())),
            Ok(_) => {}
            Err(e) => {
                return Err(WireError(format!(
                    "XML error at position {}: {e}",
                    reader.error_position()
                )))
            }
        }
    }
}

/// Text of `<error><message>` if the body is an error envelope.
pub fn parse_error_message(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut in_message = false;
    let mut message = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"message" => in_message = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"message" => break,
            Ok(Event::Text(t)) if in_message => message.push_str(&t.unescape().ok()?),
            Ok(Event::CData(c)) if in_message => {
                message.push_str(&String::from_utf8_lossy(&c.into_inner()))
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

fn task_from_element(e: &BytesStart<'_>) -> Result<TaskInfo, WireError> {
    let mut id = None;
    let mut status = None;
    let mut credits = None;
    let mut estimated = None;
    let mut urls: Vec<(u32, Url)> = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| WireError(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| WireError(format!("bad value for {key}: {e}")))?
            .into_owned();

        match key.as_str() {
            "id" => id = Some(value),
            "status" => {
                status = Some(
                    TaskStatus::from_wire(&value)
                        .ok_or_else(|| WireError(format!("unknown task status '{value}'")))?,
                )
            }
            "credits" => credits = value.parse().ok(),
            "estimatedProcessingTime" => estimated = value.parse().ok(),
            k if k.starts_with("resultUrl") => {
                let index = match &k["resultUrl".len()..] {
                    "" => 1,
                    n => match n.parse() {
                        Ok(n) => n,
                        Err(_) => continue,
                    },
                };
                if value.is_empty() {
                    continue;
                }
                let url = Url::parse(&value)
                    .map_err(|e| WireError(format!("bad {k} '{value}': {e}")))?;
                urls.push((index, url));
            }
            _ => {}
        }
    }

    urls.sort_by_key(|(i, _)| *i);
    Ok(TaskInfo {
        id: id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WireError("task without id".into()))?,
        status: status.ok_or_else(|| WireError("task without status".into()))?,
        credits,
        estimated_processing_secs: estimated,
        result_urls: urls.into_iter().map(|(_, u)| u).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completed_task() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<response>
  <task id="abc-1" registrationTime="2024-01-01T00:00:00Z" status="Completed"
        filesCount="1" credits="3"
        resultUrl2="https://store/2.txt" resultUrl="https://store/1.xml"/>
</response>"#;
        let info = parse_task_response(body).unwrap();
        assert_eq!(info.id, "abc-1");
        assert_eq!(info.status, TaskStatus::Completed);
        assert_eq!(info.credits, Some(3));
        assert_eq!(info.result_urls.len(), 2);
        assert_eq!(info.result_urls[0].as_str(), "https://store/1.xml");
    }

    #[test]
    fn submitted_maps_to_queued() {
        let info = parse_task_response(
            r#"<response><task id="t" status="Submitted" estimatedProcessingTime="5"/></response>"#,
        )
        .unwrap();
        assert_eq!(info.status, TaskStatus::Queued);
        assert_eq!(info.estimated_processing_secs, Some(5));
        assert!(info.result_urls.is_empty());
    }

    #[test]
    fn unknown_status_is_error() {
        let err = parse_task_response(r#"<response><task id="t" status="Exploded"/></response>"#)
            .unwrap_err();
        assert!(err.to_string().contains("Exploded"));
    }

    #[test]
    fn missing_task_is_error() {
        assert!(parse_task_response("<response/>").is_err());
        assert!(parse_task_response("not xml at all").is_err());
    }

    #[test]
    fn error_envelope_message() {
        let body = r#"<error><message language="english">Invalid application id &amp; password</message></error>"#;
        assert_eq!(
            parse_error_message(body).as_deref(),
            Some("Invalid application id & password")
        );
        assert_eq!(parse_error_message("<response/>"), None);
    }
}
