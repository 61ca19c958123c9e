//! Result validation before and after download.
//!
//! ## Before download
//!
//! A `HEAD` on the result location yields the advertised size. Results above
//! [`MAX_RESULT_SIZE`] (or the configured ceiling) are rejected without
//! fetching the body. A size of exactly the ceiling passes. A failed size
//! query or a response without a usable `Content-Length` is also a
//! rejection, since the size cannot be proven safe.
//!
//! ## After download
//!
//! Structured results are parsed with quick-xml, which never expands DTD
//! entities. On top of that:
//!
//! - any `<!DOCTYPE …>` is refused outright
//! - text and attribute values are unescaped, so references to undeclared
//!   entities fail
//! - elements are checked against a [`Schema`]

use crate::api::{RemoteTaskApi, ResultSize};
use crate::config::TaskRequest;
use crate::error::ValidationError;
use crate::params::ExportFormat;
use crate::pipeline::clean;
use crate::pipeline::schema::{ElementRule, Schema};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Largest result accepted for download, in bytes (2 MiB).
pub const MAX_RESULT_SIZE: u64 = 2_097_152;

/// Size and structure checks for downloaded results.
#[derive(Clone)]
pub struct XmlResultValidator {
    api: RemoteTaskApi,
    schema: Arc<Schema>,
    max_size: u64,
}

impl XmlResultValidator {
    pub fn new(api: RemoteTaskApi, schema: Arc<Schema>) -> Self {
        Self {
            api,
            schema,
            max_size: MAX_RESULT_SIZE,
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Query the advertised size of `location` and check it against the
    /// ceiling.
    pub async fn validate_before_download(
        &self,
        request: &TaskRequest,
        location: &Url,
    ) -> Result<ResultSize, ValidationError> {
        let format = request.export_format();
        let size = self
            .api
            .result_size(request, location)
            .await
            .map_err(|e| ValidationError::SizeUnavailable {
                format,
                status_code: e.status_code,
                detail: e.to_string(),
            })?;

        let bytes = size.bytes.ok_or_else(|| {
            warn!("No usable Content-Length for {}", location);
            ValidationError::SizeUnavailable {
                format,
                status_code: Some(size.status_code),
                detail: "response carried no Content-Length".into(),
            }
        })?;
        self.check_size(format, bytes)?;
        debug!("Result size {} bytes within {} limit", bytes, self.max_size);
        Ok(size)
    }

    /// Reject sizes strictly above the ceiling.
    pub fn check_size(&self, format: ExportFormat, size: u64) -> Result<(), ValidationError> {
        if size > self.max_size {
            return Err(ValidationError::TooLarge {
                format,
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Structural check of downloaded content. Empty content passes and a
    /// leading byte-order mark is ignored.
    pub fn validate_after_download(
        &self,
        content: &str,
        format: ExportFormat,
    ) -> Result<(), ValidationError> {
        if content.trim().is_empty() || !format.is_structured() {
            return Ok(());
        }
        let cleaned = clean::strip_leading_noise(clean::strip_bom(content));
        validate_xml(&cleaned, &self.schema)
    }
}

// ── XML walk ─────────────────────────────────────────────────────────────────

struct Frame<'s> {
    name: String,
    rule: &'s ElementRule,
    counts: HashMap<String, u32>,
}

/// Parse `xml` and check it against `schema`.
pub fn validate_xml(xml: &str, schema: &Schema) -> Result<(), ValidationError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame<'_>> = Vec::new();
    let mut root_seen = false;

    loop {
        let pos = reader.buffer_position();
        let at = |msg: String| ValidationError::Malformed(format!("at byte {pos}: {msg}"));

        let event = reader.read_event().map_err(|e| {
            ValidationError::Malformed(format!(
                "at byte {}: {e}",
                reader.error_position()
            ))
        })?;

        match event {
            Event::DocType(_) => return Err(at("DOCTYPE declarations are not allowed".into())),
            Event::Start(e) => {
                let frame = open_element(&e, schema, &mut stack, &mut root_seen).map_err(at)?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                let frame = open_element(&e, schema, &mut stack, &mut root_seen).map_err(at)?;
                close_element(frame).map_err(at)?;
            }
            Event::End(e) => {
                let name = local_name(e.local_name().as_ref());
                let frame = stack
                    .pop()
                    .ok_or_else(|| at(format!("unexpected closing tag </{name}>")))?;
                if frame.name != name {
                    return Err(at(format!(
                        "closing tag </{name}> does not match <{}>",
                        frame.name
                    )));
                }
                close_element(frame).map_err(at)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| at(e.to_string()))?;
                check_text(&text, &stack).map_err(at)?;
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                check_text(&String::from_utf8_lossy(&raw), &stack).map_err(at)?;
            }
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) => {}
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(at(format!("element <{}> is not closed", open.name)));
                }
                if !root_seen {
                    return Err(at("document has no root element".into()));
                }
                return Ok(());
            }
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn open_element<'s>(
    e: &BytesStart<'_>,
    schema: &'s Schema,
    stack: &mut [Frame<'s>],
    root_seen: &mut bool,
) -> Result<Frame<'s>, String> {
    let name = local_name(e.local_name().as_ref());

    match stack.last_mut() {
        None => {
            if *root_seen {
                return Err(format!("second root element <{name}>"));
            }
            if name != schema.root {
                return Err(format!(
                    "root element is <{name}>, expected <{}>",
                    schema.root
                ));
            }
            *root_seen = true;
        }
        Some(parent) => {
            let occ = parent.rule.children.get(&name).ok_or_else(|| {
                format!("element <{name}> is not allowed inside <{}>", parent.name)
            })?;
            let count = parent.counts.entry(name.clone()).or_insert(0);
            *count += 1;
            if occ.max.is_some_and(|max| *count > max) {
                return Err(format!(
                    "<{}> allows at most {} <{name}> element(s)",
                    parent.name,
                    occ.max.unwrap_or_default()
                ));
            }
        }
    }

    let rule = schema
        .element(&name)
        .ok_or_else(|| format!("element <{name}> is not declared"))?;
    check_attributes(e, &name, rule)?;

    Ok(Frame {
        name,
        rule,
        counts: HashMap::new(),
    })
}

fn check_attributes(e: &BytesStart<'_>, element: &str, rule: &ElementRule) -> Result<(), String> {
    let mut seen: Vec<String> = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("bad attribute on <{element}>: {err}"))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = local_name(attr.key.local_name().as_ref());
        let value = attr
            .unescape_value()
            .map_err(|err| format!("attribute '{key}' on <{element}>: {err}"))?;

        match rule.attributes.get(&key) {
            Some(a) if !a.kind.accepts(&value) => {
                return Err(format!(
                    "attribute '{key}' on <{element}> is not a valid {:?}: '{value}'",
                    a.kind
                ));
            }
            Some(_) => {}
            None if rule.open_attributes => {}
            None => return Err(format!("attribute '{key}' is not allowed on <{element}>")),
        }
        seen.push(key);
    }

    for (name, a) in &rule.attributes {
        if a.required && !seen.iter().any(|s| s == name) {
            return Err(format!("<{element}> is missing required attribute '{name}'"));
        }
    }
    Ok(())
}

fn close_element(frame: Frame<'_>) -> Result<(), String> {
    for (child, occ) in &frame.rule.children {
        let n = frame.counts.get(child).copied().unwrap_or(0);
        if n < occ.min {
            return Err(format!(
                "<{}> needs at least {} <{child}> element(s), found {n}",
                frame.name, occ.min
            ));
        }
    }
    Ok(())
}

fn check_text(text: &str, stack: &[Frame<'_>]) -> Result<(), String> {
    if text.trim().is_empty() {
        return Ok(());
    }
    match stack.last() {
        None => Err("character data outside the root element".into()),
        Some(frame) if !frame.rule.text => {
            Err(format!("<{}> does not allow character data", frame.name))
        }
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
    use async_trait::async_trait;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};

    const GOOD: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<document xmlns="http://ocrsdk.com/schema/recognizedField-1.0.xsd" version="1.0" producer="svc">
  <field left="0" top="0" right="120" bottom="40" type="text">
    <value encoding="utf-16">AB &amp; 12</value>
    <line left="0" top="0" right="120" bottom="40">
      <char left="0" top="0" right="10" bottom="40" suspicious="false">A</char>
      <char left="10" top="0" right="20" bottom="40">B</char>
    </line>
  </field>
</document>"#;

    fn schema() -> Schema {
        Schema::text_field().unwrap()
    }

    fn malformed(xml: &str) -> String {
        match validate_xml(xml, &schema()) {
            Err(ValidationError::Malformed(m)) => m,
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn well_formed_result_passes() {
        validate_xml(GOOD, &schema()).unwrap();
    }

    #[test]
    fn doctype_rejected() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE document [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<document><field left="0" top="0" right="1" bottom="1"><value>&xxe;</value></field></document>"#;
        assert!(malformed(xml).contains("DOCTYPE"));
    }

    #[test]
    fn undefined_entity_rejected() {
        let xml = r#"<document><field left="0" top="0" right="1" bottom="1"><value>&ext;</value></field></document>"#;
        malformed(xml);
    }

    #[test]
    fn mismatched_tag_rejected() {
        let xml = r#"<document><field left="0" top="0" right="1" bottom="1"><value>x</line></field></document>"#;
        malformed(xml);
    }

    #[test]
    fn unclosed_root_rejected() {
        let xml = r#"<document><field left="0" top="0" right="1" bottom="1"><value>x</value></field>"#;
        malformed(xml);
    }

    #[test]
    fn wrong_root_rejected() {
        assert!(malformed("<root/>").contains("expected <document>"));
    }

    #[test]
    fn missing_required_attribute() {
        let xml = r#"<document><field left="0" top="0" right="1"><value>x</value></field></document>"#;
        assert!(malformed(xml).contains("bottom"));
    }

    #[test]
    fn non_integer_attribute() {
        let xml = r#"<document><field left="a" top="0" right="1" bottom="1"><value>x</value></field></document>"#;
        assert!(malformed(xml).contains("left"));
    }

    #[test]
    fn unknown_child_and_cardinality() {
        let xml = r#"<document><field left="0" top="0" right="1" bottom="1"><value>x</value><value>y</value></field></document>"#;
        assert!(malformed(xml).contains("at most 1"));
        let xml = r#"<document><field left="0" top="0" right="1" bottom="1"><value>x</value><blob/></field></document>"#;
        assert!(malformed(xml).contains("blob"));
        assert!(malformed("<document/>").contains("at least 1"));
    }

    #[test]
    fn text_where_not_allowed() {
        let xml = r#"<document>stray<field left="0" top="0" right="1" bottom="1"><value>x</value></field></document>"#;
        assert!(malformed(xml).contains("character data"));
    }

    #[test]
    fn second_root_rejected() {
        let one = r#"<document><field left="0" top="0" right="1" bottom="1"><value/></field></document>"#;
        assert!(malformed(&format!("{one}{one}")).contains("second root"));
    }

    /// Answers every request with an empty 200 carrying `Content-Length`.
    struct Head(Option<u64>);

    #[async_trait]
    impl Transport for Head {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut headers = HeaderMap::new();
            if let Some(len) = self.0 {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
            Ok(HttpResponse {
                status: 200,
                headers,
                body: vec![],
            })
        }
    }

    fn validator(len: Option<u64>) -> XmlResultValidator {
        XmlResultValidator::new(RemoteTaskApi::new(Arc::new(Head(len))), Arc::new(schema()))
    }

    fn request() -> TaskRequest {
        TaskRequest::builder()
            .application_id("app")
            .source("field.png")
            .build()
            .unwrap()
    }

    fn location() -> Url {
        Url::parse("http://store.test/result.xml").unwrap()
    }

    #[test]
    fn size_boundary() {
        let v = validator(None);
        v.check_size(ExportFormat::Xml, MAX_RESULT_SIZE).unwrap();
        assert_eq!(
            v.check_size(ExportFormat::Xml, MAX_RESULT_SIZE + 1),
            Err(ValidationError::TooLarge {
                format: ExportFormat::Xml,
                size: MAX_RESULT_SIZE + 1,
                max: MAX_RESULT_SIZE,
            })
        );
    }

    #[tokio::test]
    async fn advertised_size_one_over_limit_rejected() {
        let err = validator(Some(MAX_RESULT_SIZE + 1))
            .validate_before_download(&request(), &location())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { size, .. } if size == MAX_RESULT_SIZE + 1));

        let ok = validator(Some(MAX_RESULT_SIZE))
            .validate_before_download(&request(), &location())
            .await
            .unwrap();
        assert_eq!(ok.bytes, Some(MAX_RESULT_SIZE));
    }

    #[tokio::test]
    async fn missing_length_keeps_head_status() {
        let err = validator(None)
            .validate_before_download(&request(), &location())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::SizeUnavailable {
                status_code: Some(200),
                ..
            }
        ));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let v = validator(None);
        v.validate_after_download(&format!("\u{FEFF}{GOOD}"), ExportFormat::Xml)
            .unwrap();
        assert_eq!(
            v.validate_after_download("\u{FEFF}<root/>", ExportFormat::Xml),
            v.validate_after_download("<root/>", ExportFormat::Xml),
        );
    }

    #[test]
    fn empty_content_passes() {
        let v = validator(None);
        v.validate_after_download("", ExportFormat::Xml).unwrap();
        v.validate_after_download("  \n", ExportFormat::Xml).unwrap();
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(malformed("<?xml version=\"1.0\"?>").contains("no root"));
    }
}
