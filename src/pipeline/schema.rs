//! Declarative result schema.
//!
//! A schema names the root element and, for each element, its attributes
//! (typed, optionally required), the children it may contain with occurrence
//! bounds, and whether character data is allowed. It is stored as JSON; the
//! text-field schema is compiled into the binary from
//! `schemas/text_field.json`.
//!
//! ```json
//! {
//!   "name": "example",
//!   "root": "doc",
//!   "elements": {
//!     "doc":  { "children": { "item": { "min": 1 } } },
//!     "item": { "text": true, "attributes": { "n": { "type": "integer", "required": true } } }
//!   }
//! }
//! ```

use crate::error::OcrTaskError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const TEXT_FIELD_SCHEMA: &str = include_str!("../../schemas/text_field.json");

/// Element grammar for one result format.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Schema {
    pub name: String,
    pub root: String,
    pub elements: BTreeMap<String, ElementRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ElementRule {
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeRule>,
    #[serde(default)]
    pub children: BTreeMap<String, Occurrence>,
    /// Non-whitespace character data is allowed.
    #[serde(default)]
    pub text: bool,
    /// Attributes not listed are accepted.
    #[serde(default)]
    pub open_attributes: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeRule {
    #[serde(rename = "type", default)]
    pub kind: AttributeType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Integer,
    Boolean,
}

impl AttributeType {
    /// Whether `value` is a lexically valid instance of this type.
    pub fn accepts(&self, value: &str) -> bool {
        let v = value.trim();
        match self {
            AttributeType::String => true,
            AttributeType::Integer => v.parse::<i64>().is_ok(),
            AttributeType::Boolean => matches!(v, "true" | "false" | "1" | "0"),
        }
    }
}

/// Occurrence bounds of a child element. `max = None` is unbounded.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Occurrence {
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl Schema {
    /// The schema for text-field recognition results.
    pub fn text_field() -> Result<Self, OcrTaskError> {
        Self::from_json("text_field", TEXT_FIELD_SCHEMA)
    }

    /// Parse and check a schema document.
    pub fn from_json(name: &str, json: &str) -> Result<Self, OcrTaskError> {
        let schema: Schema = serde_json::from_str(json).map_err(|e| OcrTaskError::Schema {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        schema.check()?;
        Ok(schema)
    }

    /// Load a schema file from disk.
    pub fn load(path: &Path) -> Result<Self, OcrTaskError> {
        let json = std::fs::read_to_string(path).map_err(|e| OcrTaskError::Schema {
            name: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_json(&path.display().to_string(), &json)
    }

    pub fn element(&self, name: &str) -> Option<&ElementRule> {
        self.elements.get(name)
    }

    fn check(&self) -> Result<(), OcrTaskError> {
        let fail = |detail: String| OcrTaskError::Schema {
            name: self.name.clone(),
            detail,
        };

        if !self.elements.contains_key(&self.root) {
            return Err(fail(format!("root element '{}' has no rule", self.root)));
        }
        for (element, rule) in &self.elements {
            for (child, occ) in &rule.children {
                if !self.elements.contains_key(child) {
                    return Err(fail(format!(
                        "'{element}' allows child '{child}' which has no rule"
                    )));
                }
                if occ.max.is_some_and(|max| max < occ.min || max == 0) {
                    return Err(fail(format!(
                        "'{element}/{child}' has an empty occurrence range"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_loads() {
        let schema = Schema::text_field().unwrap();
        assert_eq!(schema.root, "document");
        let field = schema.element("field").unwrap();
        assert!(field.attributes["left"].required);
        assert_eq!(field.attributes["left"].kind, AttributeType::Integer);
        assert_eq!(field.children["value"].max, Some(1));
    }

    #[test]
    fn malformed_json_is_schema_error() {
        let err = Schema::from_json("broken", "{ not json").unwrap_err();
        assert!(matches!(err, OcrTaskError::Schema { .. }));
    }

    #[test]
    fn dangling_child_rejected() {
        let json = r#"{"name":"x","root":"a","elements":{"a":{"children":{"b":{}}}}}"#;
        let err = Schema::from_json("x", json).unwrap_err();
        assert!(err.to_string().contains("'b'"), "got: {err}");
    }

    #[test]
    fn missing_root_rule_rejected() {
        let json = r#"{"name":"x","root":"a","elements":{}}"#;
        assert!(Schema::from_json("x", json).is_err());
    }

    #[test]
    fn missing_file_is_schema_error() {
        let err = Schema::load(Path::new("/no/such/schema.json")).unwrap_err();
        assert!(matches!(err, OcrTaskError::Schema { .. }));
    }

    #[test]
    fn attribute_types() {
        assert!(AttributeType::Integer.accepts(" -12 "));
        assert!(!AttributeType::Integer.accepts("1.5"));
        assert!(AttributeType::Boolean.accepts("false"));
        assert!(!AttributeType::Boolean.accepts("yes"));
        assert!(AttributeType::String.accepts(""));
    }
}
