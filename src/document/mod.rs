//! # Documents
//!
//! Minimal structured-document interface the filter needs from the pipeline: field lookup,
//! annotation removal and conversion to and from the wire form.

pub mod resource_list;

use serde_yaml::{Mapping, Value};
use thiserror::Error;

pub use resource_list::ResourceList;

/// Errors converting documents to and from text
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to parse {format} document: {reason}")]
    Parse {
        format: DocumentFormat,
        reason: String,
    },

    #[error("failed to serialize {format} document: {reason}")]
    Serialize {
        format: DocumentFormat,
        reason: String,
    },

    #[error("expected a {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Wire syntax of an encrypted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// The pipeline's native syntax
    #[default]
    Yaml,
    Json,
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Yaml => write!(f, "yaml"),
            DocumentFormat::Json => write!(f, "json"),
        }
    }
}

impl DocumentFormat {
    /// Parse text into a tree, keeping mapping key order
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Parse`] on invalid syntax.
    pub fn parse(self, text: &str) -> Result<Value, DocumentError> {
        let parsed = match self {
            DocumentFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
            DocumentFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| DocumentError::Parse {
            format: self,
            reason,
        })
    }

    /// Render a tree in this format
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialize`] if the tree cannot be represented.
    pub fn emit(self, value: &Value) -> Result<String, DocumentError> {
        let emitted = match self {
            DocumentFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
            DocumentFormat::Json => serde_json::to_string_pretty(value)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
        };
        emitted.map_err(|reason| DocumentError::Serialize {
            format: self,
            reason,
        })
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// One structured document in the stream
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    value: Value,
}

impl ResourceNode {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Parse a single document from its wire form
    ///
    /// # Errors
    ///
    /// Fails on invalid syntax.
    pub fn from_wire(text: &str, format: DocumentFormat) -> Result<Self, DocumentError> {
        format.parse(text).map(Self::new)
    }

    /// Serialize to the wire form
    ///
    /// # Errors
    ///
    /// Fails if the tree cannot be represented in `format`.
    pub fn to_wire(&self, format: DocumentFormat) -> Result<String, DocumentError> {
        format.emit(&self.value)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Top-level field lookup
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(name))
            .and_then(Value::as_str)
    }

    /// Remove `metadata.annotations[name]`, dropping the annotations mapping if it ends up empty.
    /// Returns whether the annotation was present.
    pub fn clear_annotation(&mut self, name: &str) -> bool {
        let Some(metadata) = self.value.get_mut("metadata").and_then(Value::as_mapping_mut) else {
            return false;
        };
        let Some(annotations) = metadata
            .get_mut("annotations")
            .and_then(Value::as_mapping_mut)
        else {
            return false;
        };
        let removed = annotations.shift_remove(name).is_some();
        if removed && annotations.is_empty() {
            metadata.shift_remove("annotations");
        }
        removed
    }

    /// `kind/namespace/name` for log fields and error messages
    pub fn display_id(&self) -> String {
        let kind = self.field("kind").and_then(Value::as_str).unwrap_or("<unknown>");
        let metadata = self.field("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>");
        match metadata.and_then(|m| m.get("namespace")).and_then(Value::as_str) {
            Some(namespace) => format!("{kind}/{namespace}/{name}"),
            None => format!("{kind}/{name}"),
        }
    }
}

/// Require a mapping at the top of a parsed document
///
/// # Errors
///
/// Returns [`DocumentError::UnexpectedShape`] for any other value.
pub fn expect_mapping(value: Value) -> Result<Mapping, DocumentError> {
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(DocumentError::UnexpectedShape {
            expected: "mapping",
            found: shape_of(&other),
        }),
    }
}
