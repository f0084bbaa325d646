//! # KRM ResourceList
//!
//! Reads and writes the `ResourceList` envelope kustomize exchanges with function stages.
//! Only `items` is replaced on output; every other top-level field is written back as read.

use super::{expect_mapping, DocumentError, DocumentFormat, ResourceNode};
use crate::constants::{RESOURCE_LIST_API_VERSION, RESOURCE_LIST_KIND};
use serde_yaml::{Mapping, Value};

const ITEMS: &str = "items";
const FUNCTION_CONFIG: &str = "functionConfig";

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceList {
    envelope: Mapping,
    items: Vec<ResourceNode>,
}

impl ResourceList {
    /// Build a list around `items` with an empty envelope
    pub fn new(items: Vec<ResourceNode>) -> Self {
        let mut envelope = Mapping::new();
        envelope.insert("apiVersion".into(), RESOURCE_LIST_API_VERSION.into());
        envelope.insert("kind".into(), RESOURCE_LIST_KIND.into());
        Self { envelope, items }
    }

    /// Parse a `ResourceList` from YAML (or JSON) text
    ///
    /// # Errors
    ///
    /// Fails if the text does not parse, is not a mapping, is not of kind `ResourceList`, or
    /// `items` is not a sequence.
    pub fn from_yaml_str(text: &str) -> Result<Self, DocumentError> {
        let mut envelope = expect_mapping(DocumentFormat::Yaml.parse(text)?)?;

        let kind = envelope.get("kind").and_then(Value::as_str);
        if kind != Some(RESOURCE_LIST_KIND) {
            return Err(DocumentError::Parse {
                format: DocumentFormat::Yaml,
                reason: format!(
                    "expected kind {RESOURCE_LIST_KIND}, found {}",
                    kind.unwrap_or("none")
                ),
            });
        }

        // Taken in place so the key is written back where it was read
        let items = match envelope.get_mut(ITEMS).map(std::mem::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items.into_iter().map(ResourceNode::new).collect(),
            Some(other) => {
                return Err(DocumentError::UnexpectedShape {
                    expected: "sequence of items",
                    found: super::shape_of(&other),
                })
            }
        };

        Ok(Self { envelope, items })
    }

    /// Render the list with the current items
    ///
    /// # Errors
    ///
    /// Fails if a document cannot be represented as YAML.
    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        let mut envelope = self.envelope.clone();
        let items = self.items.iter().map(|n| n.value().clone()).collect();
        envelope.insert(ITEMS.into(), Value::Sequence(items));
        DocumentFormat::Yaml.emit(&Value::Mapping(envelope))
    }

    pub fn items(&self) -> &[ResourceNode] {
        &self.items
    }

    /// Take the items out for processing
    pub fn take_items(&mut self) -> Vec<ResourceNode> {
        std::mem::take(&mut self.items)
    }

    pub fn set_items(&mut self, items: Vec<ResourceNode>) {
        self.items = items;
    }

    pub fn function_config(&self) -> Option<&Value> {
        self.envelope.get(FUNCTION_CONFIG).filter(|v| !v.is_null())
    }
}
