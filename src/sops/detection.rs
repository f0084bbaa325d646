//! # SOPS Encryption Detection
//!
//! Detects if a document is SOPS-encrypted by looking for SOPS metadata.

use crate::constants::SOPS_METADATA_KEY;
use serde_yaml::Value;

/// Check if a parsed document carries a top-level `sops` field
///
/// Only the top level counts; a nested `sops` key (for example inside `data`) does not make
/// the document a candidate.
pub fn is_sops_document(document: &Value) -> bool {
    document
        .as_mapping()
        .is_some_and(|m| m.contains_key(SOPS_METADATA_KEY))
}

/// Check if raw YAML or JSON content is SOPS-encrypted
pub fn is_sops_encrypted(content: &str) -> bool {
    // JSON is a subset of the YAML the parser accepts
    serde_yaml::from_str::<Value>(content).is_ok_and(|document| is_sops_document(&document))
}
