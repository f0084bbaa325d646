//! # Tree Walk
//!
//! Decrypts the selected leaves of a document tree in place and accumulates the SHA-512 MAC
//! over every leaf in document order.
//!
//! Sequence items add no path component: `hosts: [a, b]` hashes and authenticates both items
//! with additional data `hosts:`. Null leaves are neither decrypted nor hashed.

use crate::sops::cipher::LeafCipher;
use crate::sops::error::DecryptError;
use crate::sops::metadata::FieldSelector;
use serde_yaml::{Number, Value};
use sha2::{Digest, Sha512};

/// Walks one document with a fixed cipher and selector
pub struct TreeDecryptor<'a> {
    cipher: &'a LeafCipher,
    selector: &'a FieldSelector,
    mac_only_encrypted: bool,
    hasher: Sha512,
}

impl std::fmt::Debug for TreeDecryptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeDecryptor")
            .field("selector", &self.selector)
            .field("mac_only_encrypted", &self.mac_only_encrypted)
            .finish_non_exhaustive()
    }
}

impl<'a> TreeDecryptor<'a> {
    pub fn new(cipher: &'a LeafCipher, selector: &'a FieldSelector, mac_only_encrypted: bool) -> Self {
        Self {
            cipher,
            selector,
            mac_only_encrypted,
            hasher: Sha512::new(),
        }
    }

    /// Decrypt `tree` in place and return the recomputed MAC as uppercase hex
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError::Cipher`] naming the path of the first leaf that fails.
    pub fn decrypt(mut self, tree: &mut Value) -> Result<String, DecryptError> {
        let mut path = Vec::new();
        self.walk(tree, &mut path)?;
        Ok(hex::encode_upper(self.hasher.finalize()))
    }

    fn walk(&mut self, value: &mut Value, path: &mut Vec<String>) -> Result<(), DecryptError> {
        match value {
            Value::Mapping(mapping) => {
                for (key, child) in mapping.iter_mut() {
                    path.push(key_to_string(key));
                    self.walk(child, path)?;
                    path.pop();
                }
                Ok(())
            }
            Value::Sequence(items) => {
                for item in items {
                    self.walk(item, path)?;
                }
                Ok(())
            }
            Value::Tagged(tagged) => self.walk(&mut tagged.value, path),
            Value::Null => Ok(()),
            Value::String(_) | Value::Number(_) | Value::Bool(_) => self.visit_leaf(value, path),
        }
    }

    fn visit_leaf(&mut self, value: &mut Value, path: &[String]) -> Result<(), DecryptError> {
        let encrypted = self.selector.is_encrypted(path);
        if encrypted {
            let Value::String(ciphertext) = &*value else {
                return Err(DecryptError::Cipher {
                    path: path.join("."),
                    reason: "expected an encrypted string value".to_string(),
                });
            };
            *value = self
                .cipher
                .decrypt(ciphertext, &additional_data(path))
                .map_err(|e| DecryptError::Cipher {
                    path: path.join("."),
                    reason: e.to_string(),
                })?;
        }
        if encrypted || !self.mac_only_encrypted {
            self.hasher.update(leaf_bytes(value).as_bytes());
        }
        Ok(())
    }
}

/// Additional data bound to a leaf: every key on its path followed by `:`
pub fn additional_data(path: &[String]) -> String {
    path.iter().map(|p| format!("{p}:")).collect()
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Byte form of a plaintext leaf as SOPS hashes it
fn leaf_bytes(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => number_bytes(n),
        _ => String::new(),
    }
}

fn number_bytes(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_infinite() && f.is_sign_positive() => "+Inf".to_string(),
        Some(f) if f.is_infinite() => "-Inf".to_string(),
        // Shortest round-trip decimal, no exponent
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
