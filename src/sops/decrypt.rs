//! # Document Decryption
//!
//! Turns one encrypted document into its plaintext form:
//!
//! 1. Parse the document and split off the `sops` metadata section
//! 2. Recover the data key from the age recipient entries (first success wins)
//! 3. Decrypt every selected leaf in place, recomputing the MAC along the way
//! 4. Compare against the stored MAC when the policy asks for it
//! 5. Emit the cleartext tree, without metadata, in the input format

use crate::constants::{DATA_KEY_SIZE, REQUIRED_KEY_GROUPS, SOPS_METADATA_KEY};
use crate::document::{expect_mapping, DocumentFormat};
use crate::sops::cipher::LeafCipher;
use crate::sops::error::{DecryptError, KeyServiceError};
use crate::sops::identity::IdentitySet;
use crate::sops::keyservice::{KeyService, LocalAgeKeyService};
use crate::sops::metadata::{MasterKey, SopsMetadata};
use crate::sops::tree::TreeDecryptor;
use serde_yaml::Value;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Whether the document MAC is checked after decryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacPolicy {
    /// Fail with [`DecryptError::IntegrityCheckFailed`] on mismatch
    Verify,
    /// Skip the comparison entirely
    Ignore,
}

impl MacPolicy {
    pub fn from_verify(verify: bool) -> Self {
        if verify {
            MacPolicy::Verify
        } else {
            MacPolicy::Ignore
        }
    }
}

/// Decrypt a SOPS document with the given identities
///
/// # Errors
///
/// See [`DecryptError`]; every variant maps onto a
/// [`FailureKind`](crate::sops::error::FailureKind).
pub fn decrypt_document(
    raw: &[u8],
    format: DocumentFormat,
    identities: &IdentitySet,
    mac_policy: MacPolicy,
) -> Result<Vec<u8>, DecryptError> {
    let text = std::str::from_utf8(raw).map_err(|e| DecryptError::Format {
        reason: e.to_string(),
    })?;
    let parsed = format.parse(text).map_err(|e| DecryptError::Format {
        reason: e.to_string(),
    })?;
    let mut branch = expect_mapping(parsed).map_err(|e| DecryptError::Format {
        reason: e.to_string(),
    })?;

    let metadata = branch
        .shift_remove(SOPS_METADATA_KEY)
        .ok_or(DecryptError::MetadataNotFound)
        .and_then(SopsMetadata::from_value)?;

    let selector = metadata.field_selector()?;
    let mac_additional_data = metadata.last_modified_rfc3339()?;

    let key_service = LocalAgeKeyService::new(identities);
    let data_key = unwrap_data_key(&metadata, &key_service)?;
    let cipher = LeafCipher::new(&data_key).map_err(|e| DecryptError::InvalidMetadata {
        reason: e.to_string(),
    })?;

    let mut tree = Value::Mapping(branch);
    let computed = TreeDecryptor::new(&cipher, &selector, metadata.mac_only_encrypted).decrypt(&mut tree)?;

    match mac_policy {
        MacPolicy::Verify => {
            // An unreadable stored MAC is reported as a mismatch, not as a cipher failure
            let stored = cipher
                .decrypt_str(&metadata.mac, &mac_additional_data)
                .unwrap_or_default();
            if stored != computed {
                warn!("Document MAC does not match its content");
                return Err(DecryptError::IntegrityCheckFailed { stored, computed });
            }
            debug!("Document MAC verified");
        }
        MacPolicy::Ignore => debug!("Skipping document MAC verification"),
    }

    format
        .emit(&tree)
        .map(String::into_bytes)
        .map_err(|e| DecryptError::Emit {
            reason: e.to_string(),
        })
}

/// Recover the data key from the document's single key group
///
/// Every age entry is tried in order until one yields a key; failures are collected so the
/// final error lists why each recipient was rejected. When no entry was refused for lack of a
/// matching identity, every envelope was broken and the metadata itself is at fault.
pub(crate) fn unwrap_data_key(
    metadata: &SopsMetadata,
    key_service: &dyn KeyService,
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let groups = metadata.key_groups()?;
    let age_keys: Vec<&MasterKey> = groups
        .iter()
        .flatten()
        .filter(|k| matches!(k, MasterKey::Age { .. }))
        .collect();

    if age_keys.is_empty() {
        return Err(DecryptError::InsufficientRecipientGroups {
            succeeded: 0,
            required: REQUIRED_KEY_GROUPS,
        });
    }

    debug!(entries = age_keys.len(), "Trying age recipient entries");
    let mut failures = Vec::with_capacity(age_keys.len());
    let mut identity_mismatch = false;
    for key in &age_keys {
        let MasterKey::Age { recipient, .. } = key else {
            continue;
        };
        match key_service.decrypt(Some(*key)) {
            Ok(data_key) if data_key.len() == DATA_KEY_SIZE => return Ok(data_key),
            Ok(data_key) => failures.push(format!(
                "{recipient}: unwrapped key is {} bytes, expected {DATA_KEY_SIZE}",
                data_key.len()
            )),
            Err(e) => {
                identity_mismatch |= matches!(e, KeyServiceError::NoMatchingIdentity { .. });
                failures.push(format!("{recipient}: {e}"));
            }
        }
    }

    if !identity_mismatch {
        return Err(DecryptError::InvalidMetadata {
            reason: format!(
                "no age recipient entry holds a usable data key ({})",
                failures.join("; ")
            ),
        });
    }

    Err(DecryptError::NoMatchingIdentity {
        tried: age_keys.len(),
        required: REQUIRED_KEY_GROUPS,
        failures,
    })
}
