//! # SOPS Metadata
//!
//! Deserializes the `sops` section of an encrypted document.
//!
//! The schema matches what standard SOPS tooling writes; the decrypt path only reads it and
//! never rewrites it. Every key-service group is parsed so that documents encrypted for KMS,
//! PGP or Vault load cleanly, but only the age group is ever used to recover the data key.

use crate::constants::{DEFAULT_UNENCRYPTED_SUFFIX, REQUIRED_KEY_GROUPS};
use crate::sops::error::DecryptError;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` the same as a missing field (SOPS JSON writes `"kms": null`)
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// age recipient entry: the data key wrapped for one X25519 recipient
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgeEntry {
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub enc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PgpEntry {
    #[serde(default)]
    pub fp: String,
    #[serde(default)]
    pub enc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KmsEntry {
    #[serde(default)]
    pub arn: String,
    #[serde(default)]
    pub enc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcpKmsEntry {
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub enc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureKvEntry {
    #[serde(default)]
    pub vault_url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HcVaultEntry {
    #[serde(default)]
    pub vault_address: String,
    #[serde(default)]
    pub key_name: String,
    #[serde(default)]
    pub enc: String,
}

/// Recipient entries grouped by key-service provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyGroupEntries {
    #[serde(default, deserialize_with = "null_as_default")]
    pub kms: Vec<KmsEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gcp_kms: Vec<GcpKmsEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub azure_kv: Vec<AzureKvEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hc_vault: Vec<HcVaultEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub age: Vec<AgeEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pgp: Vec<PgpEntry>,
}

/// The `sops` metadata section
#[derive(Debug, Clone, Deserialize)]
pub struct SopsMetadata {
    #[serde(flatten)]
    pub recipients: KeyGroupEntries,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_groups: Vec<KeyGroupEntries>,
    #[serde(default)]
    pub shamir_threshold: Option<usize>,
    pub lastmodified: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mac: String,
    #[serde(default)]
    pub unencrypted_suffix: Option<String>,
    #[serde(default)]
    pub encrypted_suffix: Option<String>,
    #[serde(default)]
    pub unencrypted_regex: Option<String>,
    #[serde(default)]
    pub encrypted_regex: Option<String>,
    #[serde(default)]
    pub mac_only_encrypted: bool,
    /// Version of the tool that wrote the document; may parse as a number
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,
}

/// A wrapped data key, tagged with the key service that can unwrap it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterKey {
    Age { recipient: String, enc: String },
    Pgp { fingerprint: String },
    Kms { arn: String },
    GcpKms { resource_id: String },
    AzureKv { vault_url: String, name: String },
    HcVault { address: String, key_name: String },
}

impl MasterKey {
    /// Key-service type tag, as used in the SOPS metadata schema
    pub fn key_type(&self) -> &'static str {
        match self {
            MasterKey::Age { .. } => "age",
            MasterKey::Pgp { .. } => "pgp",
            MasterKey::Kms { .. } => "kms",
            MasterKey::GcpKms { .. } => "gcp_kms",
            MasterKey::AzureKv { .. } => "azure_kv",
            MasterKey::HcVault { .. } => "hc_vault",
        }
    }
}

impl KeyGroupEntries {
    fn master_keys(&self) -> Vec<MasterKey> {
        let age = self.age.iter().map(|e| MasterKey::Age {
            recipient: e.recipient.clone(),
            enc: e.enc.clone(),
        });
        let pgp = self.pgp.iter().map(|e| MasterKey::Pgp {
            fingerprint: e.fp.clone(),
        });
        let kms = self.kms.iter().map(|e| MasterKey::Kms { arn: e.arn.clone() });
        let gcp = self.gcp_kms.iter().map(|e| MasterKey::GcpKms {
            resource_id: e.resource_id.clone(),
        });
        let azure = self.azure_kv.iter().map(|e| MasterKey::AzureKv {
            vault_url: e.vault_url.clone(),
            name: e.name.clone(),
        });
        let vault = self.hc_vault.iter().map(|e| MasterKey::HcVault {
            address: e.vault_address.clone(),
            key_name: e.key_name.clone(),
        });
        age.chain(pgp)
            .chain(kms)
            .chain(gcp)
            .chain(azure)
            .chain(vault)
            .collect()
    }
}

/// Which leaves were encrypted at rest
#[derive(Debug, Clone)]
pub enum FieldSelector {
    /// Everything except leaves under a key ending with the suffix
    UnencryptedSuffix(String),
    /// Only leaves under a key ending with the suffix
    EncryptedSuffix(String),
    /// Everything except leaves under a key matching the pattern
    UnencryptedRegex(Regex),
    /// Only leaves under a key matching the pattern
    EncryptedRegex(Regex),
}

impl FieldSelector {
    /// Whether the leaf at `path` is encrypted. Every key on the path is considered.
    pub fn is_encrypted(&self, path: &[String]) -> bool {
        match self {
            FieldSelector::UnencryptedSuffix(suffix) => !path.iter().any(|p| p.ends_with(suffix)),
            FieldSelector::EncryptedSuffix(suffix) => path.iter().any(|p| p.ends_with(suffix)),
            FieldSelector::UnencryptedRegex(re) => !path.iter().any(|p| re.is_match(p)),
            FieldSelector::EncryptedRegex(re) => path.iter().any(|p| re.is_match(p)),
        }
    }
}

impl SopsMetadata {
    /// Deserialize the value of the top-level `sops` field
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError::InvalidMetadata`] if the section does not match the schema.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, DecryptError> {
        serde_yaml::from_value(value).map_err(|e| DecryptError::InvalidMetadata {
            reason: e.to_string(),
        })
    }

    /// Recipient key groups. Top-level recipient lists form a single group.
    ///
    /// # Errors
    ///
    /// Multiple key groups (Shamir secret sharing) are rejected.
    pub fn key_groups(&self) -> Result<Vec<Vec<MasterKey>>, DecryptError> {
        if self.key_groups.is_empty() {
            return Ok(vec![self.recipients.master_keys()]);
        }
        if self.key_groups.len() > REQUIRED_KEY_GROUPS {
            return Err(DecryptError::InvalidMetadata {
                reason: format!(
                    "{} key groups with shamir_threshold {:?} are not supported",
                    self.key_groups.len(),
                    self.shamir_threshold
                ),
            });
        }
        Ok(self.key_groups.iter().map(KeyGroupEntries::master_keys).collect())
    }

    /// Resolve the encrypted-field selector
    ///
    /// # Errors
    ///
    /// Fails if more than one selector is declared or a pattern does not compile.
    pub fn field_selector(&self) -> Result<FieldSelector, DecryptError> {
        fn declared(field: Option<&String>) -> Option<&str> {
            field.map(String::as_str).filter(|s| !s.is_empty())
        }
        fn compile(pattern: &str) -> Result<Regex, DecryptError> {
            Regex::new(pattern).map_err(|e| DecryptError::InvalidMetadata {
                reason: format!("invalid field selector pattern '{pattern}': {e}"),
            })
        }

        let mut selectors = Vec::new();
        if let Some(s) = declared(self.unencrypted_suffix.as_ref()) {
            selectors.push(FieldSelector::UnencryptedSuffix(s.to_string()));
        }
        if let Some(s) = declared(self.encrypted_suffix.as_ref()) {
            selectors.push(FieldSelector::EncryptedSuffix(s.to_string()));
        }
        if let Some(s) = declared(self.unencrypted_regex.as_ref()) {
            selectors.push(FieldSelector::UnencryptedRegex(compile(s)?));
        }
        if let Some(s) = declared(self.encrypted_regex.as_ref()) {
            selectors.push(FieldSelector::EncryptedRegex(compile(s)?));
        }

        match selectors.len() {
            0 => Ok(FieldSelector::UnencryptedSuffix(
                DEFAULT_UNENCRYPTED_SUFFIX.to_string(),
            )),
            1 => Ok(selectors.remove(0)),
            _ => Err(DecryptError::InvalidMetadata {
                reason: "cannot use more than one of encrypted_suffix, unencrypted_suffix, \
                         encrypted_regex and unencrypted_regex"
                    .to_string(),
            }),
        }
    }

    /// `lastmodified` rendered the way it was bound into the MAC: RFC 3339, whole seconds
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError::InvalidMetadata`] if the timestamp is not RFC 3339.
    pub fn last_modified_rfc3339(&self) -> Result<String, DecryptError> {
        let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(&self.lastmodified)
            .map_err(|e| DecryptError::InvalidMetadata {
                reason: format!("lastmodified '{}': {e}", self.lastmodified),
            })?;
        Ok(parsed.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
