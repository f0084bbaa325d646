//! # Age Identity Set
//!
//! Parses configured age private keys into decryption identities.
//!
//! Each configured entry may be a single `AGE-SECRET-KEY-1...` string or the full content of an
//! age key file (`age-keygen` output): blank lines and `#` comment lines are ignored, every other
//! line must be an identity.

use crate::sops::error::ConfigError;
use age::x25519;
use std::fmt;
use std::str::FromStr;

/// Immutable set of age identities, built once per run and shared by reference
pub struct IdentitySet {
    identities: Vec<x25519::Identity>,
}

impl IdentitySet {
    /// Parse configured key strings into an identity set
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoIdentitiesConfigured`] if `keys` is empty
    /// - [`ConfigError::InvalidIdentity`] naming the position of the first malformed entry
    pub fn parse<S: AsRef<str>>(keys: &[S]) -> Result<Self, ConfigError> {
        if keys.is_empty() {
            return Err(ConfigError::NoIdentitiesConfigured);
        }

        let mut identities = Vec::with_capacity(keys.len());
        for (index, entry) in keys.iter().enumerate() {
            let before = identities.len();
            for line in entry.as_ref().lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let identity = x25519::Identity::from_str(line).map_err(|reason| {
                    ConfigError::InvalidIdentity {
                        index,
                        reason: reason.to_string(),
                    }
                })?;
                identities.push(identity);
            }
            if identities.len() == before {
                return Err(ConfigError::InvalidIdentity {
                    index,
                    reason: "entry contains no identity".to_string(),
                });
            }
        }

        Ok(Self { identities })
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Identities in configured order, as the trait objects the age decryptor expects
    pub fn as_age_identities(&self) -> impl Iterator<Item = &dyn age::Identity> {
        self.identities.iter().map(|i| i as &dyn age::Identity)
    }

    /// Public recipients (`age1...`) matching the configured identities
    pub fn recipients(&self) -> Vec<String> {
        self.identities
            .iter()
            .map(|i| i.to_public().to_string())
            .collect()
    }
}

impl fmt::Debug for IdentitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySet")
            .field("recipients", &self.recipients())
            .finish()
    }
}
