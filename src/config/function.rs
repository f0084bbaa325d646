//! # functionConfig Schema

use super::FilterConfig;
use crate::sops::{ConfigError, IdentitySet, MacPolicy};
use serde::Deserialize;
use serde_yaml::Value;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw function configuration as written by the user
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    #[serde(default)]
    pub age: AgeConfig,
    /// Required: there is no default MAC policy
    #[serde(default)]
    pub verify_mac: Option<bool>,
}

/// age private identities; wiped when the config is dropped
#[derive(Default, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AgeConfig {
    #[serde(default)]
    pub keys: Vec<String>,
}

impl fmt::Debug for AgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgeConfig")
            .field("keys", &format_args!("[{} redacted]", self.keys.len()))
            .finish()
    }
}

impl FunctionConfig {
    /// Deserialize from a `functionConfig` value
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value does not match the schema.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::deserialize(value).map_err(|e| ConfigError::Invalid {
            reason: e.to_string(),
        })
    }

    /// Deserialize from YAML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the text does not parse or match the schema.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Invalid {
            reason: e.to_string(),
        })
    }

    /// Validate into a [`FilterConfig`]
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoIdentitiesConfigured`] if `age.keys` is empty
    /// - [`ConfigError::InvalidIdentity`] if a key does not parse
    /// - [`ConfigError::Invalid`] if `verifyMac` is missing
    pub fn resolve(&self) -> Result<FilterConfig, ConfigError> {
        let identities = IdentitySet::parse(&self.age.keys)?;
        let verify_mac = self.verify_mac.ok_or_else(|| ConfigError::Invalid {
            reason: "verifyMac must be set to true or false".to_string(),
        })?;
        Ok(FilterConfig {
            identities,
            mac_policy: MacPolicy::from_verify(verify_mac),
        })
    }
}
