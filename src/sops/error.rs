//! # SOPS Decryption Error Types
//!
//! Defines error types for each decryption layer and classifies every failure into a
//! [`FailureKind`] so operators get an actionable message without unwrapping the chain.
//!
//! None of these failures are transient: they all depend on data or configuration,
//! so nothing is ever retried.

use thiserror::Error;

/// Classification of decryption failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No identities supplied, or an identity string is malformed
    ConfigurationError,
    /// Document or metadata does not parse
    FormatError,
    /// No configured identity opens any age recipient entry
    NoMatchingIdentity,
    /// Document carries no age recipient entries at all
    InsufficientRecipientGroups,
    /// A leaf value could not be decrypted with the data key
    CipherError,
    /// Recomputed MAC differs from the stored one
    IntegrityCheckFailed,
}

impl FailureKind {
    /// Get human-readable reason string for metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConfigurationError => "configuration_error",
            FailureKind::FormatError => "format_error",
            FailureKind::NoMatchingIdentity => "no_matching_identity",
            FailureKind::InsufficientRecipientGroups => "insufficient_recipient_groups",
            FailureKind::CipherError => "cipher_error",
            FailureKind::IntegrityCheckFailed => "integrity_check_failed",
        }
    }

    /// Get remediation guidance for this failure kind
    pub fn remediation(&self) -> String {
        match self {
            FailureKind::ConfigurationError => {
                "Set functionConfig 'age.keys' to one or more age private identities (AGE-SECRET-KEY-1...) and set 'verifyMac' explicitly.".to_string()
            }
            FailureKind::FormatError => {
                "The document is not a valid SOPS document. Verify it was produced by sops and that the 'sops' metadata section is intact.".to_string()
            }
            FailureKind::NoMatchingIdentity => {
                "None of the configured age identities matches a recipient of this document. Add the private key for one of the listed recipients to 'age.keys'.".to_string()
            }
            FailureKind::InsufficientRecipientGroups => {
                "The document was not encrypted for any age recipient. Re-encrypt it with 'sops updatekeys' after adding an age recipient to .sops.yaml.".to_string()
            }
            FailureKind::CipherError => {
                "An encrypted value could not be decrypted with the recovered data key. The value or its field path was modified after encryption.".to_string()
            }
            FailureKind::IntegrityCheckFailed => {
                "The document MAC does not match its content. The document was modified after encryption; re-encrypt it or disable 'verifyMac' if the transport is trusted.".to_string()
            }
        }
    }
}

/// Errors raised while turning function configuration into a usable identity set
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("age.keys needs at least one key")]
    NoIdentitiesConfigured,

    /// The offending entry is identified by position only; its content is secret.
    #[error("age.keys[{index}] is not a valid age identity: {reason}")]
    InvalidIdentity { index: usize, reason: String },

    #[error("invalid function config: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ConfigurationError
    }
}

/// Errors returned by a [`crate::sops::keyservice::KeyService`]
#[derive(Debug, Error)]
pub enum KeyServiceError {
    #[error("must provide a key")]
    MissingKey,

    #[error("unsupported key type: {key_type}")]
    UnsupportedKeyType { key_type: String },

    #[error("age envelope is malformed: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("no age identity found that could decrypt the data key for recipient {recipient}")]
    NoMatchingIdentity { recipient: String },

    #[error("{operation} is not supported by the local age key service")]
    NotSupported { operation: &'static str },
}

/// Errors from the AES-GCM leaf cipher
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("data key is {actual} bytes, expected {expected}")]
    InvalidKeyLength { actual: usize, expected: usize },

    #[error("input string does not match sops' data format")]
    MalformedValue,

    #[error("error base64-decoding {field}: {reason}")]
    Encoding { field: &'static str, reason: String },

    #[error("iv is {actual} bytes, expected {expected}")]
    InvalidNonceLength { actual: usize, expected: usize },

    #[error("could not decrypt with AES_GCM")]
    Authentication,

    #[error("invalid {datatype} value: {reason}")]
    InvalidPlaintext { datatype: String, reason: String },

    #[error("unknown datatype '{datatype}'")]
    UnknownDatatype { datatype: String },

    #[error("invalid leaf pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors from decrypting a single document
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("failed to parse document: {reason}")]
    Format { reason: String },

    #[error("sops metadata not found")]
    MetadataNotFound,

    #[error("invalid sops metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error(
        "error getting data key: {required} successful groups required, got 0: \
         no configured age identity could decrypt any of {tried} recipient entries ({})",
        .failures.join("; ")
    )]
    NoMatchingIdentity {
        tried: usize,
        required: usize,
        failures: Vec<String>,
    },

    #[error(
        "error getting data key: {required} successful groups required, got {succeeded}: \
         document has no age recipient entries"
    )]
    InsufficientRecipientGroups { succeeded: usize, required: usize },

    #[error("could not decrypt value at '{path}': {reason}")]
    Cipher { path: String, reason: String },

    #[error("failed to verify data integrity. expected mac {stored:?}, got {computed:?}")]
    IntegrityCheckFailed { stored: String, computed: String },

    #[error("failed to emit plaintext document: {reason}")]
    Emit { reason: String },
}

impl DecryptError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            DecryptError::Format { .. }
            | DecryptError::MetadataNotFound
            | DecryptError::InvalidMetadata { .. }
            | DecryptError::Emit { .. } => FailureKind::FormatError,
            DecryptError::NoMatchingIdentity { .. } => FailureKind::NoMatchingIdentity,
            DecryptError::InsufficientRecipientGroups { .. } => {
                FailureKind::InsufficientRecipientGroups
            }
            DecryptError::Cipher { .. } => FailureKind::CipherError,
            DecryptError::IntegrityCheckFailed { .. } => FailureKind::IntegrityCheckFailed,
        }
    }

    /// Get remediation guidance for this error
    pub fn remediation(&self) -> String {
        self.kind().remediation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [FailureKind; 6] = [
        FailureKind::ConfigurationError,
        FailureKind::FormatError,
        FailureKind::NoMatchingIdentity,
        FailureKind::InsufficientRecipientGroups,
        FailureKind::CipherError,
        FailureKind::IntegrityCheckFailed,
    ];

    #[test]
    fn test_failure_kind_strings_are_label_safe() {
        for kind in ALL_KINDS {
            let label = kind.as_str();
            assert!(!label.is_empty());
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_kind_remediation_is_detailed() {
        for kind in ALL_KINDS {
            assert!(
                kind.remediation().len() > 20,
                "Remediation guidance should be detailed for {kind:?}"
            );
        }
    }

    #[test]
    fn test_no_matching_identity_message_names_groups() {
        let err = DecryptError::NoMatchingIdentity {
            tried: 2,
            required: 1,
            failures: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("successful groups"));
        assert!(msg.contains("2 recipient entries"));
        assert_eq!(err.kind(), FailureKind::NoMatchingIdentity);
    }

    #[test]
    fn test_insufficient_groups_is_distinct_from_no_matching_identity() {
        let err = DecryptError::InsufficientRecipientGroups {
            succeeded: 0,
            required: 1,
        };
        assert_eq!(err.kind(), FailureKind::InsufficientRecipientGroups);
        assert!(err.to_string().contains("1 successful groups required, got 0"));
    }

    #[test]
    fn test_integrity_failure_names_both_values() {
        let err = DecryptError::IntegrityCheckFailed {
            stored: "AAA".to_string(),
            computed: "BBB".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"AAA\""));
        assert!(msg.contains("\"BBB\""));
    }
}
