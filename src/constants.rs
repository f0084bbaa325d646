//! # Constants
//!
//! Fixed names and defaults shared across the function.

/// Top-level field that marks a document as SOPS-encrypted
pub const SOPS_METADATA_KEY: &str = "sops";

/// Annotations injected by the kustomize/kyaml pipeline to track document identity and ordering.
/// They are never part of the authored document, so they are removed before decryption
/// (they were not covered by the MAC at encryption time).
pub const PIPELINE_INJECTED_ANNOTATIONS: [&str; 5] = [
    "config.k8s.io/id",
    "config.kubernetes.io/index",
    "internal.config.kubernetes.io/id",
    "internal.config.kubernetes.io/index",
    "kustomize.config.k8s.io/id",
];

/// Suffix that excludes a field from encryption when no selector is declared in metadata
pub const DEFAULT_UNENCRYPTED_SUFFIX: &str = "_unencrypted";

/// Cipher suite identifier for SOPS leaf values
pub const AES256_GCM: &str = "AES256_GCM";

/// SOPS always writes 32-byte nonces for AES-GCM leaves
pub const AES_GCM_NONCE_SIZE: usize = 32;

/// Length of a SOPS data key (AES-256)
pub const DATA_KEY_SIZE: usize = 32;

/// Successful key groups required to recover the data key when Shamir sharing is not used
pub const REQUIRED_KEY_GROUPS: usize = 1;

/// ResourceList envelope written back to kustomize
pub const RESOURCE_LIST_API_VERSION: &str = "config.kubernetes.io/v1";
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "kustomize_sops_age=info";
