//! # SOPS Decryption
//!
//! Decrypts SOPS documents in-process with age identities.
//!
//! ## Module Structure
//!
//! - `identity.rs` - Age identity set parsing
//! - `keyservice.rs` - Local key-unwrap service (age only)
//! - `metadata.rs` - `sops` metadata schema, key groups and field selection
//! - `cipher.rs` - AES-256-GCM leaf values
//! - `tree.rs` - Leaf walk and MAC accumulation
//! - `decrypt.rs` - Main decryption logic
//! - `detection.rs` - SOPS encryption detection
//! - `error.rs` - Error types and classification

pub mod cipher;
pub mod decrypt;
pub mod detection;
pub mod error;
pub mod identity;
pub mod keyservice;
pub mod metadata;
pub mod tree;

// Re-export public API
pub use decrypt::{decrypt_document, MacPolicy};
pub use detection::{is_sops_document, is_sops_encrypted};
pub use error::{CipherError, ConfigError, DecryptError, FailureKind, KeyServiceError};
pub use identity::IdentitySet;
pub use keyservice::{KeyService, LocalAgeKeyService};
pub use metadata::MasterKey;
