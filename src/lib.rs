//! # Kustomize SOPS age
//!
//! A kustomize KRM function stage that decrypts SOPS-encrypted resources in-process with age
//! identities.
//!
//! ## Overview
//!
//! 1. **Identity set** - age private keys from `functionConfig` are parsed once per run
//! 2. **Key unwrap** - each encrypted document's data key is recovered from its age recipients
//! 3. **Tree decrypt** - AES-256-GCM leaves are decrypted and the SHA-512 MAC is checked
//! 4. **Stream filter** - decrypted documents replace the originals in place; others pass through
//!
//! No external binaries, environment variables or temporary files are involved.

pub mod config;
pub mod constants;
pub mod document;
pub mod filter;
pub mod function;
pub mod observability;
pub mod sops;

pub use config::{FilterConfig, FunctionConfig};
pub use document::{DocumentFormat, ResourceList, ResourceNode};
pub use filter::{FilterError, StreamFilter};
pub use sops::{decrypt_document, IdentitySet, MacPolicy};
