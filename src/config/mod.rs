//! # Function Configuration
//!
//! Configuration arrives as the `functionConfig` of the incoming `ResourceList` (or a YAML file
//! named on the command line). Nothing is read from the environment.
//!
//! ```yaml
//! age:
//!   keys:
//!     - AGE-SECRET-KEY-1...
//! verifyMac: true
//! ```

mod function;

pub use function::{AgeConfig, FunctionConfig};

use crate::sops::{IdentitySet, MacPolicy};

/// Validated configuration the filter runs with
#[derive(Debug)]
pub struct FilterConfig {
    pub identities: IdentitySet,
    pub mac_policy: MacPolicy,
}
