//! # Observability
//!
//! Structured logging for the function. Output goes to stderr: stdout carries the
//! `ResourceList` back to kustomize.

use crate::constants::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless; the second
/// subscriber is rejected and the first stays in place.
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}
