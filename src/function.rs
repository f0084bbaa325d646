//! # KRM Function Harness
//!
//! Runs the filter over a `ResourceList` read from a file or stdin and writes the result to a
//! file or stdout.

use crate::config::FunctionConfig;
use crate::document::ResourceList;
use crate::filter::{FilterError, StreamFilter};
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, error};

/// Process one `ResourceList`
///
/// The configuration override (from `--function-config`) takes precedence over the list's own
/// `functionConfig`.
///
/// # Errors
///
/// Fails if the input is not a `ResourceList`, the configuration is invalid or any document
/// fails to decrypt.
pub fn process_resource_list(input: &str, config_override: Option<&FunctionConfig>) -> Result<String> {
    let mut list = ResourceList::from_yaml_str(input).context("Failed to read ResourceList")?;

    let embedded;
    let config = match config_override {
        Some(config) => config,
        None => {
            embedded = match list.function_config() {
                Some(value) => FunctionConfig::from_value(value).map_err(|e| log_failure(e.into()))?,
                None => FunctionConfig::default(),
            };
            &embedded
        }
    };

    let filter = StreamFilter::from_function_config(config).map_err(log_failure)?;
    let items = filter.process(list.take_items()).map_err(log_failure)?;
    list.set_items(items);

    list.to_yaml_string().context("Failed to write ResourceList")
}

/// Run the function between optional file paths (stdin/stdout when absent)
///
/// # Errors
///
/// Fails on I/O errors or any error from [`process_resource_list`].
pub fn run_paths(input: Option<&Path>, output: Option<&Path>, function_config: Option<&Path>) -> Result<()> {
    let config_override = function_config
        .map(|path| {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read function config: {}", path.display()))?;
            FunctionConfig::from_yaml_str(&text)
                .with_context(|| format!("Invalid function config: {}", path.display()))
        })
        .transpose()?;

    let input_text = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read ResourceList from stdin")?;
            text
        }
    };
    debug!(bytes = input_text.len(), "Read ResourceList");

    let rendered = process_resource_list(&input_text, config_override.as_ref())?;

    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write output: {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .and_then(|()| stdout.flush())
                .context("Failed to write ResourceList to stdout")?;
        }
    }
    Ok(())
}

fn log_failure(err: FilterError) -> FilterError {
    error!(
        failure = err.kind().as_str(),
        remediation = %err.kind().remediation(),
        "{err}"
    );
    err
}
