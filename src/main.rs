//! # kustomize-sops-age
//!
//! KRM function entrypoint: reads a `ResourceList`, decrypts SOPS documents and writes the
//! list back.
//!
//! ## Usage
//!
//! ```bash
//! # As a kustomize exec/container function (stdin -> stdout)
//! kustomize-sops-age
//!
//! # Standalone, with the key configuration kept out of the ResourceList
//! kustomize-sops-age --input list.yaml --output out.yaml --function-config keys.yaml
//! ```

use anyhow::Result;
use clap::Parser;
use kustomize_sops_age::{function, observability};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kustomize-sops-age")]
#[command(about = "Decrypt SOPS-encrypted resources with age identities", long_about = None)]
#[command(version)]
struct Cli {
    /// ResourceList to read (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the processed ResourceList (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// functionConfig YAML overriding the one embedded in the ResourceList
    #[arg(short, long)]
    function_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    function::run_paths(
        cli.input.as_deref(),
        cli.output.as_deref(),
        cli.function_config.as_deref(),
    )
}
