//! Subcommands that change the saved configuration: set, unset and merge.

use super::Cli;
use crate::value::Value;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the set subcommand
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Dotted path of the value, e.g. `server.port`
    pub path: String,

    /// New value, parsed as YAML/JSON (`9000`, `true`, `[a, b]`) and kept
    /// as a plain string if it does not parse
    pub value: String,

    /// Always store the value as a string
    #[arg(long)]
    pub string: bool,
}

/// Arguments for the unset subcommand
#[derive(Args, Debug)]
pub struct UnsetArgs {
    /// Dotted path of the value to remove
    pub path: String,
}

/// Arguments for the merge subcommand
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// File to merge, in the config's format
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub fn run_set(cli: &Cli, args: &SetArgs) -> Result<()> {
    let mut config = cli.open(true)?;
    let value = if args.string {
        Value::String(args.value.clone())
    } else {
        parse_value(&args.value)
    };
    config.set_path(&args.path, value)?;
    config.close()?;
    Ok(())
}

pub fn run_unset(cli: &Cli, args: &UnsetArgs) -> Result<()> {
    let mut config = cli.open(true)?;
    config.remove_path(&args.path)?;
    config.close()?;
    Ok(())
}

pub fn run_merge(cli: &Cli, args: &MergeArgs) -> Result<()> {
    let mut config = cli.open(true)?;
    let updates = crate::loader::SourceLoader::new(cli.format())
        .read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let report = config.update(updates)?;
    for err in &report.errors {
        eprintln!("warning: {}", err);
    }
    config.close()?;
    Ok(())
}

/// Interpret command-line text as a configuration value.
pub fn parse_value(text: &str) -> Value {
    parse_structured(text).unwrap_or_else(|| Value::String(text.to_string()))
}

#[cfg(feature = "yaml")]
fn parse_structured(text: &str) -> Option<Value> {
    // YAML is a superset of JSON
    serde_yaml::from_str(text).ok()
}

#[cfg(not(feature = "yaml"))]
fn parse_structured(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}
