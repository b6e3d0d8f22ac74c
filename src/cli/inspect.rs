//! Read-only subcommands: show, get and paths.

use super::Cli;
use crate::format::Format;
use crate::value::Value;
use anyhow::Result;
use clap::Args;

/// Arguments for the show subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Output format (json or yaml); defaults to the config's own format
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub output: Option<Format>,
}

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Dotted path of the value, e.g. `server.port`
    pub path: String,
}

fn parse_format(s: &str) -> Result<Format, String> {
    Format::from_str(s).ok_or_else(|| format!("unknown format '{s}' (expected json or yaml)"))
}

pub fn run_show(cli: &Cli, args: &ShowArgs) -> Result<()> {
    let config = cli.open(false)?;
    let format = args.output.unwrap_or_else(|| cli.format());
    print!("{}", format.encode(config.root())?);
    Ok(())
}

pub fn run_get(cli: &Cli, args: &GetArgs) -> Result<()> {
    let config = cli.open(false)?;
    match config.get_path(&args.path)? {
        Value::Node(node) => print!("{}", cli.format().encode(node)?),
        other => println!("{}", other),
    }
    Ok(())
}

pub fn run_paths(cli: &Cli) -> Result<()> {
    let config = cli.open(false)?;
    for (tier, path) in config.paths().tiers() {
        let marker = if config.loaded_files().contains(&path) {
            "loaded"
        } else if path.exists() {
            "skipped"
        } else {
            "missing"
        };
        println!("{:<12} {:<8} {}", tier.to_string(), marker, path.display());
    }
    println!("save target: {}", config.paths().save_target().display());
    Ok(())
}
