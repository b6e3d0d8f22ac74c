//! CLI command definitions for tweak
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod edit;
pub mod inspect;

use crate::config::{Config, ConfigOptions};
use crate::format::Format;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edit::{MergeArgs, SetArgs, UnsetArgs};
use inspect::{GetArgs, ShowArgs};

/// Inspect and edit layered application configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Application name; selects the config directory and the
    /// `<NAME>_CONFIG_FILE` variable
    #[arg(short, long, global = true, default_value = "tweak")]
    pub app: String,

    /// Use YAML (`config.yml`) instead of JSON (`config.json`)
    #[arg(long, global = true)]
    pub yaml: bool,

    /// Expand top-level `include` keys while loading
    #[arg(long, global = true)]
    pub include: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged configuration
    Show(ShowArgs),

    /// Print one value by dotted path
    Get(GetArgs),

    /// Set a value by dotted path and save
    Set(SetArgs),

    /// Remove a value by dotted path and save
    Unset(UnsetArgs),

    /// Merge a file into the configuration (directives included) and save
    Merge(MergeArgs),

    /// List the cascade of config files and which of them exist
    Paths,
}

impl Cli {
    pub fn format(&self) -> Format {
        if self.yaml { Format::Yaml } else { Format::Json }
    }

    /// Options for opening the configuration. Read-only commands never
    /// write the file back.
    pub fn options(&self, writes: bool) -> ConfigOptions {
        ConfigOptions::default()
            .with_format(self.format())
            .with_includes(self.include)
            .with_save_on_exit(writes)
    }

    pub fn open(&self, writes: bool) -> Result<Config> {
        let config = Config::open(&self.app, self.options(writes))
            .with_context(|| format!("Failed to open configuration for '{}'", self.app))?;
        for issue in config.issues() {
            eprintln!("warning: {}", issue);
        }
        Ok(config)
    }
}

/// Run the parsed command.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Show(args) => inspect::run_show(cli, args),
        Command::Get(args) => inspect::run_get(cli, args),
        Command::Paths => inspect::run_paths(cli),
        Command::Set(args) => edit::run_set(cli, args),
        Command::Unset(args) => edit::run_unset(cli, args),
        Command::Merge(args) => edit::run_merge(cli, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["tweak", "--app", "demo", "--yaml", "get", "server.port"]);
        assert_eq!(cli.app, "demo");
        assert_eq!(cli.format(), Format::Yaml);
        assert!(matches!(cli.command, Command::Get(ref args) if args.path == "server.port"));
    }

    #[test]
    fn test_read_only_commands_do_not_save() {
        let cli = Cli::parse_from(["tweak", "show"]);
        assert!(!cli.options(false).save_on_exit);
        assert!(cli.options(true).save_on_exit);
        assert!(!cli.options(true).include);
    }
}
