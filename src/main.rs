//! tweak command-line tool
//!
//! Shows and edits the layered configuration of an application.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{Level, Subscriber};
use tracing_subscriber::FmtSubscriber;
use tweak::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_logging(&cli.log, level)?;

    cli::run(&cli)
}

/// Route diagnostics for `--log`: `0`/`off`, `1`/`stdout`, `2`/`stderr`,
/// or a file path opened for appending.
fn init_logging(target: &str, level: Level) -> Result<()> {
    let builder = FmtSubscriber::builder().with_max_level(level);
    match target {
        "0" | "off" => Ok(()),
        "1" | "stdout" => install(builder.with_writer(std::io::stdout).finish()),
        "2" | "stderr" => install(builder.with_writer(std::io::stderr).finish()),
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            install(
                builder
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .finish(),
            )
        }
    }
}

fn install(subscriber: impl Subscriber + Send + Sync + 'static) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
