//! Application configuration engine.
//!
//! Loads configuration from a cascade of files (site, user, and files named
//! by `<NAME>_CONFIG_FILE`), merges them into one ordered tree, and saves
//! changes back to the user's config file.
//!
//! Later sources override earlier ones key by key. A later source can also
//! patch list values in place with a one-key directive mapping:
//! `$append`, `$extend`, `$insert`, `$extendleft` or `$remove`.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod loader;
pub mod merge;
pub mod paths;
pub mod value;

pub use config::{Config, ConfigOptions, DEFAULT_FILE_MODE};
pub use error::{ConfigError, Result};
pub use format::Format;
pub use loader::{LoadReport, SourceLoader};
pub use merge::{Directive, MergeReport, merge, merge_all};
pub use paths::{ConfigPaths, ConfigTier};
pub use value::{Node, Value};
