//! Cascade loading with include expansion.
//!
//! Files are read in order and merged into one shared root node. Loading is
//! best-effort: a missing, unreadable or malformed file is skipped and the
//! cascade carries on. Everything skipped, apart from files that simply do
//! not exist, ends up in the [`LoadReport`].
//!
//! When includes are enabled, a top-level `include` key names glob patterns
//! relative to the including file. Matched files are loaded depth-first
//! before the rest of the including file is merged, so the including file
//! wins over its fragments.

use crate::error::{ConfigError, Result};
use crate::format::Format;
use crate::merge::merge;
use crate::value::{Node, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reserved top-level key listing files to include.
pub const INCLUDE_KEY: &str = "include";

/// Outcome of loading a cascade.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Files that were parsed and merged, in merge order
    pub loaded: Vec<PathBuf>,
    /// Problems that were skipped
    pub issues: Vec<ConfigError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn skip(&mut self, err: ConfigError) {
        if err.is_not_found() {
            debug!("Skipping config source: {}", err);
        } else {
            warn!("Skipping config source: {}", err);
            self.issues.push(err);
        }
    }
}

/// Reads configuration files and folds them into a root node.
#[derive(Debug, Clone, Copy)]
pub struct SourceLoader {
    format: Format,
    includes: bool,
}

impl SourceLoader {
    /// Create a loader for `format` with include expansion disabled.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            includes: false,
        }
    }

    /// Enable or disable `include` expansion.
    pub fn with_includes(mut self, enabled: bool) -> Self {
        self.includes = enabled;
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Open and parse a single file.
    pub fn read(&self, path: &Path) -> Result<Node> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        self.format.decode(&text, path)
    }

    /// Load every path in order, merging each into `root`.
    pub fn load_all<I>(&self, paths: I, root: &mut Node) -> LoadReport
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let mut report = LoadReport::default();
        let mut active = Vec::new();
        for path in paths {
            self.load_file(path.as_ref(), root, &mut active, &mut report);
        }
        report
    }

    /// Load one file. `active` holds the chain of files currently being
    /// included, to break cycles.
    fn load_file(
        &self,
        path: &Path,
        root: &mut Node,
        active: &mut Vec<PathBuf>,
        report: &mut LoadReport,
    ) {
        let identity = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if active.contains(&identity) {
            report.skip(ConfigError::IncludeCycle(path.to_path_buf()));
            return;
        }

        let mut contents = match self.read(path) {
            Ok(contents) => contents,
            Err(err) => {
                report.skip(err);
                return;
            }
        };

        if self.includes
            && let Ok(include) = contents.remove(INCLUDE_KEY)
        {
            active.push(identity);
            for pattern in include_patterns(include, path, report) {
                for matched in expand_pattern(&pattern, path, report) {
                    self.load_file(&matched, root, active, report);
                }
            }
            active.pop();
        }

        let merged = merge(root, contents);
        report.issues.extend(merged.errors);
        debug!("Loaded config file {}", path.display());
        report.loaded.push(path.to_path_buf());
    }
}

/// Normalize an `include` value to a list of patterns. A single string is a
/// one-pattern list; anything that is not a string is reported and dropped.
fn include_patterns(include: Value, path: &Path, report: &mut LoadReport) -> Vec<String> {
    let items = match include {
        Value::String(pattern) => return vec![pattern],
        Value::Sequence(items) => items,
        other => {
            report.skip(ConfigError::parse(
                path,
                format!("'{INCLUDE_KEY}' must be a string or a list of strings, found a {}", other.kind()),
            ));
            return Vec::new();
        }
    };

    let mut patterns = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(pattern) => patterns.push(pattern),
            other => report.skip(ConfigError::parse(
                path,
                format!("'{INCLUDE_KEY}' entries must be strings, found a {}", other.kind()),
            )),
        }
    }
    patterns
}

/// Expand one pattern relative to the directory of `including`. Matches are
/// returned in the glob crate's sorted order.
fn expand_pattern(pattern: &str, including: &Path, report: &mut LoadReport) -> Vec<PathBuf> {
    let full = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        let base = including.parent().unwrap_or_else(|| Path::new(""));
        // The directory itself may contain glob metacharacters
        PathBuf::from(glob::Pattern::escape(&base.to_string_lossy())).join(pattern)
    };

    let entries = match glob::glob(&full.to_string_lossy()) {
        Ok(entries) => entries,
        Err(e) => {
            report.skip(ConfigError::parse(
                including,
                format!("invalid include pattern '{pattern}': {e}"),
            ));
            return Vec::new();
        }
    };

    let mut matches = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => matches.push(path),
            Err(e) => {
                let path = e.path().to_path_buf();
                report.skip(ConfigError::SourceUnavailable {
                    path,
                    source: e.into_error(),
                });
            }
        }
    }
    if matches.is_empty() {
        debug!("Include pattern '{}' matched no files", pattern);
    }
    matches
}
