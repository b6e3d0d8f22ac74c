//! The application configuration handle.
//!
//! A [`Config`] owns the merged tree for one application. It loads the
//! cascade on construction, exposes mapping-style access to the root, and
//! writes the tree back to the user's config file.
//!
//! ```no_run
//! use tweak::{Config, ConfigOptions};
//!
//! let mut config = Config::open("myapp", ConfigOptions::default())?;
//! config.set("host", "example.com")?;
//! config.set_path("nested.foo", true)?;
//! config.close()?; // saves; dropping the handle would too
//! # Ok::<(), tweak::ConfigError>(())
//! ```
//!
//! Persistence happens at three points, each opt-in through
//! [`ConfigOptions`]: after every write (`autosave`), on [`Config::close`],
//! and when the handle is dropped without being closed (`save_on_exit`).

use crate::error::{ConfigError, Result};
use crate::format::Format;
use crate::loader::SourceLoader;
use crate::merge::{MergeReport, merge, merge_all};
use crate::paths::ConfigPaths;
use crate::value::{Node, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Saved files are readable and writable by the owner only unless
/// [`ConfigOptions::with_file_mode`] says otherwise.
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Behaviour switches for a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigOptions {
    /// Save when the handle is closed or dropped.
    pub save_on_exit: bool,
    /// Save after every write through the handle.
    pub autosave: bool,
    /// File format, which also picks the file extension.
    pub format: Format,
    /// Expand top-level `include` keys while loading.
    pub include: bool,
    /// Write to a temporary sibling and rename it over the target.
    pub atomic_save: bool,
    /// Unix permission bits of the saved file.
    pub file_mode: u32,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            save_on_exit: true,
            autosave: false,
            format: Format::Json,
            include: false,
            atomic_save: false,
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl ConfigOptions {
    pub fn with_save_on_exit(mut self, enabled: bool) -> Self {
        self.save_on_exit = enabled;
        self
    }

    pub fn with_autosave(mut self, enabled: bool) -> Self {
        self.autosave = enabled;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Shorthand for choosing between YAML and JSON.
    pub fn with_yaml(self, yaml: bool) -> Self {
        self.with_format(if yaml { Format::Yaml } else { Format::Json })
    }

    pub fn with_includes(mut self, enabled: bool) -> Self {
        self.include = enabled;
        self
    }

    pub fn with_atomic_save(mut self, enabled: bool) -> Self {
        self.atomic_save = enabled;
        self
    }

    /// Permission bits applied to the file on every save. Ignored off Unix.
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }
}

/// Merged configuration for one application.
#[derive(Debug)]
pub struct Config {
    name: String,
    options: ConfigOptions,
    paths: ConfigPaths,
    root: Node,
    issues: Vec<ConfigError>,
    loaded: Vec<PathBuf>,
    closed: bool,
}

impl Config {
    /// Discover the cascade for `name` and load it.
    pub fn open(name: &str, options: ConfigOptions) -> Result<Self> {
        let paths = ConfigPaths::discover(name, options.format);
        Self::with_paths(name, options, paths)
    }

    /// Load an explicit cascade.
    ///
    /// Only a missing YAML codec is fatal; every other problem is collected
    /// in [`Config::issues`].
    pub fn with_paths(name: &str, options: ConfigOptions, paths: ConfigPaths) -> Result<Self> {
        options.format.ensure_available()?;

        let mut root = Node::new();
        let report = SourceLoader::new(options.format)
            .with_includes(options.include)
            .load_all(paths.cascade(), &mut root);
        debug!(
            "Loaded {} config file(s) for {} with {} issue(s)",
            report.loaded.len(),
            name,
            report.issues.len()
        );

        Ok(Self {
            name: name.to_string(),
            options,
            paths,
            root,
            issues: report.issues,
            loaded: report.loaded,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// The merged tree.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Problems skipped while loading the cascade.
    pub fn issues(&self) -> &[ConfigError] {
        &self.issues
    }

    /// Files merged while loading, in merge order.
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        self.root.get(key)
    }

    /// Read by dotted path, e.g. `"server.port"`.
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        self.root.get_path(path)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.root.keys()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let previous = self.root.set(key, value);
        self.autosave()?;
        Ok(previous)
    }

    /// Write by dotted path, creating intermediate mappings.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let previous = self.root.set_path(path, value)?;
        self.autosave()?;
        Ok(previous)
    }

    pub fn remove(&mut self, key: &str) -> Result<Value> {
        let removed = self.root.remove(key)?;
        self.autosave()?;
        Ok(removed)
    }

    pub fn remove_path(&mut self, path: &str) -> Result<Value> {
        let removed = self.root.remove_path(path)?;
        self.autosave()?;
        Ok(removed)
    }

    /// Mutate the tree directly, then autosave once.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Node) -> R) -> Result<R> {
        let result = f(&mut self.root);
        self.autosave()?;
        Ok(result)
    }

    /// Merge a mapping into the root, directives included.
    pub fn update(&mut self, updates: Node) -> Result<MergeReport> {
        let report = merge(&mut self.root, updates);
        self.autosave()?;
        Ok(report)
    }

    /// Merge several mappings, later ones overriding earlier ones at the
    /// top level before the merge.
    pub fn update_all(&mut self, sources: impl IntoIterator<Item = Node>) -> Result<MergeReport> {
        let report = merge_all(&mut self.root, sources);
        self.autosave()?;
        Ok(report)
    }

    /// Save to the user config file. Returns `false` if the file already
    /// held exactly this content.
    pub fn save(&self) -> Result<bool> {
        self.save_to(self.paths.save_target())
    }

    /// Save to an arbitrary path.
    pub fn save_to(&self, path: &Path) -> Result<bool> {
        let text = self.options.format.encode(&self.root)?;
        write_if_changed(path, text.as_bytes(), &self.options)
    }

    /// Flush and release the handle.
    ///
    /// Saves when `save_on_exit` is set and reports the outcome, which
    /// dropping cannot do.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        if self.options.save_on_exit {
            self.save()?;
        }
        Ok(())
    }

    fn autosave(&self) -> Result<()> {
        if self.options.autosave {
            self.save()?;
        }
        Ok(())
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        if self.closed || !self.options.save_on_exit {
            return;
        }
        if let Err(e) = self.save() {
            error!("Failed to save configuration for {}: {}", self.name, e);
        }
    }
}

/// Write `contents` to `path` unless the file already holds exactly those
/// bytes. The written file gets `options.file_mode`.
fn write_if_changed(path: &Path, contents: &[u8], options: &ConfigOptions) -> Result<bool> {
    if let Ok(existing) = std::fs::read(path)
        && existing == contents
    {
        debug!("Configuration at {} is unchanged", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        // create_dir_all already accepts a directory that exists
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }

    if options.atomic_save {
        let staging = staging_path(path);
        write_with_mode(&staging, contents, options.file_mode)?;
        if let Err(e) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(ConfigError::io(path, e));
        }
    } else {
        write_with_mode(path, contents, options.file_mode)?;
    }

    info!("Saved configuration to {}", path.display());
    Ok(true)
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(path).map_err(|e| ConfigError::io(path, e))?;
    file.write_all(contents)
        .map_err(|e| ConfigError::io(path, e))?;
    // The mode above only applies to newly created files, and is masked
    set_mode(path, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| ConfigError::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn temp_paths(temp: &TempDir) -> ConfigPaths {
        ConfigPaths::with_files(
            Some(temp.path().join("site/config.json")),
            temp.path().join("user/app/config.json"),
            Vec::new(),
        )
    }

    fn quiet() -> ConfigOptions {
        ConfigOptions::default().with_save_on_exit(false)
    }

    #[test]
    fn test_empty_cascade() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        assert!(config.is_empty());
        assert!(config.issues().is_empty());
        assert!(config.loaded_files().is_empty());
    }

    #[test]
    fn test_save_creates_dirs_and_skips_unchanged() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        config.set("host", "example.com").unwrap();

        assert!(config.save().unwrap());
        assert!(!config.save().unwrap());

        let written = std::fs::read_to_string(temp.path().join("user/app/config.json")).unwrap();
        assert!(written.contains("example.com"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("user/app/config.json");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "{}").unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        config.set("token", "secret").unwrap();
        config.save().unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_uses_configured_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("user/app/config.json");
        let options = quiet().with_file_mode(0o640);
        let mut config = Config::with_paths("app", options, temp_paths(&temp)).unwrap();
        config.set("shared", true).unwrap();
        config.save().unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(ConfigOptions::default().file_mode, 0o600);
    }

    #[cfg(not(feature = "yaml"))]
    #[test]
    fn test_yaml_without_codec_is_fatal() {
        let temp = TempDir::new().unwrap();
        let options = ConfigOptions::default().with_yaml(true);
        let result = Config::with_paths("app", options, temp_paths(&temp));
        assert!(matches!(result, Err(ConfigError::YamlUnsupported)));
    }

    #[test]
    fn test_autosave_on_every_write() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("user/app/config.json");
        let options = quiet().with_autosave(true);
        let mut config = Config::with_paths("app", options, temp_paths(&temp)).unwrap();

        config.set_path("nested.foo", true).unwrap();
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"nested": {"foo": true}}));

        config.edit(|root| root.set("extra", 1)).unwrap();
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"nested": {"foo": true}, "extra": 1}));
    }

    #[test]
    fn test_drop_saves_when_enabled() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("user/app/config.json");
        {
            let mut config =
                Config::with_paths("app", ConfigOptions::default(), temp_paths(&temp)).unwrap();
            config.set("port", 9000).unwrap();
        }
        assert!(target.exists());

        let reloaded = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        assert_eq!(reloaded.get("port").unwrap(), &Value::from(9000));
    }

    #[test]
    fn test_drop_does_not_save_when_disabled() {
        let temp = TempDir::new().unwrap();
        {
            let mut config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
            config.set("port", 9000).unwrap();
        }
        assert!(!temp.path().join("user/app/config.json").exists());
    }

    #[test]
    fn test_close_saves() {
        let temp = TempDir::new().unwrap();
        let mut config =
            Config::with_paths("app", ConfigOptions::default(), temp_paths(&temp)).unwrap();
        config.set("a", 1).unwrap();
        config.close().unwrap();
        assert!(temp.path().join("user/app/config.json").exists());
    }

    #[test]
    fn test_atomic_save_leaves_no_staging_file() {
        let temp = TempDir::new().unwrap();
        let options = quiet().with_atomic_save(true);
        let mut config = Config::with_paths("app", options, temp_paths(&temp)).unwrap();
        config.set("a", 1).unwrap();
        assert!(config.save().unwrap());

        let dir = temp.path().join("user/app");
        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["config.json".to_string()]);
    }

    #[test]
    fn test_save_fails_when_parent_is_a_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocker"), "").unwrap();
        let config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        let err = config.save_to(&temp.path().join("blocker/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_update_reports_directive_errors() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        config.set("list", vec![1]).unwrap();

        let updates = Node::try_from(json!({"list": {"$append": 2}, "gone": {"$remove": 1}})).unwrap();
        let report = config.update(updates).unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(config.root(), &json!({"list": [1, 2]}));
    }

    #[test]
    fn test_remove_missing_key() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_paths("app", quiet(), temp_paths(&temp)).unwrap();
        assert!(matches!(config.remove("nope"), Err(ConfigError::KeyNotFound(_))));
    }
}
