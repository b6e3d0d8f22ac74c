//! Configuration file discovery.
//!
//! The cascade, lowest precedence first:
//! 1. **Site** - `/etc/<name>/config.<ext>`
//! 2. **User** - `<user config root>/<name>/config.<ext>`
//! 3. **Environment** - each path in `<NAME>_CONFIG_FILE`, colon separated
//!
//! ## Environment Variables
//! - `XDG_CONFIG_HOME` - User config root (default: platform config dir)
//! - `<NAME>_CONFIG_FILE` - Extra config files, e.g. `MYAPP_CONFIG_FILE`

use crate::format::Format;
use std::path::{Path, PathBuf};

/// Root directory for site-wide configuration.
pub const SITE_CONFIG_ROOT: &str = "/etc";

/// Configuration tier, lowest to highest precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Site-wide config (lowest priority)
    Site = 0,
    /// Per-user config, also the save target
    User = 1,
    /// Files named by the environment (highest priority)
    Environment = 2,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Site => write!(f, "site"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Candidate file paths for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Site-wide config file
    pub site: Option<PathBuf>,
    /// User config file; saves go here
    pub user: PathBuf,
    /// Extra files from `<NAME>_CONFIG_FILE`, in order
    pub extra: Vec<PathBuf>,
}

impl ConfigPaths {
    /// Discover paths from the process environment.
    pub fn discover(name: &str, format: Format) -> Self {
        Self::resolve(name, format, |key| std::env::var(key).ok())
    }

    /// Discover paths using `env` to look up environment variables.
    pub fn resolve(name: &str, format: Format, env: impl Fn(&str) -> Option<String>) -> Self {
        let file_name = format!("config.{}", format.extension());

        let site = Some(Path::new(SITE_CONFIG_ROOT).join(name).join(&file_name));

        // User root: XDG_CONFIG_HOME, else the platform config dir, else ~/.config
        let user_root = env("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"));
        let user = user_root.join(name).join(&file_name);

        let extra = env(&env_var_name(name))
            .map(|value| {
                value
                    .split(':')
                    .filter(|entry| !entry.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        Self { site, user, extra }
    }

    /// Create paths with explicit files.
    pub fn with_files(site: Option<PathBuf>, user: PathBuf, extra: Vec<PathBuf>) -> Self {
        Self { site, user, extra }
    }

    /// All candidate files, lowest precedence first.
    pub fn cascade(&self) -> Vec<PathBuf> {
        self.tiers().into_iter().map(|(_, path)| path).collect()
    }

    /// Candidate files paired with the tier they belong to.
    pub fn tiers(&self) -> Vec<(ConfigTier, PathBuf)> {
        let mut tiers = Vec::with_capacity(2 + self.extra.len());
        if let Some(ref site) = self.site {
            tiers.push((ConfigTier::Site, site.clone()));
        }
        tiers.push((ConfigTier::User, self.user.clone()));
        tiers.extend(
            self.extra
                .iter()
                .map(|path| (ConfigTier::Environment, path.clone())),
        );
        tiers
    }

    /// The writable user config file.
    pub fn save_target(&self) -> &Path {
        &self.user
    }
}

/// Name of the variable listing extra config files for `name`:
/// uppercased, with anything other than ASCII letters and digits mapped to
/// `_`, plus `_CONFIG_FILE`.
pub fn env_var_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}_CONFIG_FILE")
}
