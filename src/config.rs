//! User configuration, read from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

const APP_DIR: &str = "shell-fragments";

/// Contents of `config.toml`. Every field is optional.
///
/// ```toml
/// fragment_root = "~/.config/shell-fragments/fragments"
/// eager_groups = ["git"]
/// startup = "startup.sh"
/// debug = false
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Directory module paths are resolved against.
    pub fragment_root: Option<PathBuf>,
    /// Manifest replacing the embedded one.
    pub manifest: Option<PathBuf>,
    /// Groups ensured at startup.
    pub eager_groups: Vec<String>,
    /// Script run once at startup, after the eager groups.
    pub startup: Option<PathBuf>,
    /// REPL history file.
    pub history: Option<PathBuf>,
    pub debug: bool,
}

impl ShellConfig {
    /// Load `path`. A missing file yields the defaults.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// `<config dir>/shell-fragments/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        app_dir().map(|dir| dir.join("config.toml"))
    }

    /// The configured fragment root, or `<config dir>/shell-fragments/fragments`.
    pub fn fragment_root(&self) -> PathBuf {
        self.fragment_root
            .clone()
            .or_else(|| app_dir().map(|dir| dir.join("fragments")))
            .unwrap_or_else(|| PathBuf::from("fragments"))
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.fragment_root,
            &mut self.manifest,
            &mut self.startup,
            &mut self.history,
        ]
        .into_iter()
        .flatten()
        {
            let expanded = expand_home(path);
            *path = base.join(expanded);
        }
    }
}

/// Fail when `root` is not a directory. Only the manifest is compiled in, so a
/// fresh install has no fragments until they are copied to the root.
pub fn check_fragment_root(root: &Path) -> Result<(), ConfigError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingFragmentRoot {
            path: root.to_path_buf(),
        })
    }
}

fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// Replace a leading `~` with the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
