//! Memoized "is this program installed" checks.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::external::find_command_path;

/// Finds an executable by name. Potentially expensive; [`CachedCommandProbe`]
/// calls it at most once per name.
pub trait CommandResolver {
    fn resolve(&self, name: &str, env: &Environment) -> Option<PathBuf>;
}

/// Resolves names against the session's `PATH`, like the external command factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathSearch;

impl CommandResolver for PathSearch {
    fn resolve(&self, name: &str, env: &Environment) -> Option<PathBuf> {
        let search_paths = env.get_var("PATH")?;
        find_command_path(OsStr::new(&search_paths), &env.current_dir, Path::new(name))
    }
}

/// Outcome of a probe. Written once per name and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub available: bool,
    pub path: Option<PathBuf>,
}

impl ProbeResult {
    fn from_path(path: Option<PathBuf>) -> Self {
        Self {
            available: path.is_some(),
            path,
        }
    }
}

/// Session-scoped cache in front of a [`CommandResolver`]. No eviction.
pub struct CachedCommandProbe {
    resolver: Box<dyn CommandResolver>,
    entries: HashMap<String, ProbeResult>,
}

impl CachedCommandProbe {
    pub fn new(resolver: Box<dyn CommandResolver>) -> Self {
        Self {
            resolver,
            entries: HashMap::new(),
        }
    }

    pub fn probe(&mut self, name: &str, env: &Environment) -> ProbeResult {
        if let Some(entry) = self.entries.get(name) {
            return entry.clone();
        }
        let result = ProbeResult::from_path(self.resolver.resolve(name, env));
        tracing::trace!(name, available = result.available, "probed command");
        self.entries.insert(name.to_string(), result.clone());
        result
    }

    /// The cached entry for `name`, without probing.
    pub fn cached(&self, name: &str) -> Option<&ProbeResult> {
        self.entries.get(name)
    }
}

impl Default for CachedCommandProbe {
    fn default() -> Self {
        Self::new(Box::new(PathSearch))
    }
}
