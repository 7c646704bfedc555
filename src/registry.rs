//! Static tables describing which fragments make up a group and which group
//! owns which command.
//!
//! Both tables are built once (see [`crate::manifest`]) and are read-only for the
//! rest of the session. They are handed around as a shared [`FragmentCatalog`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of a capability group, e.g. `git` or `node`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One fragment file belonging to a group, located relative to the fragment root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    group: GroupId,
    dir_segments: Vec<String>,
    file_name: String,
}

impl ModuleDescriptor {
    pub fn new(group: GroupId, dir_segments: Vec<String>, file_name: impl Into<String>) -> Self {
        Self {
            group,
            dir_segments,
            file_name: file_name.into(),
        }
    }

    /// Parse a `/`-separated relative path such as `vcs/git.sh`.
    ///
    /// Returns `None` for absolute paths, empty segments and `.`/`..` segments:
    /// fragments always live below the fragment root.
    pub fn parse(group: GroupId, relative: &str) -> Option<Self> {
        if relative.starts_with('/') || relative.contains('\\') {
            return None;
        }
        let mut segments: Vec<String> = Vec::new();
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return None;
            }
            segments.push(segment.to_string());
        }
        let file_name = segments.pop()?;
        Some(Self::new(group, segments, file_name))
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn dir_segments(&self) -> &[String] {
        &self.dir_segments
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Join the descriptor onto `base_dir`.
    pub fn path_under(&self, base_dir: &Path) -> PathBuf {
        let mut path = base_dir.to_path_buf();
        path.extend(&self.dir_segments);
        path.push(&self.file_name);
        path
    }
}

/// Group id to ordered module list.
#[derive(Debug, Default, Clone)]
pub struct ModuleRegistry {
    groups: HashMap<GroupId, Vec<ModuleDescriptor>>,
}

impl ModuleRegistry {
    pub fn new(groups: HashMap<GroupId, Vec<ModuleDescriptor>>) -> Self {
        Self { groups }
    }

    /// Modules of `group` in load order. Unknown groups have no modules.
    pub fn resolve(&self, group: &GroupId) -> &[ModuleDescriptor] {
        match self.groups.get(group) {
            Some(modules) => modules,
            None => {
                tracing::debug!(%group, "group has no registered modules");
                &[]
            }
        }
    }

    /// All group ids, sorted for stable listings.
    pub fn group_ids(&self) -> Vec<&GroupId> {
        let mut ids: Vec<&GroupId> = self.groups.keys().collect();
        ids.sort();
        ids
    }
}

/// Command name to the group that defines it.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, GroupId>,
}

impl CommandRegistry {
    pub fn new(commands: HashMap<String, GroupId>) -> Self {
        Self { commands }
    }

    pub fn lookup(&self, command: &str) -> Option<&GroupId> {
        self.commands.get(command)
    }

    /// Every mapping, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupId)> {
        self.commands
            .iter()
            .map(|(command, group)| (command.as_str(), group))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Both registries together, shared read-only by the dispatcher and its host.
#[derive(Debug, Default, Clone)]
pub struct FragmentCatalog {
    pub modules: ModuleRegistry,
    pub commands: CommandRegistry,
}

impl FragmentCatalog {
    pub fn new(modules: ModuleRegistry, commands: CommandRegistry) -> Self {
        Self { modules, commands }
    }
}
