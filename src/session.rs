//! Per-session mutable state of the fragment engine.
//!
//! Everything here lives exactly as long as the [`Session`] that owns it;
//! creating a fresh session is the only way to start over.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::probe::CachedCommandProbe;
use crate::registry::GroupId;

/// Load progress of a group. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    /// Terminal. Means "attempted", not "every module succeeded".
    Loaded,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadState::NotLoaded => "not loaded",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
        })
    }
}

/// Outcome of one fragment file, shared by every group that lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRecord {
    Loaded,
    Failed,
    Skipped,
}

/// Group states and per-file records.
#[derive(Debug, Default)]
pub struct LoadLedger {
    groups: HashMap<GroupId, LoadState>,
    files: HashMap<PathBuf, FileRecord>,
    executing: HashSet<PathBuf>,
}

impl LoadLedger {
    pub fn state(&self, group: &GroupId) -> LoadState {
        self.groups.get(group).copied().unwrap_or_default()
    }

    /// Move `group` to `next`. Backward transitions are ignored.
    pub fn advance(&mut self, group: &GroupId, next: LoadState) {
        let current = self.groups.entry(group.clone()).or_default();
        if rank(next) > rank(*current) {
            *current = next;
        } else {
            tracing::warn!(%group, from = %current, to = %next, "ignored load state regression");
        }
    }

    pub fn file(&self, path: &Path) -> Option<FileRecord> {
        self.files.get(path).copied()
    }

    /// Store the outcome of `path`. The first record wins.
    pub fn record_file(&mut self, path: PathBuf, record: FileRecord) {
        self.files.entry(path).or_insert(record);
    }

    pub fn is_executing(&self, path: &Path) -> bool {
        self.executing.contains(path)
    }

    pub(crate) fn begin_execution(&mut self, path: &Path) {
        self.executing.insert(path.to_path_buf());
    }

    pub(crate) fn end_execution(&mut self, path: &Path) {
        self.executing.remove(path);
    }

    /// Groups that have been referenced at least once, with their state.
    pub fn groups(&self) -> impl Iterator<Item = (&GroupId, LoadState)> {
        self.groups.iter().map(|(group, state)| (group, *state))
    }
}

fn rank(state: LoadState) -> u8 {
    match state {
        LoadState::NotLoaded => 0,
        LoadState::Loading => 1,
        LoadState::Loaded => 2,
    }
}

/// Session context: load ledger and probe cache, owned by the interpreter.
#[derive(Default)]
pub struct Session {
    pub ledger: LoadLedger,
    pub probe: CachedCommandProbe,
}

impl Session {
    pub fn new(probe: CachedCommandProbe) -> Self {
        Self {
            ledger: LoadLedger::default(),
            probe,
        }
    }
}
