//! Loads the fragments of a group into the host environment.
//!
//! Files are memoized by absolute path for the whole session, so a helper listed
//! by several groups runs once. Missing files are skipped and failing files are
//! recorded; neither stops the rest of the group from loading.

use std::path::{Path, PathBuf};

use crate::error::FragmentError;
use crate::registry::{GroupId, ModuleDescriptor, ModuleRegistry};
use crate::session::{FileRecord, LoadLedger};

/// Setup hook declared by a fragment, run after its group finished loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupHook {
    pub command: String,
    pub args: Vec<String>,
}

/// What a fragment declared while it executed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FragmentExports {
    pub hooks: Vec<SetupHook>,
}

/// The environment fragments are loaded into.
pub trait FragmentHost {
    fn ledger(&mut self) -> &mut LoadLedger;

    /// Execute the top-level content of the fragment at `path`, making its
    /// definitions visible to later command resolution.
    fn execute_fragment(&mut self, path: &Path) -> Result<FragmentExports, FragmentError>;

    fn run_setup_hook(&mut self, hook: &SetupHook) -> Result<(), FragmentError>;
}

/// Per-call counters. Memoized files count with their recorded outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl LoadReport {
    fn count(&mut self, record: FileRecord) {
        match record {
            FileRecord::Loaded => self.loaded += 1,
            FileRecord::Failed => self.failed += 1,
            FileRecord::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FragmentLoader<'a> {
    registry: &'a ModuleRegistry,
    base_dir: &'a Path,
}

impl<'a> FragmentLoader<'a> {
    pub fn new(registry: &'a ModuleRegistry, base_dir: &'a Path) -> Self {
        Self { registry, base_dir }
    }

    pub fn load_group<H: FragmentHost + ?Sized>(&self, host: &mut H, group: &GroupId) -> LoadReport {
        self.load_collecting_hooks(host, group, &mut Vec::new())
    }

    /// Load `group`, appending hooks declared by fragments that executed during
    /// this call to `hooks`.
    pub(crate) fn load_collecting_hooks<H: FragmentHost + ?Sized>(
        &self,
        host: &mut H,
        group: &GroupId,
        hooks: &mut Vec<SetupHook>,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for descriptor in self.registry.resolve(group) {
            let path = self.absolute_path(descriptor);

            if let Some(record) = host.ledger().file(&path) {
                report.count(record);
                continue;
            }

            // The file's own top-level code led back here through another group.
            if host.ledger().is_executing(&path) {
                tracing::trace!(%group, path = %path.display(), "fragment already executing");
                report.loaded += 1;
                continue;
            }

            if !path.exists() {
                tracing::debug!(%group, path = %path.display(), "fragment missing, skipped");
                host.ledger().record_file(path, FileRecord::Skipped);
                report.skipped += 1;
                continue;
            }

            host.ledger().begin_execution(&path);
            let outcome = host.execute_fragment(&path);
            host.ledger().end_execution(&path);

            match outcome {
                Ok(exports) => {
                    tracing::trace!(%group, path = %path.display(), "fragment loaded");
                    hooks.extend(exports.hooks);
                    host.ledger().record_file(path, FileRecord::Loaded);
                    report.loaded += 1;
                }
                Err(err) => {
                    tracing::debug!(%group, path = %path.display(), error = %err, "fragment failed to load");
                    host.ledger().record_file(path, FileRecord::Failed);
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn absolute_path(&self, descriptor: &ModuleDescriptor) -> PathBuf {
        let joined = descriptor.path_under(self.base_dir);
        std::path::absolute(&joined).unwrap_or(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, FragmentTree, group};

    #[test]
    fn missing_file_is_skipped_and_present_file_loaded() {
        let tree = FragmentTree::new();
        tree.write("tools/present.sh", "define present");
        let catalog = tree.catalog(&[group("tools", &["tools/present.sh", "tools/absent.sh"], &[])]);
        let mut host = FakeHost::default();

        let report = FragmentLoader::new(&catalog.modules, tree.root()).load_group(&mut host, &"tools".into());

        assert_eq!(
            report,
            LoadReport {
                loaded: 1,
                failed: 0,
                skipped: 1
            }
        );
        assert!(host.defined.contains("present"));
    }

    #[test]
    fn failing_file_does_not_abort_batch() {
        let tree = FragmentTree::new();
        tree.write("a.sh", "define a");
        tree.write("b.sh", "define b\nfail\ndefine never");
        tree.write("c.sh", "define c");
        let catalog = tree.catalog(&[group("g", &["a.sh", "b.sh", "c.sh"], &[])]);
        let mut host = FakeHost::default();

        let report = FragmentLoader::new(&catalog.modules, tree.root()).load_group(&mut host, &"g".into());

        assert_eq!((report.loaded, report.failed, report.skipped), (2, 1, 0));
        assert!(host.defined.contains("a"));
        assert!(host.defined.contains("c"));
        assert!(!host.defined.contains("never"));
        assert_eq!(host.ledger.file(&tree.path("b.sh")), Some(FileRecord::Failed));
    }

    #[test]
    fn second_load_reuses_records() {
        let tree = FragmentTree::new();
        tree.write("a.sh", "define a");
        tree.write("b.sh", "fail");
        let catalog = tree.catalog(&[group("g", &["a.sh", "b.sh", "gone.sh"], &[])]);
        let loader = FragmentLoader::new(&catalog.modules, tree.root());
        let mut host = FakeHost::default();

        let first = loader.load_group(&mut host, &"g".into());
        let second = loader.load_group(&mut host, &"g".into());

        assert_eq!(first, second);
        assert_eq!(host.executions(&tree.path("a.sh")), 1);
        assert_eq!(host.executions(&tree.path("b.sh")), 1);
    }

    #[test]
    fn missing_file_stays_skipped_for_the_session() {
        let tree = FragmentTree::new();
        let catalog = tree.catalog(&[group("g", &["late.sh"], &[])]);
        let loader = FragmentLoader::new(&catalog.modules, tree.root());
        let mut host = FakeHost::default();

        assert_eq!(loader.load_group(&mut host, &"g".into()).skipped, 1);
        tree.write("late.sh", "define late");
        assert_eq!(loader.load_group(&mut host, &"g".into()).skipped, 1);
        assert!(!host.defined.contains("late"));
    }

    #[test]
    fn hooks_are_collected_only_from_fresh_executions() {
        let tree = FragmentTree::new();
        tree.write("a.sh", "define a\nhook a-setup");
        let catalog = tree.catalog(&[group("g", &["a.sh"], &[])]);
        let loader = FragmentLoader::new(&catalog.modules, tree.root());
        let mut host = FakeHost::default();

        let mut hooks = Vec::new();
        loader.load_collecting_hooks(&mut host, &"g".into(), &mut hooks);
        loader.load_collecting_hooks(&mut host, &"g".into(), &mut hooks);

        assert_eq!(
            hooks,
            [SetupHook {
                command: "a-setup".to_string(),
                args: Vec::new()
            }]
        );
    }

    #[test]
    fn unknown_group_loads_nothing() {
        let tree = FragmentTree::new();
        let catalog = tree.catalog(&[]);
        let mut host = FakeHost::default();

        let report = FragmentLoader::new(&catalog.modules, tree.root()).load_group(&mut host, &"nope".into());

        assert_eq!(report, LoadReport::default());
    }
}
