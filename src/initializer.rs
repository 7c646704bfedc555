//! Once-per-session group initialization ("ensure").

use crate::loader::{FragmentHost, FragmentLoader, LoadReport};
use crate::registry::GroupId;
use crate::session::LoadState;

/// What [`CapabilityInitializer::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The group was attempted earlier in this session.
    AlreadyLoaded,
    /// Reentrant call made while the group is still loading.
    InProgress,
    /// This call loaded the group.
    Loaded(LoadReport),
}

#[derive(Debug, Clone, Copy)]
pub struct CapabilityInitializer<'a> {
    loader: FragmentLoader<'a>,
}

impl<'a> CapabilityInitializer<'a> {
    pub fn new(loader: FragmentLoader<'a>) -> Self {
        Self { loader }
    }

    /// Load `group` unless it was already attempted, then run the setup hooks
    /// its freshly executed fragments declared.
    ///
    /// The group ends up `Loaded` whatever happened to its fragments and is not
    /// retried later in the session.
    pub fn ensure<H: FragmentHost + ?Sized>(&self, host: &mut H, group: &GroupId) -> EnsureOutcome {
        match host.ledger().state(group) {
            LoadState::Loaded => return EnsureOutcome::AlreadyLoaded,
            LoadState::Loading => {
                tracing::trace!(%group, "reentrant ensure ignored");
                return EnsureOutcome::InProgress;
            }
            LoadState::NotLoaded => {}
        }

        host.ledger().advance(group, LoadState::Loading);

        let mut hooks = Vec::new();
        let report = self.loader.load_collecting_hooks(host, group, &mut hooks);

        for hook in &hooks {
            if let Err(err) = host.run_setup_hook(hook) {
                tracing::debug!(%group, error = %err, "setup hook failed");
            }
        }

        host.ledger().advance(group, LoadState::Loaded);
        tracing::debug!(
            %group,
            loaded = report.loaded,
            failed = report.failed,
            skipped = report.skipped,
            "group initialized"
        );
        EnsureOutcome::Loaded(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SetupHook;
    use crate::testing::{FakeHost, FragmentTree, group};

    #[test]
    fn ensure_twice_executes_each_module_once() {
        let tree = FragmentTree::new();
        tree.write("m1.sh", "define one");
        tree.write("m2.sh", "define two");
        tree.write("m3.sh", "define three");
        let catalog = tree.catalog(&[group("g", &["m1.sh", "m2.sh", "m3.sh"], &[])]);
        let init = CapabilityInitializer::new(FragmentLoader::new(&catalog.modules, tree.root()));
        let mut host = FakeHost::default();

        assert!(matches!(init.ensure(&mut host, &"g".into()), EnsureOutcome::Loaded(_)));
        assert_eq!(init.ensure(&mut host, &"g".into()), EnsureOutcome::AlreadyLoaded);

        for file in ["m1.sh", "m2.sh", "m3.sh"] {
            assert_eq!(host.executions(&tree.path(file)), 1, "{file}");
        }
    }

    #[test]
    fn ensure_reports_missing_and_present_modules() {
        let tree = FragmentTree::new();
        tree.write("here.sh", "define here");
        let catalog = tree.catalog(&[group("g", &["missing.sh", "here.sh"], &[])]);
        let init = CapabilityInitializer::new(FragmentLoader::new(&catalog.modules, tree.root()));
        let mut host = FakeHost::default();

        let outcome = init.ensure(&mut host, &"g".into());

        assert_eq!(
            outcome,
            EnsureOutcome::Loaded(LoadReport {
                loaded: 1,
                failed: 0,
                skipped: 1
            })
        );
    }

    #[test]
    fn failing_module_still_marks_group_loaded() {
        let tree = FragmentTree::new();
        tree.write("bad.sh", "fail");
        tree.write("good.sh", "define good");
        let catalog = tree.catalog(&[group("g", &["bad.sh", "good.sh"], &[])]);
        let init = CapabilityInitializer::new(FragmentLoader::new(&catalog.modules, tree.root()));
        let mut host = FakeHost::default();

        init.ensure(&mut host, &"g".into());

        assert_eq!(host.ledger.state(&"g".into()), LoadState::Loaded);
        assert!(host.defined.contains("good"));
        assert_eq!(init.ensure(&mut host, &"g".into()), EnsureOutcome::AlreadyLoaded);
        assert_eq!(host.executions(&tree.path("bad.sh")), 1);
    }

    #[test]
    fn reentrant_ensure_is_a_no_op() {
        let tree = FragmentTree::new();
        tree.write("self.sh", "define before\nensure g\ndefine after");
        let catalog = tree.catalog(&[group("g", &["self.sh"], &[])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);

        let dispatcher = host.dispatcher();
        let outcome = dispatcher.ensure(&mut host, &"g".into());

        assert!(matches!(outcome, EnsureOutcome::Loaded(r) if r.loaded == 1));
        assert_eq!(host.nested_ensures, [EnsureOutcome::InProgress]);
        assert!(host.defined.contains("after"));
        assert_eq!(host.executions(&tree.path("self.sh")), 1);
    }

    #[test]
    fn hooks_run_once_and_only_for_loaded_modules() {
        let tree = FragmentTree::new();
        tree.write("a.sh", "define a\nhook setup-a --fast");
        tree.write("b.sh", "hook setup-b\nfail");
        tree.write("c.sh", "define c");
        let catalog = tree.catalog(&[group("g", &["a.sh", "b.sh", "c.sh"], &[])]);
        let init = CapabilityInitializer::new(FragmentLoader::new(&catalog.modules, tree.root()));
        let mut host = FakeHost::default();

        init.ensure(&mut host, &"g".into());
        init.ensure(&mut host, &"g".into());

        assert_eq!(
            host.hooks_run,
            [SetupHook {
                command: "setup-a".to_string(),
                args: vec!["--fast".to_string()]
            }]
        );
    }

    #[test]
    fn failing_hook_is_contained() {
        let tree = FragmentTree::new();
        tree.write("a.sh", "hook broken\ndefine a");
        let catalog = tree.catalog(&[group("g", &["a.sh"], &[])]);
        let init = CapabilityInitializer::new(FragmentLoader::new(&catalog.modules, tree.root()));
        let mut host = FakeHost::default();
        host.failing_hooks.insert("broken".to_string());

        let outcome = init.ensure(&mut host, &"g".into());

        assert!(matches!(outcome, EnsureOutcome::Loaded(r) if r.loaded == 1));
        assert_eq!(host.ledger.state(&"g".into()), LoadState::Loaded);
    }
}
