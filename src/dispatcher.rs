//! Fallback for names that ordinary command resolution could not find.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::command::ExitCode;
use crate::error::ShellError;
use crate::initializer::{CapabilityInitializer, EnsureOutcome};
use crate::loader::{FragmentHost, FragmentLoader};
use crate::registry::{FragmentCatalog, GroupId};

/// A [`FragmentHost`] that can also resolve and run commands.
pub trait DispatchHost: FragmentHost {
    /// Run `name` through ordinary resolution only, without falling back to
    /// the dispatcher. `Ok(None)` means nothing answered to the name.
    fn try_invoke(&mut self, name: &str, args: &[&str]) -> anyhow::Result<Option<ExitCode>>;
}

/// Loads the group owning an unresolved command, then retries it once.
///
/// Cheap to clone; hosts clone it out of themselves before dispatching so the
/// host can be borrowed mutably for the duration of the load.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    catalog: Rc<FragmentCatalog>,
    base_dir: PathBuf,
}

impl CommandDispatcher {
    pub fn new(catalog: Rc<FragmentCatalog>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            base_dir: base_dir.into(),
        }
    }

    pub fn catalog(&self) -> &FragmentCatalog {
        &self.catalog
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn initializer(&self) -> CapabilityInitializer<'_> {
        CapabilityInitializer::new(FragmentLoader::new(&self.catalog.modules, &self.base_dir))
    }

    pub fn ensure<H: FragmentHost + ?Sized>(&self, host: &mut H, group: &GroupId) -> EnsureOutcome {
        self.initializer().ensure(host, group)
    }

    /// Handle a failed resolution of `name`.
    ///
    /// Unmapped names fail straight away with [`ShellError::CommandNotFound`].
    /// Mapped names get their group ensured and exactly one more resolution
    /// attempt; if that attempt also misses, the error is the same
    /// `CommandNotFound` an unmapped name produces.
    pub fn dispatch<H: DispatchHost + ?Sized>(
        &self,
        host: &mut H,
        name: &str,
        args: &[&str],
    ) -> anyhow::Result<ExitCode> {
        self.dispatch_with(host, name, args, |host, name, args| host.try_invoke(name, args))
    }

    /// [`dispatch`](Self::dispatch) with `retry` as the single resolution
    /// attempt after the load, for hosts whose resolution depends on the
    /// caller's context.
    pub fn dispatch_with<H, F>(
        &self,
        host: &mut H,
        name: &str,
        args: &[&str],
        retry: F,
    ) -> anyhow::Result<ExitCode>
    where
        H: FragmentHost + ?Sized,
        F: FnOnce(&mut H, &str, &[&str]) -> anyhow::Result<Option<ExitCode>>,
    {
        let Some(group) = self.catalog.commands.lookup(name) else {
            return Err(ShellError::CommandNotFound(name.to_string()).into());
        };

        self.ensure(host, group);

        match retry(host, name, args)? {
            Some(code) => Ok(code),
            None => {
                tracing::debug!(command = name, %group, "group loaded but command still unresolved");
                Err(ShellError::CommandNotFound(name.to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LoadState;
    use crate::testing::{FakeHost, FragmentTree, group};

    fn not_found(err: &anyhow::Error) -> Option<&str> {
        match err.downcast_ref::<ShellError>() {
            Some(ShellError::CommandNotFound(name)) => Some(name),
            _ => None,
        }
    }

    #[test]
    fn unmapped_name_is_not_found_without_loading() {
        let tree = FragmentTree::new();
        tree.write("git.sh", "define gst");
        let catalog = tree.catalog(&[group("git", &["git.sh"], &["gst"])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        let err = dispatcher.dispatch(&mut host, "gts", &[]).unwrap_err();

        assert_eq!(not_found(&err), Some("gts"));
        assert_eq!(host.total_executions(), 0);
        assert_eq!(host.ledger.state(&"git".into()), LoadState::NotLoaded);
    }

    #[test]
    fn mapped_name_loads_group_and_forwards_args_verbatim() {
        let tree = FragmentTree::new();
        tree.write("tools.sh", "define toolwrapper");
        let catalog = tree.catalog(&[group("tools", &["tools.sh"], &["toolwrapper"])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        let code = dispatcher
            .dispatch(&mut host, "toolwrapper", &["--flag", "value"])
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(
            host.invocations,
            [(
                "toolwrapper".to_string(),
                vec!["--flag".to_string(), "value".to_string()]
            )]
        );
        assert_eq!(host.lookups, 1);
    }

    #[test]
    fn stale_mapping_retries_once_then_not_found() {
        let tree = FragmentTree::new();
        tree.write("tools.sh", "define other");
        let catalog = tree.catalog(&[group("tools", &["tools.sh"], &["phantom"])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        let err = dispatcher.dispatch(&mut host, "phantom", &[]).unwrap_err();

        assert_eq!(not_found(&err), Some("phantom"));
        assert_eq!(err.to_string(), "command not found: phantom");
        assert_eq!(host.lookups, 1);
        assert_eq!(host.ledger.state(&"tools".into()), LoadState::Loaded);
    }

    #[test]
    fn custom_retry_replaces_ordinary_resolution() {
        let tree = FragmentTree::new();
        tree.write("tools.sh", "define toolwrapper");
        let catalog = tree.catalog(&[group("tools", &["tools.sh"], &["toolwrapper"])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        let mut retries = 0;
        let err = dispatcher
            .dispatch_with(&mut host, "toolwrapper", &[], |_, _, _| {
                retries += 1;
                Ok(None)
            })
            .unwrap_err();

        assert_eq!(not_found(&err), Some("toolwrapper"));
        assert_eq!(retries, 1);
        assert_eq!(host.lookups, 0);
        assert_eq!(host.ledger.state(&"tools".into()), LoadState::Loaded);
    }

    #[test]
    fn group_without_modules_falls_through() {
        let tree = FragmentTree::new();
        let catalog = tree.catalog(&[group("ghost", &[], &["boo"])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        let err = dispatcher.dispatch(&mut host, "boo", &[]).unwrap_err();

        assert_eq!(not_found(&err), Some("boo"));
    }

    #[test]
    fn shared_helper_executes_once_across_groups() {
        let tree = FragmentTree::new();
        tree.write("common/helper.sh", "define helper");
        tree.write("git.sh", "define gst");
        tree.write("node.sh", "define nr");
        let catalog = tree.catalog(&[
            group("git", &["common/helper.sh", "git.sh"], &["gst"]),
            group("node", &["common/helper.sh", "node.sh"], &["nr"]),
        ]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        dispatcher.dispatch(&mut host, "gst", &[]).unwrap();
        dispatcher.dispatch(&mut host, "nr", &[]).unwrap();

        assert_eq!(host.executions(&tree.path("common/helper.sh")), 1);
        assert_eq!(host.executions(&tree.path("git.sh")), 1);
        assert_eq!(host.executions(&tree.path("node.sh")), 1);
    }

    #[test]
    fn reentrant_dispatch_from_fragment_terminates() {
        let tree = FragmentTree::new();
        // The fragment calls a command of its own group before defining it.
        tree.write("loop.sh", "run late\ndefine late");
        let catalog = tree.catalog(&[group("loop", &["loop.sh"], &["late"])]);
        let mut host = FakeHost::with_dispatcher(&tree, &catalog);
        let dispatcher = host.dispatcher();

        let code = dispatcher.dispatch(&mut host, "late", &["x"]).unwrap();

        assert_eq!(code, 0);
        assert_eq!(host.nested_dispatch_failures, ["late"]);
        assert_eq!(host.executions(&tree.path("loop.sh")), 1);
    }
}
