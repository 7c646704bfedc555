//! Test doubles for the fragment engine.
//!
//! [`FakeHost`] executes fragments written in a tiny line language instead of
//! shell syntax:
//!
//! * `define NAME` makes `NAME` resolvable
//! * `hook COMMAND [ARGS...]` declares a setup hook
//! * `fail` aborts the fragment with an error
//! * `ensure GROUP` calls ensure reentrantly
//! * `run NAME` resolves `NAME`, dispatching on a miss

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;

use crate::command::ExitCode;
use crate::dispatcher::{CommandDispatcher, DispatchHost};
use crate::error::FragmentError;
use crate::initializer::EnsureOutcome;
use crate::loader::{FragmentExports, FragmentHost, SetupHook};
use crate::registry::{CommandRegistry, FragmentCatalog, GroupId, ModuleDescriptor, ModuleRegistry};
use crate::session::LoadLedger;

pub(crate) struct TestGroup {
    name: String,
    modules: Vec<String>,
    commands: Vec<String>,
}

pub(crate) fn group(name: &str, modules: &[&str], commands: &[&str]) -> TestGroup {
    TestGroup {
        name: name.to_string(),
        modules: modules.iter().map(|m| m.to_string()).collect(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
    }
}

/// Temporary fragment root.
pub(crate) struct FragmentTree {
    dir: TempDir,
}

impl FragmentTree {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create fragment root"),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn path(&self, relative: &str) -> PathBuf {
        let joined = self.root().join(relative);
        std::path::absolute(&joined).unwrap_or(joined)
    }

    pub(crate) fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fragment dir");
        }
        std::fs::write(path, content).expect("write fragment");
    }

    pub(crate) fn catalog(&self, groups: &[TestGroup]) -> FragmentCatalog {
        let mut modules = HashMap::new();
        let mut commands = HashMap::new();
        for spec in groups {
            let id = GroupId::new(spec.name.as_str());
            let descriptors: Vec<ModuleDescriptor> = spec
                .modules
                .iter()
                .map(|m| ModuleDescriptor::parse(id.clone(), m).expect("valid module path"))
                .collect();
            if !descriptors.is_empty() {
                modules.insert(id.clone(), descriptors);
            }
            for command in &spec.commands {
                commands.insert(command.clone(), id.clone());
            }
        }
        FragmentCatalog::new(ModuleRegistry::new(modules), CommandRegistry::new(commands))
    }
}

#[derive(Default)]
pub(crate) struct FakeHost {
    pub(crate) ledger: LoadLedger,
    pub(crate) defined: HashSet<String>,
    pub(crate) executions: HashMap<PathBuf, usize>,
    pub(crate) hooks_run: Vec<SetupHook>,
    pub(crate) failing_hooks: HashSet<String>,
    pub(crate) invocations: Vec<(String, Vec<String>)>,
    pub(crate) lookups: usize,
    pub(crate) nested_ensures: Vec<EnsureOutcome>,
    pub(crate) nested_dispatch_failures: Vec<String>,
    dispatcher: Option<CommandDispatcher>,
}

impl FakeHost {
    pub(crate) fn with_dispatcher(tree: &FragmentTree, catalog: &FragmentCatalog) -> Self {
        Self {
            dispatcher: Some(CommandDispatcher::new(Rc::new(catalog.clone()), tree.root())),
            ..Self::default()
        }
    }

    pub(crate) fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone().expect("host built without dispatcher")
    }

    pub(crate) fn executions(&self, path: &Path) -> usize {
        self.executions.get(path).copied().unwrap_or(0)
    }

    pub(crate) fn total_executions(&self) -> usize {
        self.executions.values().sum()
    }
}

impl FragmentHost for FakeHost {
    fn ledger(&mut self) -> &mut LoadLedger {
        &mut self.ledger
    }

    fn execute_fragment(&mut self, path: &Path) -> Result<FragmentExports, FragmentError> {
        *self.executions.entry(path.to_path_buf()).or_default() += 1;
        let content = std::fs::read_to_string(path).map_err(|source| FragmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut exports = FragmentExports::default();
        for (index, line) in content.lines().enumerate() {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("define"), Some(name)) => {
                    self.defined.insert(name.to_string());
                }
                (Some("hook"), Some(command)) => exports.hooks.push(SetupHook {
                    command: command.to_string(),
                    args: words.map(str::to_string).collect(),
                }),
                (Some("ensure"), Some(group)) => {
                    let dispatcher = self.dispatcher();
                    let outcome = dispatcher.ensure(self, &GroupId::new(group));
                    self.nested_ensures.push(outcome);
                }
                (Some("run"), Some(name)) => {
                    let found = self.try_invoke(name, &[]).ok().flatten();
                    if found.is_none() {
                        let dispatcher = self.dispatcher();
                        if dispatcher.dispatch(self, name, &[]).is_err() {
                            self.nested_dispatch_failures.push(name.to_string());
                        }
                    }
                }
                (Some("fail"), _) => {
                    return Err(FragmentError::Line {
                        path: path.to_path_buf(),
                        line: index + 1,
                        message: "fail".to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(exports)
    }

    fn run_setup_hook(&mut self, hook: &SetupHook) -> Result<(), FragmentError> {
        if self.failing_hooks.contains(&hook.command) {
            return Err(FragmentError::Hook {
                hook: hook.command.clone(),
                message: "exit status 1".to_string(),
            });
        }
        self.hooks_run.push(hook.clone());
        Ok(())
    }
}

impl DispatchHost for FakeHost {
    fn try_invoke(&mut self, name: &str, args: &[&str]) -> anyhow::Result<Option<ExitCode>> {
        self.lookups += 1;
        if !self.defined.contains(name) {
            return Ok(None);
        }
        self.invocations
            .push((name.to_string(), args.iter().map(|a| a.to_string()).collect()));
        Ok(Some(0))
    }
}
