use crate::command::Callable;
use crate::loader::SetupHook;
use std::collections::{BTreeMap, HashMap};
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable view of the session that commands and fragments act on.
///
/// - `vars`: variables visible to executed commands.
/// - `current_dir`: working directory for command execution.
/// - `should_exit`: set by `exit`; the REPL and script runner stop when they see it.
/// - `functions`: callables defined by fragments.
/// - `declared_hooks`: setup hooks declared by the fragment currently executing.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
    pub functions: BTreeMap<String, Callable>,
    pub declared_hooks: Vec<SetupHook>,
}

impl Environment {
    /// Capture the current process variables and working directory.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: stdenv::vars().collect(),
            ..Self::isolated(current_dir)
        }
    }

    /// An environment with no variables of its own, rooted at `current_dir`.
    /// Lookups through [`get_var`](Self::get_var) still fall back to the process
    /// environment.
    pub fn isolated(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: current_dir.into(),
            should_exit: false,
            functions: BTreeMap::new(),
            declared_hooks: Vec::new(),
        }
    }

    /// Looks up `key` in `self.vars`, falling back to the process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn remove_var(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Define (or redefine) a callable.
    pub fn define(&mut self, name: impl Into<String>, callable: Callable) {
        self.functions.insert(name.into(), callable);
    }

    pub fn function(&self, name: &str) -> Option<&Callable> {
        self.functions.get(name)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
