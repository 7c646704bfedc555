use crate::env::Environment;
use anyhow::Result;
use std::fmt;
use std::io::{Read, Write};
use std::process::Stdio;

/// Conventional process exit code: 0 for success, anything else for failure.
pub type ExitCode = i32;

/// Exit code reported when a wrapped program is not installed.
pub const EXIT_NOT_INSTALLED: ExitCode = 127;

/// Readable input that can also be handed to a child process.
///
/// A blanket implementation exists for any type that implements `Read` and `Into<Stdio>`.
pub trait Stdin: Read {
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Writable output that can also be handed to a child process.
pub trait Stdout: Write {
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Object-safe trait for anything the shell can execute.
///
/// Implemented by built-ins through a blanket impl and by external commands.
pub trait ExecutableCommand {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize `name`; the interpreter
/// then asks the next factory, and finally the fragment dispatcher.
pub trait CommandFactory {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}

/// A command defined by a fragment at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callable {
    /// Runs `target args...` followed by the caller's arguments through normal
    /// resolution, so it may hit other callables, builtins or the dispatcher.
    Alias { target: String, args: Vec<String> },
    /// Spawns the external `program` with `args...` and the caller's
    /// arguments, provided the program is installed.
    Wrapper { program: String, args: Vec<String> },
}

impl Callable {
    /// Prefix arguments plus the caller's, in that order and otherwise untouched.
    pub fn full_args(&self, forwarded: &[&str]) -> Vec<String> {
        let prefix = match self {
            Callable::Alias { args, .. } | Callable::Wrapper { args, .. } => args,
        };
        prefix
            .iter()
            .cloned()
            .chain(forwarded.iter().map(|a| a.to_string()))
            .collect()
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, head, args) = match self {
            Callable::Alias { target, args } => ("alias", target, args),
            Callable::Wrapper { program, args } => ("wrap", program, args),
        };
        write!(f, "{kind}: {head}")?;
        for arg in args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
