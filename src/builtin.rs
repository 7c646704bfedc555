use crate::command::{Callable, CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::loader::SetupHook;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed with [`argh`] and executed in-process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "alias".
    fn name() -> &'static str;

    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, &mut stdin, &mut stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{}: {:#}", T::name(), e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[name], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the session's working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => PathBuf::from(
                env.get_var("HOME")
                    .context("no target and HOME not set")?,
            ),
        };

        let new_dir = env.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("can't canonicalize {}", new_dir.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("not a directory: {}", canonical.display());
        }

        env.set_var("PWD", canonical.to_string_lossy());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// End the session.
pub struct Exit {
    #[argh(positional, default = "0")]
    /// exit status of the session.
    pub status: ExitCode,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(self.status)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// define NAME as a shorthand for a command line; extra arguments are appended.
/// without arguments, list every defined command.
pub struct Alias {
    #[argh(positional, greedy)]
    /// the new name, then the command and leading arguments it expands to.
    pub definition: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut words = self.definition.into_iter();
        let Some(name) = words.next() else {
            for (name, callable) in &env.functions {
                writeln!(stdout, "{name}\t{callable}")?;
            }
            return Ok(0);
        };
        let target = words
            .next()
            .with_context(|| format!("missing command for `{name}`"))?;
        env.define(
            name,
            Callable::Alias {
                target,
                args: words.collect(),
            },
        );
        Ok(0)
    }
}

#[derive(FromArgs)]
/// define NAME as a wrapper around an external PROGRAM.
/// NAME reports a missing PROGRAM instead of failing to resolve.
pub struct Wrap {
    #[argh(positional, greedy)]
    /// the new name, the program, then leading arguments passed before the caller's.
    pub definition: Vec<String>,
}

impl BuiltinCommand for Wrap {
    fn name() -> &'static str {
        "wrap"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut words = self.definition.into_iter();
        let name = words.next().context("missing name")?;
        let program = words
            .next()
            .with_context(|| format!("missing program for `{name}`"))?;
        env.define(
            name,
            Callable::Wrapper {
                program,
                args: words.collect(),
            },
        );
        Ok(0)
    }
}

#[derive(FromArgs)]
/// declare a command to run once this fragment's group has finished loading.
pub struct DeclareSetupHook {
    #[argh(positional, greedy)]
    /// the command, then its arguments.
    pub hook: Vec<String>,
}

impl BuiltinCommand for DeclareSetupHook {
    fn name() -> &'static str {
        "setup-hook"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut words = self.hook.into_iter();
        let command = words.next().context("missing command")?;
        env.declared_hooks.push(SetupHook {
            command,
            args: words.collect(),
        });
        Ok(0)
    }
}

/// `throw MESSAGE...`: fails the surrounding script or fragment.
///
/// Unlike other builtins its error is not turned into an exit status.
pub struct Throw {
    message: String,
}

impl ExecutableCommand for Throw {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        _stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

impl CommandFactory for Factory<Throw> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != "throw" {
            return None;
        }
        let message = if args.is_empty() {
            "throw".to_string()
        } else {
            args.join(" ")
        };
        Some(Box::new(Throw { message }))
    }
}
