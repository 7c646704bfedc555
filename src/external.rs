use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// A program found on disk, spawned as a child process.
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<OsString>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let executable =
            find_command_path(OsStr::new(&search_paths), &env.current_dir, Path::new(name))?;
        Some(Box::new(ExternalCommand::new(
            executable,
            args.iter().map(OsString::from).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut child = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio())
            .envs(env.vars.iter())
            .current_dir(&env.current_dir)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program.to_string_lossy()))?;
        let exit_status = child.wait()?;
        match exit_status.code() {
            Some(code) => Ok(code),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = exit_status.signal() {
        128 + signal
    } else if exit_status.core_dumped() {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - `./foo`, or any path with several components: resolved against `cwd`.
/// - Single component: looked up in each directory of `search_paths` (PATH).
/// - Empty path: `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if path.is_absolute() {
        return existing(path.to_path_buf());
    }
    if path.components().nth(1).is_some() || path.starts_with(".") {
        return existing(cwd.join(path));
    }
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| existing(dir.join(path)))
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}
