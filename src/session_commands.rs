//! Commands that act on the session rather than on the environment.
//!
//! They are resolved by the interpreter after fragment-defined callables and
//! before the command factories, so a fragment may shadow them.

use std::io::Write;

use anyhow::Result;
use argh::{EarlyExit, FromArgs};

use crate::command::ExitCode;
use crate::dispatcher::CommandDispatcher;
use crate::env::Environment;
use crate::initializer::EnsureOutcome;
use crate::registry::GroupId;
use crate::session::Session;

#[derive(FromArgs)]
/// load fragment groups now instead of on first use.
pub(crate) struct Ensure {
    #[argh(positional, greedy)]
    /// groups to load.
    pub groups: Vec<String>,
}

#[derive(FromArgs)]
/// list fragment groups with their load state.
pub(crate) struct Groups {}

#[derive(FromArgs)]
/// report whether programs are installed. Results are cached for the session.
pub(crate) struct Probe {
    #[argh(positional, greedy)]
    /// program names.
    pub names: Vec<String>,
}

pub(crate) enum SessionCommand {
    Ensure(Ensure),
    Groups(Groups),
    Probe(Probe),
    /// `--help` or a usage error, already rendered by argh.
    Usage { output: String, is_error: bool },
}

impl SessionCommand {
    pub(crate) fn parse(name: &str, args: &[&str]) -> Option<Self> {
        let parsed = match name {
            "ensure" => Ensure::from_args(&[name], args).map(SessionCommand::Ensure),
            "groups" => Groups::from_args(&[name], args).map(SessionCommand::Groups),
            "probe" => Probe::from_args(&[name], args).map(SessionCommand::Probe),
            _ => return None,
        };
        Some(parsed.unwrap_or_else(|EarlyExit { output, status }| SessionCommand::Usage {
            output,
            is_error: status.is_err(),
        }))
    }
}

/// One line per ensured group.
pub(crate) fn write_ensure_outcome(
    out: &mut dyn Write,
    group: &GroupId,
    outcome: EnsureOutcome,
) -> Result<()> {
    match outcome {
        EnsureOutcome::AlreadyLoaded => writeln!(out, "{group}: already loaded")?,
        EnsureOutcome::InProgress => writeln!(out, "{group}: loading")?,
        EnsureOutcome::Loaded(report) => writeln!(
            out,
            "{group}: loaded {}, failed {}, skipped {}",
            report.loaded, report.failed, report.skipped
        )?,
    }
    Ok(())
}

pub(crate) fn list_groups(
    out: &mut dyn Write,
    session: &Session,
    dispatcher: Option<&CommandDispatcher>,
) -> Result<ExitCode> {
    let Some(dispatcher) = dispatcher else {
        return Ok(0);
    };
    for group in dispatcher.catalog().modules.group_ids() {
        writeln!(out, "{group}\t{}", session.ledger.state(group))?;
    }
    Ok(0)
}

pub(crate) fn probe_names(
    out: &mut dyn Write,
    session: &mut Session,
    env: &Environment,
    names: &[String],
) -> Result<ExitCode> {
    let mut all_available = true;
    for name in names {
        let result = session.probe.probe(name, env);
        match &result.path {
            Some(path) => writeln!(out, "{name}\t{}", path.display())?,
            None => {
                all_available = false;
                writeln!(out, "{name}\tnot installed")?;
            }
        }
    }
    Ok(if all_available { 0 } else { 1 })
}
