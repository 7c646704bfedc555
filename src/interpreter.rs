use crate::command::{
    Callable, CommandFactory, EXIT_NOT_INSTALLED, ExecutableCommand, ExitCode, Stdin, Stdout,
};
use crate::dispatcher::{CommandDispatcher, DispatchHost};
use crate::env::Environment;
use crate::error::{FragmentError, ShellError};
use crate::external::ExternalCommand;
use crate::initializer::EnsureOutcome;
use crate::io_adapters::{MemReader, MemWriter, OutputBuffer};
use crate::lexer::{self, WordPart};
use crate::loader::{FragmentExports, FragmentHost, SetupHook};
use crate::parser::{self, Statement, Word};
use crate::probe::CachedCommandProbe;
use crate::registry::GroupId;
use crate::session::{LoadLedger, Session};
use crate::session_commands::{self, SessionCommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::process::Stdio;

/// Aliases may expand to other aliases, but not indefinitely.
const MAX_ALIAS_DEPTH: usize = 32;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Where commands read from and write to.
enum Output {
    Inherit,
    Captured(OutputBuffer),
}

impl Output {
    fn stdin(&self) -> Box<dyn Stdin> {
        match self {
            Output::Inherit => Box::new(InheritedStdin(std::io::stdin())),
            Output::Captured(_) => Box::new(MemReader::new(Vec::new())),
        }
    }

    fn stdout(&self) -> Box<dyn Stdout> {
        match self {
            Output::Inherit => Box::new(std::io::stdout()),
            Output::Captured(buf) => Box::new(MemWriter::sharing(buf.clone())),
        }
    }
}

/// A minimal shell that loads command fragments on demand.
///
/// Names are resolved in this order: callables defined by fragments, session
/// commands (`ensure`, `groups`, `probe`), then the [`CommandFactory`] list.
/// When nothing answers and a [`CommandDispatcher`] is attached, the group
/// owning the name is loaded and the name resolved once more.
///
/// Example
/// ```
/// use shell_fragments::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    session: Session,
    dispatcher: Option<CommandDispatcher>,
    output: Output,
    alias_depth: usize,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
            session: Session::default(),
            dispatcher: None,
            output: Output::Inherit,
            alias_depth: 0,
        }
    }

    /// Resolve unknown names through `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Replace the session's probe cache.
    pub fn with_probe(mut self, probe: CachedCommandProbe) -> Self {
        self.session.probe = probe;
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Send output of in-process commands to a buffer instead of stdout.
    /// Child processes get null stdio while capturing.
    pub fn capture_output(&mut self) -> OutputBuffer {
        let buf = OutputBuffer::default();
        self.output = Output::Captured(buf.clone());
        buf
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatcher(&self) -> Option<&CommandDispatcher> {
        self.dispatcher.as_ref()
    }

    /// Load `group` now. `None` when no dispatcher is attached.
    pub fn ensure(&mut self, group: &GroupId) -> Option<EnsureOutcome> {
        let dispatcher = self.dispatcher.clone()?;
        Some(dispatcher.ensure(self, group))
    }

    /// Run a single command invocation by name with arguments.
    ///
    /// Returns the command's exit code, or an error if nothing answers to the
    /// name or the command fails to execute.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        self.run_resolving(name, args, true)
    }

    /// Lex, parse and execute one line.
    pub fn execute_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let tokens = lexer::split_into_tokens(line).map_err(ShellError::from)?;
        let statements = parser::construct_statements(tokens).map_err(ShellError::from)?;

        let mut last = 0;
        for statement in &statements {
            last = self.execute_statement(statement)?;
            if self.env.should_exit {
                break;
            }
        }
        Ok(last)
    }

    /// Execute a file line by line.
    ///
    /// The first line that fails to lex, parse or run aborts the script. Non-zero
    /// exit codes do not. Returns the exit code of the last line executed.
    pub fn run_script(&mut self, path: &Path) -> Result<ExitCode, FragmentError> {
        let text = fs::read_to_string(path).map_err(|source| FragmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut last = 0;
        for (index, line) in text.lines().enumerate() {
            last = self
                .execute_line(line)
                .map_err(|e| FragmentError::Line {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("{e:#}"),
                })?;
            if self.env.should_exit {
                break;
            }
        }
        Ok(last)
    }

    /// Read-Eval-Print Loop. Returns the exit code of the last command.
    pub fn repl(&mut self, history: Option<&Path>) -> rustyline::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = history {
            if let Err(err) = rl.load_history(path) {
                tracing::debug!(path = %path.display(), error = %err, "no history loaded");
            }
        }

        let mut last = 0;
        loop {
            match rl.readline("$ ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    last = match self.execute_line(&line) {
                        Ok(code) => code,
                        Err(err) => {
                            eprintln!("{err:#}");
                            1
                        }
                    };
                    if self.env.should_exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        if let Some(path) = history {
            if let Err(err) = rl.save_history(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to save history");
            }
        }
        Ok(last)
    }

    fn run_resolving(
        &mut self,
        name: &str,
        args: &[&str],
        with_callables: bool,
    ) -> anyhow::Result<ExitCode> {
        if let Some(code) = self.try_run(name, args, with_callables)? {
            return Ok(code);
        }
        match self.dispatcher.clone() {
            // The retry keeps `with_callables`, or a self-named alias would find itself again.
            Some(dispatcher) => dispatcher.dispatch_with(self, name, args, |sh, name, args| {
                sh.try_run(name, args, with_callables)
            }),
            None => Err(ShellError::CommandNotFound(name.to_string()).into()),
        }
    }

    /// Ordinary resolution without the dispatcher. `Ok(None)` when nothing
    /// answers to `name`.
    fn try_run(
        &mut self,
        name: &str,
        args: &[&str],
        with_callables: bool,
    ) -> anyhow::Result<Option<ExitCode>> {
        if with_callables {
            if let Some(callable) = self.env.function(name).cloned() {
                return self.call(name, &callable, args).map(Some);
            }
        }

        if let Some(command) = SessionCommand::parse(name, args) {
            return self.run_session_command(command).map(Some);
        }

        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                return cmd
                    .execute(self.output.stdin(), self.output.stdout(), &mut self.env)
                    .map(Some);
            }
        }
        Ok(None)
    }

    fn call(&mut self, name: &str, callable: &Callable, args: &[&str]) -> anyhow::Result<ExitCode> {
        let full_args = callable.full_args(args);
        match callable {
            Callable::Alias { target, .. } => {
                if self.alias_depth >= MAX_ALIAS_DEPTH {
                    anyhow::bail!("{name}: alias expansion too deep");
                }
                let full_args: Vec<&str> = full_args.iter().map(String::as_str).collect();
                // `alias ls ls --color` must reach the real `ls`.
                let with_callables = target != name;

                self.alias_depth += 1;
                let result = self.run_resolving(target, &full_args, with_callables);
                self.alias_depth -= 1;
                result
            }
            Callable::Wrapper { program, .. } => {
                let probed = self.session.probe.probe(program, &self.env);
                let Some(path) = probed.path else {
                    writeln!(self.output.stdout(), "{name}: {program} is not installed")?;
                    return Ok(EXIT_NOT_INSTALLED);
                };
                let cmd = Box::new(ExternalCommand::new(
                    path,
                    full_args.into_iter().map(OsString::from).collect(),
                ));
                cmd.execute(self.output.stdin(), self.output.stdout(), &mut self.env)
            }
        }
    }

    fn run_session_command(&mut self, command: SessionCommand) -> anyhow::Result<ExitCode> {
        let mut out = self.output.stdout();
        match command {
            SessionCommand::Ensure(ensure) => {
                let Some(dispatcher) = self.dispatcher.clone() else {
                    writeln!(out, "ensure: no fragment catalog")?;
                    return Ok(1);
                };
                let mut code = 0;
                for name in &ensure.groups {
                    let group = GroupId::new(name.as_str());
                    let outcome = dispatcher.ensure(self, &group);
                    if let EnsureOutcome::Loaded(report) = outcome {
                        if report.failed > 0 {
                            code = 1;
                        }
                    }
                    session_commands::write_ensure_outcome(&mut out, &group, outcome)?;
                }
                Ok(code)
            }
            SessionCommand::Groups(_) => {
                session_commands::list_groups(&mut out, &self.session, self.dispatcher.as_ref())
            }
            SessionCommand::Probe(probe) => {
                session_commands::probe_names(&mut out, &mut self.session, &self.env, &probe.names)
            }
            SessionCommand::Usage { output, is_error } => {
                out.write_all(output.as_bytes())?;
                Ok(if is_error { 1 } else { 0 })
            }
        }
    }

    fn execute_statement(&mut self, statement: &Statement) -> anyhow::Result<ExitCode> {
        let argv: Vec<String> = statement
            .argv
            .iter()
            .filter_map(|word| self.expand(word))
            .collect();
        let values: Vec<(String, String)> = statement
            .assignments
            .iter()
            .map(|a| (a.name.clone(), self.expand(&a.value).unwrap_or_default()))
            .collect();

        let Some((name, args)) = argv.split_first() else {
            for (key, value) in values {
                self.env.set_var(key, value);
            }
            return Ok(0);
        };

        // Prefix assignments only last for this command.
        let saved: Vec<(String, Option<String>)> = values
            .iter()
            .map(|(key, _)| (key.clone(), self.env.vars.get(key).cloned()))
            .collect();
        for (key, value) in values {
            self.env.set_var(key, value);
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self.run(name, &args);

        for (key, previous) in saved.into_iter().rev() {
            match previous {
                Some(value) => self.env.set_var(key, value),
                None => {
                    self.env.remove_var(&key);
                }
            }
        }
        result
    }

    /// Substitute parameters. An unquoted word that expands to nothing is
    /// dropped, like in other shells.
    fn expand(&self, word: &Word) -> Option<String> {
        let mut result = String::new();
        let mut quoted = false;
        for part in word {
            match part {
                WordPart::Literal(text) => result.push_str(text),
                WordPart::Quoted(text) => {
                    quoted = true;
                    result.push_str(text);
                }
                WordPart::Param(name) => {
                    if let Some(value) = self.env.get_var(name) {
                        result.push_str(&value);
                    }
                }
            }
        }
        (quoted || !result.is_empty()).then_some(result)
    }
}

impl FragmentHost for Interpreter {
    fn ledger(&mut self) -> &mut LoadLedger {
        &mut self.session.ledger
    }

    /// Runs the fragment as a script. `exit` inside a fragment ends the
    /// fragment, not the session.
    fn execute_fragment(&mut self, path: &Path) -> Result<FragmentExports, FragmentError> {
        let outer_hooks = std::mem::take(&mut self.env.declared_hooks);
        let outer_exit = std::mem::replace(&mut self.env.should_exit, false);

        let result = self.run_script(path);

        let hooks = std::mem::replace(&mut self.env.declared_hooks, outer_hooks);
        self.env.should_exit = outer_exit;
        result.map(|_| FragmentExports { hooks })
    }

    /// Like fragments, hooks cannot end the session.
    fn run_setup_hook(&mut self, hook: &SetupHook) -> Result<(), FragmentError> {
        let args: Vec<&str> = hook.args.iter().map(String::as_str).collect();
        let outer_exit = std::mem::replace(&mut self.env.should_exit, false);
        let result = self.run(&hook.command, &args);
        self.env.should_exit = outer_exit;

        let message = match result {
            Ok(0) => return Ok(()),
            Ok(code) => format!("exited with status {code}"),
            Err(err) => format!("{err:#}"),
        };
        Err(FragmentError::Hook {
            hook: hook.command.clone(),
            message,
        })
    }
}

impl DispatchHost for Interpreter {
    fn try_invoke(&mut self, name: &str, args: &[&str]) -> anyhow::Result<Option<ExitCode>> {
        self.try_run(name, args, true)
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `pwd`, `cd`, `echo`, `exit`, `alias`, `wrap`, `setup-hook`, `throw`
    /// - external command launcher
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Alias>::default()),
            Box::new(Factory::<Wrap>::default()),
            Box::new(Factory::<DeclareSetupHook>::default()),
            Box::new(Factory::<Throw>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

struct InheritedStdin(std::io::Stdin);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}
