use argh::FromArgs;
use shell_fragments::config::check_fragment_root;
use shell_fragments::manifest::{default_catalog, load_manifest};
use shell_fragments::{CommandDispatcher, GroupId, Interpreter, ShellConfig, logging};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(FromArgs)]
/// A shell that loads command fragments the first time one of their commands is used.
struct Args {
    #[argh(option)]
    /// config file; defaults to <config dir>/shell-fragments/config.toml.
    config: Option<PathBuf>,

    #[argh(option)]
    /// directory fragment paths are resolved against.
    root: Option<PathBuf>,

    #[argh(option)]
    /// manifest replacing the built-in one.
    manifest: Option<PathBuf>,

    #[argh(switch)]
    /// log fragment loading to stderr.
    debug: bool,

    #[argh(option, short = 'c')]
    /// execute one line and exit.
    command: Option<String>,

    #[argh(positional)]
    /// script to run instead of starting the REPL.
    script: Option<PathBuf>,
}

fn main() {
    let args: Args = argh::from_env();

    let config_path = args.config.clone().or_else(ShellConfig::default_path);
    let config = match config_path {
        Some(path) => match ShellConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("shell-fragments: {err}");
                std::process::exit(2);
            }
        },
        None => ShellConfig::default(),
    };

    logging::init(args.debug || config.debug || logging::debug_from_env());

    let manifest = args.manifest.as_ref().or(config.manifest.as_ref());
    let catalog = match manifest {
        Some(path) => load_manifest(path),
        None => default_catalog(),
    };
    let catalog = match catalog {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("shell-fragments: {err}");
            std::process::exit(2);
        }
    };
    let root = args.root.clone().unwrap_or_else(|| config.fragment_root());
    tracing::debug!(root = %root.display(), "fragment root");
    if let Err(err) = check_fragment_root(&root) {
        tracing::warn!("{err}");
    }

    let dispatcher = CommandDispatcher::new(Rc::new(catalog), root);
    let mut sh = Interpreter::default().with_dispatcher(dispatcher);

    for group in &config.eager_groups {
        let group = GroupId::new(group.as_str());
        if let Some(outcome) = sh.ensure(&group) {
            tracing::debug!(%group, ?outcome, "eager group");
        }
    }
    if let Some(startup) = &config.startup {
        if let Err(err) = sh.run_script(startup) {
            tracing::warn!(error = %err, "startup script failed");
        }
    }

    let code = if let Some(line) = &args.command {
        match sh.execute_line(line) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{err:#}");
                1
            }
        }
    } else if let Some(script) = &args.script {
        match sh.run_script(script) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        }
    } else {
        match sh.repl(config.history.as_deref()) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("shell-fragments: {err}");
                1
            }
        }
    };

    std::process::exit(code);
}
