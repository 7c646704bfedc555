//! Typed errors surfaced by the shell and the fragment engine.

use std::path::PathBuf;

use crate::lexer::LexingError;
use crate::parser::ParsingError;

/// Errors raised while resolving or running a command line.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Nothing answered to the name, not even after an on-demand group load.
    ///
    /// Broken mappings produce exactly this error too, so users never see a
    /// different message for a typo and for a stale fragment table.
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("syntax error: {0:?}")]
    Lexing(LexingError),
    #[error("syntax error: {0:?}")]
    Parsing(ParsingError),
}

impl From<LexingError> for ShellError {
    fn from(err: LexingError) -> Self {
        ShellError::Lexing(err)
    }
}

impl From<ParsingError> for ShellError {
    fn from(err: ParsingError) -> Self {
        ShellError::Parsing(err)
    }
}

/// Failure while executing a single fragment or setup hook.
///
/// These never escape the loader; they are recorded and logged.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Line {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("setup hook `{hook}` failed: {message}")]
    Hook { hook: String, message: String },
}

/// Errors found while building the fragment catalog from a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("group `{group}`: invalid module path `{module}`")]
    InvalidModule { group: String, module: String },
    #[error("command `{command}` is mapped to both `{first}` and `{second}`")]
    DuplicateCommand {
        command: String,
        first: String,
        second: String,
    },
}

/// Errors found while loading the shell configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("fragment root {path} is not a directory; copy `fragments/` there or pass --root")]
    MissingFragmentRoot { path: PathBuf },
}
