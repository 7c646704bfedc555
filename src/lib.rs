//! A small shell whose commands are defined by fragments loaded on demand.
//!
//! Fragments are shell files grouped by capability (`git`, `rust`, ...). A
//! [manifest](crate::manifest) maps each command to the group defining it. Nothing is
//! loaded at startup: when a name does not resolve, the [`CommandDispatcher`]
//! looks up its group, loads it once through the [`CapabilityInitializer`] and
//! retries the command.
//!
//! The engine only talks to its host through [`FragmentHost`] and
//! [`DispatchHost`], so it can be driven by something other than the bundled
//! [`Interpreter`].

mod builtin;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod error;
mod external;
pub mod initializer;
mod interpreter;
pub mod io_adapters;
mod lexer;
pub mod loader;
pub mod logging;
pub mod manifest;
mod parser;
pub mod probe;
pub mod registry;
pub mod session;
mod session_commands;
#[cfg(test)]
mod testing;

pub use config::ShellConfig;
pub use dispatcher::{CommandDispatcher, DispatchHost};
pub use error::{ConfigError, FragmentError, ManifestError, ShellError};
pub use initializer::{CapabilityInitializer, EnsureOutcome};
pub use interpreter::Interpreter;
pub use loader::{FragmentHost, FragmentLoader, LoadReport, SetupHook};
pub use probe::{CachedCommandProbe, CommandResolver, ProbeResult};
pub use registry::{FragmentCatalog, GroupId};
pub use session::{LoadLedger, LoadState, Session};
