//! Built-in inspection modules.
//!
//! A module is a self-contained inspection routine the agent re-executes
//! itself to run: the supervisor spawns the agent binary with
//! `-m <name> <json>`, the child looks the name up here, runs it, and writes
//! one JSON object to stdout. Module-level failures are reported inside that
//! object; a nonzero exit tells the supervisor the run failed regardless of
//! what stdout contains.

pub mod filechecker;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("malformed module arguments: {0}")]
    BadArguments(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// One inspection routine, addressable by its lowercase name.
pub trait Module: Sync {
    fn name(&self) -> &'static str;

    /// Run against the raw argument bytes and produce the result object
    /// that will become the command's `Results` value.
    fn run(&self, args: &[u8]) -> Result<serde_json::Value, ModuleError>;
}

/// Every module compiled into the agent binary.
pub static REGISTRY: &[&(dyn Module + 'static)] = &[&filechecker::FileChecker];

/// Look a module up by its lowercase name.
pub fn by_name(name: &str) -> Option<&'static dyn Module> {
    REGISTRY.iter().find(|m| m.name() == name).copied()
}
