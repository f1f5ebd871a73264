pub mod ai;
pub mod builtins;
pub mod context;
pub mod env;
pub mod executor;
pub mod parser;
pub mod readline;
#[allow(clippy::module_inception)]
pub mod shell;
pub mod signals;

pub use shell::Shell;
