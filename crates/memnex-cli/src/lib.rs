mod args;
mod commands;
mod format;
mod handlers;

pub use args::{Cli, Commands, DetailArg, NodeTypeArg, RoleArg, SortArg};
pub use commands::run;
