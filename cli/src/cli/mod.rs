//! CLI module for bloret.

pub mod args;
pub mod commands;
pub mod present;

pub use args::{AuthCommands, Cli, Commands, LayoutArg, ShellType};
