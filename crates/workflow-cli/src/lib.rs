/*
[INPUT]:  Public API exports for workflow-cli crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Command};
pub use config::CliConfig;
