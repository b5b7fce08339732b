//! CLI layer for nexus-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! building the index, searching it, running tools and asking questions.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, IndexCommands, ToolsCommands};
