//! Startup configuration: command line flags plus a TOML settings file.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
