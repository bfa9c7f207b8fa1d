//! Settings are loaded once at startup from a TOML file.
//! See `settings/dev.toml` for a commented example.

mod cli;
pub use clap::{Parser, Subcommand};
pub use cli::*;

mod settings;
pub use settings::*;
