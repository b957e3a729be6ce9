// src/commands/mod.rs
//! Command handlers for the whl2conda CLI

mod completions;
mod config;
mod convert;
mod renames;

pub use completions::cmd_completions;
pub use config::cmd_config_generate;
pub use convert::cmd_convert;
pub use renames::{cmd_renames_show, cmd_renames_update};
