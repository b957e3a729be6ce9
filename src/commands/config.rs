// src/commands/config.rs

//! Project configuration commands

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use whl2conda::config::{add_pyproject_defaults, default_tool_section};

/// Add default `[tool.whl2conda]` settings to a `pyproject.toml`
///
/// `out` or `stdout` prints the settings instead of writing them.
pub fn cmd_config_generate(path: &Path) -> Result<()> {
    if matches!(path.to_str(), Some("out" | "stdout")) {
        print!("{}", default_tool_section());
        return Ok(());
    }

    let added = add_pyproject_defaults(path)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    if added {
        info!("Added [tool.whl2conda] defaults to {}", path.display());
        println!("Added [tool.whl2conda] defaults to {}", path.display());
    } else {
        println!("{} already has [tool.whl2conda] settings", path.display());
    }
    Ok(())
}
