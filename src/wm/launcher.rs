//! Launcher Module
//!
//! Fire-and-forget spawning of the external launcher.

use std::process::Command;

use anyhow::{Context, Result};
use tracing::info;

/// Spawn the launcher command through the shell without waiting on it
pub fn spawn(command: &str) -> Result<()> {
    info!("Launching: {}", command);
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .spawn()
        .with_context(|| format!("Failed to spawn '{command}'"))?;
    Ok(())
}
