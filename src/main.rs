//! Pillar Window Manager
//!
//! A dynamic column-tiling window manager for X11.

mod config;
mod error;
mod wm;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::wm::WindowManager;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pillar=debug,info")),
        )
        .with(fmt::layer())
        .init();

    info!("Starting Pillar Window Manager");

    let display = std::env::args().nth(1);

    let session = match wm::session::acquire(display.as_deref()) {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to acquire display: {}", err);
            return Err(err.into());
        }
    };

    let mut manager = WindowManager::new(session, Config::default())
        .context("Failed to initialize window manager")?;

    manager.run()
}
