//! Cycle Module
//!
//! Focus cycling over the registry's insertion order.

use anyhow::{Context, Result};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConfigureWindowAux, ConnectionExt, InputFocus, StackMode, Window,
};
use x11rb::rust_connection::RustConnection;
use x11rb::CURRENT_TIME;

use crate::wm::registry::ClientRegistry;

/// Raise and focus the cyclic successor of the current client
pub fn focus_next(
    conn: &RustConnection,
    registry: &ClientRegistry,
    current: Window,
) -> Result<()> {
    let next = match registry.next_after(current) {
        Some(next) => next,
        None => return Ok(()),
    };
    if let Some(frame) = registry.frame_of(next) {
        conn.configure_window(
            frame,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )
        .context("Failed to raise frame")?;
    }
    conn.set_input_focus(InputFocus::POINTER_ROOT, next, CURRENT_TIME)
        .context("Failed to set input focus")?;
    conn.flush()?;
    debug!("Focus moved from window {} to {}", current, next);
    Ok(())
}
