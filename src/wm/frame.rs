//! Frame Module
//!
//! Adoption and eviction of client windows. Adopting reparents the client
//! into a newly created decorated frame and installs its grabs; evicting
//! reverses every step.

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt, CreateWindowAux, EventMask, MapState, SetMode, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::COPY_DEPTH_FROM_PARENT;

use crate::config::Config;
use crate::error::FatalError;
use crate::wm::geometry::Geometry;
use crate::wm::keyboard::KeyMap;
use crate::wm::registry::ClientRegistry;

/// Creates and tears down frame windows
pub struct FrameManager {
    border_width: u16,
    border_color: u32,
    background_color: u32,
}

impl FrameManager {
    pub fn new(config: &Config) -> Self {
        Self {
            border_width: config.border_width,
            border_color: config.border_color,
            background_color: config.background_color,
        }
    }

    /// Wrap a client window in a frame. Pre-existing windows (found at
    /// startup) are skipped when override-redirect or not viewable.
    pub fn adopt(
        &self,
        conn: &RustConnection,
        root: Window,
        registry: &mut ClientRegistry,
        keymap: &KeyMap,
        window: Window,
        pre_existing: bool,
    ) -> Result<()> {
        if registry.contains(window) {
            return Err(FatalError::Invariant(format!(
                "window {window} is already framed"
            ))
            .into());
        }

        let attrs = match conn.get_window_attributes(window)?.reply() {
            Ok(attrs) => attrs,
            Err(err) => {
                debug!("Window {} vanished before framing: {}", window, err);
                return Ok(());
            }
        };
        if should_skip_pre_existing(pre_existing, attrs.override_redirect, attrs.map_state) {
            debug!("Skipping pre-existing window {}", window);
            return Ok(());
        }

        let geometry = match conn.get_geometry(window)?.reply() {
            Ok(reply) => Geometry::from(&reply),
            Err(err) => {
                debug!("Window {} vanished before framing: {}", window, err);
                return Ok(());
            }
        };

        let frame = conn.generate_id().context("Failed to allocate frame id")?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            frame,
            root,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width as u16,
            geometry.height as u16,
            self.border_width,
            WindowClass::INPUT_OUTPUT,
            0,
            &CreateWindowAux::new()
                .background_pixel(self.background_color)
                .border_pixel(self.border_color)
                .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY),
        )
        .context("Failed to create frame window")?;

        // Keep the client alive if this process dies while it is reparented.
        conn.change_save_set(SetMode::INSERT, window)
            .context("Failed to add window to save set")?;
        conn.reparent_window(window, frame, 0, 0)
            .context("Failed to reparent window")?;
        conn.map_window(frame).context("Failed to map frame")?;

        registry.insert(window, frame)?;
        keymap.grab_client(conn, window)?;

        info!("Framed window {} [{}]", window, frame);
        Ok(())
    }

    /// Undo adoption: return the client to the root and destroy the frame
    pub fn evict(
        &self,
        conn: &RustConnection,
        root: Window,
        registry: &mut ClientRegistry,
        window: Window,
    ) -> Result<()> {
        let frame = registry.remove(window)?;

        conn.unmap_window(frame).context("Failed to unmap frame")?;
        conn.reparent_window(window, root, 0, 0)
            .context("Failed to reparent window to root")?;
        conn.change_save_set(SetMode::DELETE, window)
            .context("Failed to remove window from save set")?;
        conn.destroy_window(frame)
            .context("Failed to destroy frame")?;

        info!("Unframed window {} [{}]", window, frame);
        Ok(())
    }
}

/// Startup-scan filter: windows that manage themselves (override-redirect)
/// or are not currently viewable are left alone. MapRequest-driven
/// adoption is never filtered.
fn should_skip_pre_existing(
    pre_existing: bool,
    override_redirect: bool,
    map_state: MapState,
) -> bool {
    pre_existing && (override_redirect || map_state != MapState::VIEWABLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_scan_skips_override_redirect_windows() {
        assert!(should_skip_pre_existing(true, true, MapState::VIEWABLE));
    }

    #[test]
    fn startup_scan_skips_unviewable_windows() {
        assert!(should_skip_pre_existing(true, false, MapState::UNMAPPED));
        assert!(should_skip_pre_existing(true, false, MapState::UNVIEWABLE));
    }

    #[test]
    fn startup_scan_adopts_viewable_windows() {
        assert!(!should_skip_pre_existing(true, false, MapState::VIEWABLE));
    }

    #[test]
    fn map_request_adoption_is_never_filtered() {
        assert!(!should_skip_pre_existing(false, true, MapState::UNMAPPED));
        assert!(!should_skip_pre_existing(false, false, MapState::VIEWABLE));
    }
}
