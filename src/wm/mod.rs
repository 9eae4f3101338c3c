//! Window Manager Module
//!
//! Event dispatcher and handler routing. Owns the connection, the client
//! registry and the per-concern managers; runs the blocking event loop
//! for the lifetime of the process.

pub mod cycle;
pub mod frame;
pub mod geometry;
pub mod keyboard;
pub mod launcher;
pub mod moveresize;
pub mod registry;
pub mod session;
pub mod tiling;

use std::collections::VecDeque;

use anyhow::{Context, Result};
use tracing::{debug, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, ButtonPressEvent, ButtonReleaseEvent, ConfigureRequestEvent, ConfigureWindowAux,
    ConnectionExt, KeyPressEvent, MapRequestEvent, MotionNotifyEvent, StackMode,
    UnmapNotifyEvent, Window,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::config::Config;
use crate::error::{self, FatalError};
use crate::wm::frame::FrameManager;
use crate::wm::keyboard::{Action, KeyMap};
use crate::wm::moveresize::{DragAction, DragManager};
use crate::wm::registry::ClientRegistry;
use crate::wm::session::Session;
use crate::wm::tiling::{SwapDirection, TilingEngine};

pub struct WindowManager {
    conn: RustConnection,
    screen_num: usize,
    root: Window,
    config: Config,
    registry: ClientRegistry,
    frames: FrameManager,
    drag: DragManager,
    tiling: TilingEngine,
    keymap: KeyMap,
    // Reserved for graceful-close signaling.
    #[allow(dead_code)]
    wm_protocols: Atom,
    #[allow(dead_code)]
    wm_delete_window: Atom,
}

impl WindowManager {
    pub fn new(session: Session, config: Config) -> Result<Self> {
        let Session {
            conn,
            screen_num,
            root,
        } = session;

        let wm_protocols = conn
            .intern_atom(false, b"WM_PROTOCOLS")
            .context("Failed to intern WM_PROTOCOLS")?
            .reply()
            .context("Failed to intern WM_PROTOCOLS")?
            .atom;
        let wm_delete_window = conn
            .intern_atom(false, b"WM_DELETE_WINDOW")
            .context("Failed to intern WM_DELETE_WINDOW")?
            .reply()
            .context("Failed to intern WM_DELETE_WINDOW")?
            .atom;

        let keymap = KeyMap::new(&conn).context("Failed to resolve key bindings")?;
        keymap.grab_root(&conn, root)?;

        let frames = FrameManager::new(&config);
        let tiling = TilingEngine::new(&config);

        let mut manager = Self {
            conn,
            screen_num,
            root,
            config,
            registry: ClientRegistry::new(),
            frames,
            drag: DragManager::new(),
            tiling,
            keymap,
            wm_protocols,
            wm_delete_window,
        };
        manager.adopt_existing_windows()?;
        Ok(manager)
    }

    /// Frame windows that were mapped before the manager started. The
    /// server is grabbed so the tree cannot change under the scan.
    fn adopt_existing_windows(&mut self) -> Result<()> {
        self.conn.grab_server().context("Failed to grab server")?;
        let result = (|| -> Result<()> {
            let tree = self
                .conn
                .query_tree(self.root)
                .context("Failed to query window tree")?
                .reply()
                .context("Failed to read window tree")?;
            info!("Scanning {} pre-existing windows", tree.children.len());
            for child in tree.children {
                self.frames.adopt(
                    &self.conn,
                    self.root,
                    &mut self.registry,
                    &self.keymap,
                    child,
                    true,
                )?;
            }
            Ok(())
        })();
        self.conn
            .ungrab_server()
            .context("Failed to ungrab server")?;
        self.conn.flush()?;
        result
    }

    /// Blocking event loop. Invariant violations end the loop; every
    /// other handler error is logged and survived.
    pub fn run(&mut self) -> Result<()> {
        info!("Entering event loop");
        let mut pending: VecDeque<Event> = VecDeque::new();
        loop {
            let event = match pending.pop_front() {
                Some(event) => event,
                None => self.conn.wait_for_event()?,
            };
            let event = match event {
                Event::MotionNotify(motion) => {
                    Event::MotionNotify(self.coalesce_motion(motion, &mut pending)?)
                }
                other => other,
            };

            if let Err(err) = self.handle_event(event) {
                if let Some(FatalError::Invariant(_)) = err.downcast_ref::<FatalError>() {
                    return Err(err);
                }
                warn!("Error handling event: {:#}", err);
            }
            self.conn.flush()?;
        }
    }

    /// Collapse a run of queued motion events for the same window into
    /// the newest one. Other queued events keep their arrival order.
    fn coalesce_motion(
        &self,
        motion: MotionNotifyEvent,
        pending: &mut VecDeque<Event>,
    ) -> Result<MotionNotifyEvent> {
        let mut newest = motion;
        let mut kept = VecDeque::with_capacity(pending.len());
        for event in pending.drain(..) {
            match event {
                Event::MotionNotify(m) if m.event == newest.event => newest = m,
                other => kept.push_back(other),
            }
        }
        *pending = kept;
        while let Some(event) = self.conn.poll_for_event()? {
            match event {
                Event::MotionNotify(m) if m.event == newest.event => newest = m,
                other => pending.push_back(other),
            }
        }
        Ok(newest)
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::MapRequest(e) => self.handle_map_request(e),
            Event::ConfigureRequest(e) => self.handle_configure_request(e),
            Event::UnmapNotify(e) => self.handle_unmap_notify(e),
            Event::ButtonPress(e) => self.handle_button_press(e),
            Event::ButtonRelease(e) => self.handle_button_release(e),
            Event::MotionNotify(e) => self.handle_motion(e),
            Event::KeyPress(e) => self.handle_key_press(e),
            Event::KeyRelease(_) => Ok(()),
            Event::CreateNotify(e) => {
                trace!("CreateNotify for window {}", e.window);
                Ok(())
            }
            Event::DestroyNotify(e) => {
                trace!("DestroyNotify for window {}", e.window);
                Ok(())
            }
            Event::ReparentNotify(e) => {
                trace!("ReparentNotify for window {}", e.window);
                Ok(())
            }
            Event::MapNotify(e) => {
                trace!("MapNotify for window {}", e.window);
                Ok(())
            }
            Event::ConfigureNotify(e) => {
                trace!("ConfigureNotify for window {}", e.window);
                Ok(())
            }
            Event::Error(err) => {
                error::log_protocol_error(&err);
                Ok(())
            }
            other => {
                debug!("Ignored event: {:?}", other);
                Ok(())
            }
        }
    }

    fn handle_map_request(&mut self, event: MapRequestEvent) -> Result<()> {
        debug!("MapRequest for window {}", event.window);
        self.frames.adopt(
            &self.conn,
            self.root,
            &mut self.registry,
            &self.keymap,
            event.window,
            false,
        )?;
        self.conn
            .map_window(event.window)
            .context("Failed to map window")?;
        if let Some(frame) = self.registry.frame_of(event.window) {
            self.center_on_pointer(frame)?;
        }
        Ok(())
    }

    /// Place a new frame under the pointer, the default floating position
    fn center_on_pointer(&self, frame: Window) -> Result<()> {
        let pointer = self.pointer_position()?;
        let geometry = match self.conn.get_geometry(frame)?.reply() {
            Ok(reply) => reply,
            Err(err) => {
                debug!("Frame {} vanished before placement: {}", frame, err);
                return Ok(());
            }
        };
        if let Some((px, py)) = pointer {
            self.conn.configure_window(
                frame,
                &ConfigureWindowAux::new()
                    .x(i32::from(px) - i32::from(geometry.width) / 2)
                    .y(i32::from(py) - i32::from(geometry.height) / 2),
            )?;
        }
        Ok(())
    }

    /// Query each screen's root for the pointer, stopping at the first
    /// same-screen hit
    fn pointer_position(&self) -> Result<Option<(i16, i16)>> {
        for screen in &self.conn.setup().roots {
            let reply = self
                .conn
                .query_pointer(screen.root)
                .context("Failed to query pointer")?
                .reply()
                .context("Failed to read pointer position")?;
            if reply.same_screen {
                return Ok(Some((reply.root_x, reply.root_y)));
            }
        }
        Ok(None)
    }

    /// Honor the requested fields for the frame (when framed) and always
    /// for the client itself
    fn handle_configure_request(&mut self, event: ConfigureRequestEvent) -> Result<()> {
        let aux = ConfigureWindowAux::from_configure_request(&event);
        if let Some(frame) = self.registry.frame_of(event.window) {
            self.conn
                .configure_window(frame, &aux)
                .context("Failed to configure frame")?;
            debug!("Resized frame {} for window {}", frame, event.window);
        }
        self.conn
            .configure_window(event.window, &aux)
            .context("Failed to configure window")?;
        debug!("Configured window {}", event.window);
        Ok(())
    }

    fn handle_unmap_notify(&mut self, event: UnmapNotifyEvent) -> Result<()> {
        if !should_evict(self.registry.contains(event.window), event.event, self.root) {
            debug!(
                "Ignoring UnmapNotify for window {} reported by {}",
                event.window, event.event
            );
            return Ok(());
        }
        self.frames
            .evict(&self.conn, self.root, &mut self.registry, event.window)
    }

    fn handle_button_press(&mut self, event: ButtonPressEvent) -> Result<()> {
        let frame = self.registry.frame_of(event.event).ok_or_else(|| {
            FatalError::Invariant(format!(
                "button press grabbed on unmanaged window {}",
                event.event
            ))
        })?;
        let geometry = match self.conn.get_geometry(frame)?.reply() {
            Ok(reply) => reply,
            Err(err) => {
                debug!("Frame {} vanished at drag start: {}", frame, err);
                return Ok(());
            }
        };
        self.drag.begin(
            event.event,
            frame,
            (event.root_x, event.root_y),
            (i32::from(geometry.x), i32::from(geometry.y)),
            (u32::from(geometry.width), u32::from(geometry.height)),
        );
        self.conn.configure_window(
            frame,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn handle_motion(&mut self, event: MotionNotifyEvent) -> Result<()> {
        let action = self.drag.motion(
            event.event,
            event.root_x,
            event.root_y,
            u16::from(event.state),
        );
        match action {
            Some((frame, DragAction::Move { x, y })) => {
                self.conn
                    .configure_window(frame, &ConfigureWindowAux::new().x(x).y(y))?;
            }
            Some((frame, DragAction::Resize { width, height })) => {
                self.conn.configure_window(
                    frame,
                    &ConfigureWindowAux::new().width(width).height(height),
                )?;
                self.conn.configure_window(
                    event.event,
                    &ConfigureWindowAux::new().width(width).height(height),
                )?;
            }
            None => {}
        }
        Ok(())
    }

    fn handle_button_release(&mut self, _event: ButtonReleaseEvent) -> Result<()> {
        self.drag.end();
        Ok(())
    }

    fn handle_key_press(&mut self, event: KeyPressEvent) -> Result<()> {
        let action = match self.keymap.lookup(u16::from(event.state), event.detail) {
            Some(action) => action,
            None => {
                debug!("Unbound key press: keycode {}", event.detail);
                return Ok(());
            }
        };
        match action {
            Action::Launch => launcher::spawn(&self.config.launcher_command),
            Action::AlignAll => {
                let screen = &self.conn.setup().roots[self.screen_num];
                let (width, height) = (
                    u32::from(screen.width_in_pixels),
                    u32::from(screen.height_in_pixels),
                );
                self.tiling
                    .align_all(&self.conn, &self.registry, width, height)
            }
            Action::KillClient => {
                let window = self.require_managed(event.event)?;
                info!("Killing window {}", window);
                self.conn
                    .kill_client(window)
                    .context("Failed to kill client")?;
                Ok(())
            }
            Action::CycleFocus => {
                let window = self.require_managed(event.event)?;
                cycle::focus_next(&self.conn, &self.registry, window)
            }
            Action::ToggleFloat => {
                let window = self.require_managed(event.event)?;
                // Tiled/floating state tracking is not implemented yet.
                debug!("Float toggle requested for window {}", window);
                Ok(())
            }
            Action::ExtendRight => {
                let window = self.require_managed(event.event)?;
                self.tiling.extend_right(&self.conn, &self.registry, window)
            }
            Action::ShrinkRight => {
                let window = self.require_managed(event.event)?;
                self.tiling.shrink_right(&self.conn, &self.registry, window)
            }
            Action::SwapRight => {
                let window = self.require_managed(event.event)?;
                self.tiling
                    .swap(&self.conn, &self.registry, window, SwapDirection::Right)
            }
            Action::SwapLeft => {
                let window = self.require_managed(event.event)?;
                self.tiling
                    .swap(&self.conn, &self.registry, window, SwapDirection::Left)
            }
        }
    }

    /// Client-scoped grabs only fire on managed windows
    fn require_managed(&self, window: Window) -> Result<Window> {
        if self.registry.contains(window) {
            Ok(window)
        } else {
            Err(FatalError::Invariant(format!(
                "key grab delivered for unmanaged window {window}"
            ))
            .into())
        }
    }
}

/// Eviction policy for UnmapNotify. Only managed windows are evicted,
/// and never from a notification reported against the root: that unmap
/// is the one our own reparenting of a pre-existing window generates.
fn should_evict(registered: bool, reported_parent: Window, root: Window) -> bool {
    registered && reported_parent != root
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: Window = 1;

    #[test]
    fn unmanaged_windows_are_never_evicted() {
        assert!(!should_evict(false, 500, ROOT));
        assert!(!should_evict(false, ROOT, ROOT));
    }

    #[test]
    fn root_reported_unmaps_are_filtered() {
        assert!(!should_evict(true, ROOT, ROOT));
    }

    #[test]
    fn frame_reported_unmaps_evict() {
        assert!(should_evict(true, 500, ROOT));
    }
}
