//! Session Module
//!
//! Connects to the X server and claims the substructure redirect
//! privilege on the root window. Only one client may hold it; an Access
//! error on the selection means another window manager is running.

use tracing::info;
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{ChangeWindowAttributesAux, ConnectionExt, EventMask, Window};
use x11rb::protocol::ErrorKind;
use x11rb::rust_connection::RustConnection;

use crate::error::FatalError;

/// Exclusive connection to a display with the redirect privilege held
pub struct Session {
    pub conn: RustConnection,
    pub screen_num: usize,
    pub root: Window,
}

/// Connect to the display and claim window management rights on its root
pub fn acquire(display: Option<&str>) -> Result<Session, FatalError> {
    let (conn, screen_num) = x11rb::connect(display)?;
    let screen = &conn.setup().roots[screen_num];
    let root = screen.root;
    info!(
        "Connected to screen {} ({}x{})",
        screen_num, screen.width_in_pixels, screen.height_in_pixels
    );

    // The selection must be checked synchronously so a competing manager
    // is detected before any other request is issued.
    let cookie = conn.change_window_attributes(
        root,
        &ChangeWindowAttributesAux::new().event_mask(
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
        ),
    )?;
    match cookie.check() {
        Ok(()) => {}
        Err(ReplyError::X11Error(err)) if err.error_kind == ErrorKind::Access => {
            return Err(FatalError::AlreadyManaged);
        }
        Err(ReplyError::X11Error(err)) => {
            return Err(FatalError::Invariant(format!(
                "unexpected protocol error during handshake: {err:?}"
            )));
        }
        Err(ReplyError::ConnectionError(err)) => return Err(err.into()),
    }

    info!("Acquired window management rights on root 0x{:x}", root);
    Ok(Session {
        conn,
        screen_num,
        root,
    })
}
