//! Keyboard Module
//!
//! Compile-time binding table plus keysym to keycode resolution. Keycodes
//! are resolved once at startup from the server's keyboard mapping; grabs
//! are installed per client at adoption time and on the root for the
//! global bindings.

use anyhow::{Context, Result};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ButtonIndex, ConnectionExt, EventMask, GrabMode, Keycode, ModMask, Window,
};
use x11rb::rust_connection::RustConnection;

/// Modifier required by every binding (Mod1 / Alt)
const MOD_MASK: u16 = 0x08;

/// Keysym constants, X11/keysymdef.h values
mod keysym {
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const LEFT: u32 = 0xff51;
    pub const RIGHT: u32 = 0xff53;
    pub const A: u32 = 0x61;
    pub const D: u32 = 0x64;
    pub const F: u32 = 0x66;
    pub const Q: u32 = 0x71;
    pub const T: u32 = 0x74;
}

/// Action bound to a key chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    KillClient,
    CycleFocus,
    ToggleFloat,
    ExtendRight,
    ShrinkRight,
    SwapRight,
    SwapLeft,
    AlignAll,
    Launch,
}

/// Bindings grabbed on each managed client
const CLIENT_BINDINGS: &[(u32, Action)] = &[
    (keysym::Q, Action::KillClient),
    (keysym::TAB, Action::CycleFocus),
    (keysym::F, Action::ToggleFloat),
    (keysym::RIGHT, Action::ExtendRight),
    (keysym::LEFT, Action::ShrinkRight),
    (keysym::D, Action::SwapRight),
    (keysym::A, Action::SwapLeft),
];

/// Bindings grabbed on the root window
const ROOT_BINDINGS: &[(u32, Action)] = &[
    (keysym::T, Action::AlignAll),
    (keysym::RETURN, Action::Launch),
];

/// Resolved key bindings
pub struct KeyMap {
    client_keys: Vec<(Keycode, Action)>,
    root_keys: Vec<(Keycode, Action)>,
}

impl KeyMap {
    /// Resolve the binding tables against the server's keyboard mapping
    pub fn new(conn: &RustConnection) -> Result<Self> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;
        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)
            .context("Failed to request keyboard mapping")?
            .reply()
            .context("Failed to read keyboard mapping")?;
        let per_keycode = mapping.keysyms_per_keycode as usize;

        let resolve = |bindings: &[(u32, Action)]| -> Vec<(Keycode, Action)> {
            bindings
                .iter()
                .filter_map(|&(sym, action)| {
                    match find_keycode(&mapping.keysyms, per_keycode, min_keycode, sym) {
                        Some(code) => Some((code, action)),
                        None => {
                            warn!("No keycode for keysym 0x{:x}, skipping binding", sym);
                            None
                        }
                    }
                })
                .collect()
        };

        Ok(Self {
            client_keys: resolve(CLIENT_BINDINGS),
            root_keys: resolve(ROOT_BINDINGS),
        })
    }

    /// Find the action for a key press. All bindings require Mod1.
    pub fn lookup(&self, state_bits: u16, keycode: Keycode) -> Option<Action> {
        if state_bits & MOD_MASK == 0 {
            return None;
        }
        self.client_keys
            .iter()
            .chain(self.root_keys.iter())
            .find(|&&(code, _)| code == keycode)
            .map(|&(_, action)| action)
    }

    /// Install the move/resize button grabs and per-client key grabs
    pub fn grab_client(&self, conn: &RustConnection, window: Window) -> Result<()> {
        for button in [ButtonIndex::M1, ButtonIndex::M3] {
            conn.grab_button(
                false,
                window,
                EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                button,
                ModMask::M1,
            )
            .context("Failed to grab drag button")?;
        }
        for &(keycode, _) in &self.client_keys {
            conn.grab_key(
                false,
                window,
                ModMask::M1,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )
            .context("Failed to grab client key")?;
        }
        debug!("Installed grabs on window {}", window);
        Ok(())
    }

    /// Install the global key grabs on the root window
    pub fn grab_root(&self, conn: &RustConnection, root: Window) -> Result<()> {
        for &(keycode, _) in &self.root_keys {
            conn.grab_key(
                false,
                root,
                ModMask::M1,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )
            .context("Failed to grab root key")?;
        }
        Ok(())
    }
}

/// Scan the mapping for the first keycode producing the given keysym
fn find_keycode(
    keysyms: &[u32],
    per_keycode: usize,
    min_keycode: Keycode,
    keysym: u32,
) -> Option<Keycode> {
    keysyms
        .chunks(per_keycode)
        .position(|group| group.contains(&keysym))
        .map(|index| min_keycode + index as Keycode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_keycode_scans_keysym_groups() {
        // Three keycodes starting at 8, two keysyms each.
        let keysyms = vec![keysym::Q, 0x51, keysym::TAB, 0, keysym::T, 0x54];
        assert_eq!(find_keycode(&keysyms, 2, 8, keysym::Q), Some(8));
        assert_eq!(find_keycode(&keysyms, 2, 8, keysym::TAB), Some(9));
        assert_eq!(find_keycode(&keysyms, 2, 8, keysym::T), Some(10));
        assert_eq!(find_keycode(&keysyms, 2, 8, keysym::F), None);
    }

    #[test]
    fn find_keycode_matches_non_primary_column() {
        let keysyms = vec![0x31, keysym::Q];
        assert_eq!(find_keycode(&keysyms, 2, 8, keysym::Q), Some(8));
    }

    #[test]
    fn lookup_requires_the_modifier() {
        let keymap = KeyMap {
            client_keys: vec![(24, Action::KillClient)],
            root_keys: vec![(28, Action::AlignAll)],
        };
        assert_eq!(keymap.lookup(MOD_MASK, 24), Some(Action::KillClient));
        assert_eq!(keymap.lookup(MOD_MASK, 28), Some(Action::AlignAll));
        assert_eq!(keymap.lookup(0, 24), None);
        assert_eq!(keymap.lookup(MOD_MASK, 99), None);
    }
}
