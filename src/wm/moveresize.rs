//! Move/Resize Module
//!
//! Interactive drag transaction. A ButtonPress on a managed client opens
//! the transaction, pointer motion with the matching button held produces
//! geometry actions, ButtonRelease closes it.

use x11rb::protocol::xproto::Window;

const BUTTON1_MASK: u16 = 0x100;
const BUTTON3_MASK: u16 = 0x400;

/// Geometry change requested by a drag step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Move { x: i32, y: i32 },
    Resize { width: u32, height: u32 },
}

/// Open drag transaction
#[derive(Debug, Clone, Copy)]
pub struct DragState {
    pub client: Window,
    pub frame: Window,
    pub start_pointer: (i16, i16),
    pub start_position: (i32, i32),
    pub start_size: (u32, u32),
}

impl DragState {
    /// Frame position for a pointer displacement, unclamped
    pub fn move_destination(&self, root_x: i16, root_y: i16) -> (i32, i32) {
        let dx = i32::from(root_x) - i32::from(self.start_pointer.0);
        let dy = i32::from(root_y) - i32::from(self.start_pointer.1);
        (self.start_position.0 + dx, self.start_position.1 + dy)
    }

    /// Frame size for a pointer displacement. Each axis is floored at the
    /// negated start size so dimensions never go negative.
    pub fn resize_destination(&self, root_x: i16, root_y: i16) -> (u32, u32) {
        let dx = (i32::from(root_x) - i32::from(self.start_pointer.0))
            .max(-(self.start_size.0 as i32));
        let dy = (i32::from(root_y) - i32::from(self.start_pointer.1))
            .max(-(self.start_size.1 as i32));
        (
            (self.start_size.0 as i32 + dx) as u32,
            (self.start_size.1 as i32 + dy) as u32,
        )
    }
}

/// Drag state machine, Idle or Dragging
#[derive(Debug, Default)]
pub struct DragManager {
    state: Option<DragState>,
}

impl DragManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction from the pointer origin and the frame's geometry
    pub fn begin(
        &mut self,
        client: Window,
        frame: Window,
        pointer: (i16, i16),
        position: (i32, i32),
        size: (u32, u32),
    ) {
        self.state = Some(DragState {
            client,
            frame,
            start_pointer: pointer,
            start_position: position,
            start_size: size,
        });
    }

    /// Close the transaction
    pub fn end(&mut self) {
        self.state = None;
    }

    /// Translate a motion event into a geometry action for the dragged
    /// frame. Returns None when no transaction is open, the motion is for
    /// another window, or no drag button is held.
    pub fn motion(
        &self,
        client: Window,
        root_x: i16,
        root_y: i16,
        state_bits: u16,
    ) -> Option<(Window, DragAction)> {
        let drag = self.state.as_ref()?;
        if drag.client != client {
            return None;
        }
        if state_bits & BUTTON1_MASK != 0 {
            let (x, y) = drag.move_destination(root_x, root_y);
            Some((drag.frame, DragAction::Move { x, y }))
        } else if state_bits & BUTTON3_MASK != 0 {
            let (width, height) = drag.resize_destination(root_x, root_y);
            Some((drag.frame, DragAction::Resize { width, height }))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_drag() -> DragManager {
        let mut drag = DragManager::new();
        drag.begin(10, 100, (500, 500), (50, 60), (400, 300));
        drag
    }

    #[test]
    fn move_follows_displacement_unclamped() {
        let drag = manager_with_drag();
        let (frame, action) = drag.motion(10, -700, 2000, BUTTON1_MASK).unwrap();
        assert_eq!(frame, 100);
        assert_eq!(action, DragAction::Move { x: 50 - 1200, y: 60 + 1500 });
    }

    #[test]
    fn resize_floors_each_axis_at_zero() {
        let drag = manager_with_drag();
        // Displacement of -1000 exceeds both start dimensions.
        let (_, action) = drag.motion(10, -500, -500, BUTTON3_MASK).unwrap();
        assert_eq!(action, DragAction::Resize { width: 0, height: 0 });
    }

    #[test]
    fn resize_grows_with_positive_displacement() {
        let drag = manager_with_drag();
        let (_, action) = drag.motion(10, 550, 530, BUTTON3_MASK).unwrap();
        assert_eq!(action, DragAction::Resize { width: 450, height: 330 });
    }

    #[test]
    fn motion_without_drag_button_is_ignored() {
        let drag = manager_with_drag();
        assert_eq!(drag.motion(10, 600, 600, 0), None);
    }

    #[test]
    fn motion_for_other_window_is_ignored() {
        let drag = manager_with_drag();
        assert_eq!(drag.motion(20, 600, 600, BUTTON1_MASK), None);
    }

    #[test]
    fn motion_when_idle_is_ignored() {
        let mut drag = manager_with_drag();
        drag.end();
        assert_eq!(drag.motion(10, 600, 600, BUTTON1_MASK), None);
    }
}
