//! Geometry Module
//!
//! Shared window geometry value type.

use x11rb::protocol::xproto::GetGeometryReply;

/// Position and size of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Occupied area in square pixels
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// X coordinate of the right edge
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }
}

impl From<&GetGeometryReply> for Geometry {
    fn from(reply: &GetGeometryReply) -> Self {
        Self {
            x: i32::from(reply.x),
            y: i32::from(reply.y),
            width: u32::from(reply.width),
            height: u32::from(reply.height),
        }
    }
}
