//! Tiling Module
//!
//! Column layout over the managed frames. Every operation re-reads frame
//! geometry from the server; there is no cached layout tree. Neighbor
//! discovery and resize planning are pure functions over the snapshot so
//! the layout policy can be tested without a server.

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConfigureWindowAux, ConnectionExt, StackMode, Window};
use x11rb::rust_connection::RustConnection;

use crate::config::Config;
use crate::wm::geometry::Geometry;
use crate::wm::registry::ClientRegistry;

/// One managed frame with its current server geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiledFrame {
    pub client: Window,
    pub frame: Window,
    pub geometry: Geometry,
}

/// Planned geometry for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub client: Window,
    pub frame: Window,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    Left,
    Right,
}

/// Column layout engine
pub struct TilingEngine {
    step: u32,
    floor: u32,
}

impl TilingEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            step: config.tile_step,
            floor: config.column_floor,
        }
    }

    /// Read the current geometry of every managed frame, sorted by x
    /// coordinate so planning is deterministic. Frames that vanished
    /// between registration and the query are skipped.
    fn snapshot(
        &self,
        conn: &RustConnection,
        registry: &ClientRegistry,
    ) -> Result<Vec<TiledFrame>> {
        let mut frames = Vec::with_capacity(registry.len());
        for client in registry.clients() {
            let frame = match registry.frame_of(client) {
                Some(frame) => frame,
                None => continue,
            };
            match conn.get_geometry(frame)?.reply() {
                Ok(reply) => frames.push(TiledFrame {
                    client,
                    frame,
                    geometry: Geometry::from(&reply),
                }),
                Err(err) => {
                    debug!("Skipping vanished frame {}: {}", frame, err);
                }
            }
        }
        frames.sort_by_key(|f| f.geometry.x);
        Ok(frames)
    }

    /// Configure each planned frame and resize its client to match
    fn apply(&self, conn: &RustConnection, placements: &[Placement]) -> Result<()> {
        for placement in placements {
            let g = placement.geometry;
            conn.configure_window(
                placement.frame,
                &ConfigureWindowAux::new()
                    .x(g.x)
                    .y(g.y)
                    .width(g.width)
                    .height(g.height),
            )
            .context("Failed to configure frame")?;
            conn.configure_window(
                placement.client,
                &ConfigureWindowAux::new().width(g.width).height(g.height),
            )
            .context("Failed to configure client")?;
        }
        conn.flush()?;
        Ok(())
    }

    /// Arrange all managed frames into equal-width full-height columns
    pub fn align_all(
        &self,
        conn: &RustConnection,
        registry: &ClientRegistry,
        screen_width: u32,
        screen_height: u32,
    ) -> Result<()> {
        if registry.is_empty() {
            debug!("No managed windows to align");
            return Ok(());
        }
        let frames = self.snapshot(conn, registry)?;
        if frames.is_empty() {
            return Ok(());
        }
        let placements = plan_columns(&frames, screen_width, screen_height);
        info!("Aligning {} windows into columns", placements.len());
        self.apply(conn, &placements)
    }

    /// Grow the active column rightward by one step, taking the space
    /// from its right neighbor. No eligible neighbor is a no-op.
    pub fn extend_right(
        &self,
        conn: &RustConnection,
        registry: &ClientRegistry,
        active: Window,
    ) -> Result<()> {
        let frames = self.snapshot(conn, registry)?;
        let placements = match plan_extend_right(&frames, active, self.step, self.floor) {
            Some(placements) => placements,
            None => {
                debug!("No room to extend window {} rightward", active);
                return Ok(());
            }
        };
        self.apply(conn, &placements)?;
        if let Some(frame) = registry.frame_of(active) {
            conn.configure_window(
                frame,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )?;
            conn.flush()?;
        }
        Ok(())
    }

    /// Shrink the active column by one step, ceding the space to its
    /// right neighbor. An active column at the floor is a no-op.
    pub fn shrink_right(
        &self,
        conn: &RustConnection,
        registry: &ClientRegistry,
        active: Window,
    ) -> Result<()> {
        let frames = self.snapshot(conn, registry)?;
        let placements = match plan_shrink_right(&frames, active, self.step, self.floor) {
            Some(placements) => placements,
            None => {
                debug!("No room to shrink window {}", active);
                return Ok(());
            }
        };
        self.apply(conn, &placements)
    }

    /// Exchange position and size with the adjacent column
    pub fn swap(
        &self,
        conn: &RustConnection,
        registry: &ClientRegistry,
        active: Window,
        direction: SwapDirection,
    ) -> Result<()> {
        let frames = self.snapshot(conn, registry)?;
        let placements = match plan_swap(&frames, active, direction) {
            Some(placements) => placements,
            None => {
                debug!("No {:?} neighbor to swap window {} with", direction, active);
                return Ok(());
            }
        };
        self.apply(conn, &placements)
    }
}

/// Equal columns: frame i of N gets x = i * (screen_width / N), full height
pub fn plan_columns(
    frames: &[TiledFrame],
    screen_width: u32,
    screen_height: u32,
) -> Vec<Placement> {
    let count = frames.len() as u32;
    let column_width = screen_width / count;
    frames
        .iter()
        .enumerate()
        .map(|(i, f)| Placement {
            client: f.client,
            frame: f.frame,
            geometry: Geometry::new(
                (i as u32 * column_width) as i32,
                0,
                column_width,
                screen_height,
            ),
        })
        .collect()
}

fn find_active(frames: &[TiledFrame], active: Window) -> Option<usize> {
    frames.iter().position(|f| f.client == active)
}

/// First frame whose left edge meets the active frame's right edge
pub fn right_neighbor(frames: &[TiledFrame], active_index: usize) -> Option<usize> {
    let edge = frames[active_index].geometry.right();
    frames
        .iter()
        .position(|f| f.client != frames[active_index].client && f.geometry.x == edge)
}

/// First frame whose right edge meets the active frame's left edge
pub fn left_neighbor(frames: &[TiledFrame], active_index: usize) -> Option<usize> {
    let edge = frames[active_index].geometry.x;
    frames
        .iter()
        .position(|f| f.client != frames[active_index].client && f.geometry.right() == edge)
}

/// Move the shared edge rightward. The neighbor must be wider than the
/// floor, and than the step so the subtraction cannot underflow.
pub fn plan_extend_right(
    frames: &[TiledFrame],
    active: Window,
    step: u32,
    floor: u32,
) -> Option<Vec<Placement>> {
    let active_index = find_active(frames, active)?;
    let edge = frames[active_index].geometry.right();
    let neighbor_index = frames.iter().position(|f| {
        f.client != active && f.geometry.x == edge && f.geometry.width > floor.max(step)
    })?;

    let mut active_geometry = frames[active_index].geometry;
    let mut neighbor_geometry = frames[neighbor_index].geometry;
    active_geometry.width += step;
    neighbor_geometry.x += step as i32;
    neighbor_geometry.width -= step;

    Some(vec![
        Placement {
            client: frames[active_index].client,
            frame: frames[active_index].frame,
            geometry: active_geometry,
        },
        Placement {
            client: frames[neighbor_index].client,
            frame: frames[neighbor_index].frame,
            geometry: neighbor_geometry,
        },
    ])
}

/// Move the shared edge leftward, ceding the space to the right
/// neighbor. The active column must sit above the floor, and above the
/// step so the subtraction cannot underflow.
pub fn plan_shrink_right(
    frames: &[TiledFrame],
    active: Window,
    step: u32,
    floor: u32,
) -> Option<Vec<Placement>> {
    let active_index = find_active(frames, active)?;
    if frames[active_index].geometry.width <= floor.max(step) {
        return None;
    }
    let neighbor_index = right_neighbor(frames, active_index)?;

    let mut active_geometry = frames[active_index].geometry;
    let mut neighbor_geometry = frames[neighbor_index].geometry;
    active_geometry.width -= step;
    neighbor_geometry.x -= step as i32;
    neighbor_geometry.width += step;

    Some(vec![
        Placement {
            client: frames[active_index].client,
            frame: frames[active_index].frame,
            geometry: active_geometry,
        },
        Placement {
            client: frames[neighbor_index].client,
            frame: frames[neighbor_index].frame,
            geometry: neighbor_geometry,
        },
    ])
}

/// Exchange the full geometries of the active frame and its adjacent
/// neighbor. First matching neighbor wins.
pub fn plan_swap(
    frames: &[TiledFrame],
    active: Window,
    direction: SwapDirection,
) -> Option<Vec<Placement>> {
    let active_index = find_active(frames, active)?;
    let neighbor_index = match direction {
        SwapDirection::Right => right_neighbor(frames, active_index)?,
        SwapDirection::Left => left_neighbor(frames, active_index)?,
    };

    Some(vec![
        Placement {
            client: frames[active_index].client,
            frame: frames[active_index].frame,
            geometry: frames[neighbor_index].geometry,
        },
        Placement {
            client: frames[neighbor_index].client,
            frame: frames[neighbor_index].frame,
            geometry: frames[active_index].geometry,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(client: Window, x: i32, width: u32) -> TiledFrame {
        TiledFrame {
            client,
            frame: client + 1000,
            geometry: Geometry::new(x, 0, width, 1080),
        }
    }

    #[test]
    fn columns_cover_screen_within_remainder() {
        let frames = vec![frame(1, 0, 500), frame(2, 500, 300), frame(3, 800, 100)];
        let placements = plan_columns(&frames, 1920, 1080);

        let total: u32 = placements.iter().map(|p| p.geometry.width).sum();
        assert!(1920 - total < placements.len() as u32);
        for p in &placements {
            assert_eq!(p.geometry.y, 0);
            assert_eq!(p.geometry.height, 1080);
        }
        assert_eq!(placements[0].geometry.x, 0);
        assert_eq!(placements[1].geometry.x, 640);
        assert_eq!(placements[2].geometry.x, 1280);
    }

    #[test]
    fn columns_are_assigned_by_x_order() {
        let mut frames = vec![frame(1, 0, 500), frame(2, 900, 300), frame(3, 500, 400)];
        frames.sort_by_key(|f| f.geometry.x);
        let placements = plan_columns(&frames, 1500, 900);
        assert_eq!(placements[0].client, 1);
        assert_eq!(placements[1].client, 3);
        assert_eq!(placements[2].client, 2);
        assert_eq!(placements[1].geometry.x, 500);
        assert_eq!(placements[2].geometry.x, 1000);
    }

    #[test]
    fn extend_right_moves_the_shared_edge() {
        let frames = vec![frame(1, 0, 600), frame(2, 600, 600)];
        let placements = plan_extend_right(&frames, 1, 100, 100).unwrap();

        assert_eq!(placements[0].geometry, Geometry::new(0, 0, 700, 1080));
        assert_eq!(placements[1].geometry, Geometry::new(700, 0, 500, 1080));
    }

    #[test]
    fn extend_right_respects_neighbor_floor() {
        // Neighbor exactly at the floor may not shrink further.
        let frames = vec![frame(1, 0, 600), frame(2, 600, 100)];
        assert_eq!(plan_extend_right(&frames, 1, 100, 100), None);

        let frames = vec![frame(1, 0, 600), frame(2, 600, 101)];
        assert!(plan_extend_right(&frames, 1, 100, 100).is_some());
    }

    #[test]
    fn extend_right_never_underflows_a_narrow_neighbor() {
        // Step larger than the floor: a neighbor above the floor but
        // narrower than the step must not lose width.
        let frames = vec![frame(1, 0, 600), frame(2, 600, 120)];
        assert_eq!(plan_extend_right(&frames, 1, 150, 100), None);
    }

    #[test]
    fn shrink_right_never_underflows_a_narrow_active() {
        let frames = vec![frame(1, 0, 120), frame(2, 120, 600)];
        assert_eq!(plan_shrink_right(&frames, 1, 150, 100), None);
    }

    #[test]
    fn extend_right_without_adjacent_neighbor_is_none() {
        let frames = vec![frame(1, 0, 600), frame(2, 700, 600)];
        assert_eq!(plan_extend_right(&frames, 1, 100, 100), None);
    }

    #[test]
    fn shrink_right_respects_active_floor() {
        let frames = vec![frame(1, 0, 100), frame(2, 100, 600)];
        assert_eq!(plan_shrink_right(&frames, 1, 100, 100), None);

        let frames = vec![frame(1, 0, 200), frame(2, 200, 600)];
        let placements = plan_shrink_right(&frames, 1, 100, 100).unwrap();
        assert_eq!(placements[0].geometry, Geometry::new(0, 0, 100, 1080));
        assert_eq!(placements[1].geometry, Geometry::new(100, 0, 700, 1080));
    }

    #[test]
    fn swap_exchanges_geometry_and_preserves_area() {
        let frames = vec![frame(1, 0, 700), frame(2, 700, 500)];
        let before: u64 = frames.iter().map(|f| f.geometry.area()).sum();

        let placements = plan_swap(&frames, 1, SwapDirection::Right).unwrap();
        assert_eq!(placements[0].client, 1);
        assert_eq!(placements[0].geometry, frames[1].geometry);
        assert_eq!(placements[1].client, 2);
        assert_eq!(placements[1].geometry, frames[0].geometry);

        let after: u64 = placements.iter().map(|p| p.geometry.area()).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn swap_left_uses_the_left_edge() {
        let frames = vec![frame(1, 0, 700), frame(2, 700, 500)];
        let placements = plan_swap(&frames, 2, SwapDirection::Left).unwrap();
        assert_eq!(placements[0].client, 2);
        assert_eq!(placements[0].geometry, frames[0].geometry);
    }

    #[test]
    fn swap_without_neighbor_is_none() {
        let frames = vec![frame(1, 0, 700), frame(2, 800, 500)];
        assert_eq!(plan_swap(&frames, 1, SwapDirection::Right), None);
        assert_eq!(plan_swap(&frames, 1, SwapDirection::Left), None);
    }

    #[test]
    fn swap_picks_the_first_matching_neighbor() {
        // Two frames share the same left edge; the earliest in x order wins.
        let mut frames = vec![frame(1, 0, 700), frame(2, 700, 500), frame(3, 700, 500)];
        frames.sort_by_key(|f| f.geometry.x);
        let placements = plan_swap(&frames, 1, SwapDirection::Right).unwrap();
        assert_eq!(placements[1].client, 2);
    }
}
