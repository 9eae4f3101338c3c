//! Configuration Module
//!
//! Fixed runtime parameters for decoration, tiling and the launcher.
//! Persistent configuration files are deliberately out of scope; these
//! values are constructed once in main and threaded through the manager.

/// Runtime parameters
#[derive(Debug, Clone)]
pub struct Config {
    /// Frame border width in pixels
    pub border_width: u16,

    /// Frame border color
    pub border_color: u32,

    /// Frame background color
    pub background_color: u32,

    /// Pixels a column gains or loses per extend/shrink step
    pub tile_step: u32,

    /// Minimum column width a neighbor must keep
    pub column_floor: u32,

    /// Command spawned by the launcher binding, run via `sh -c`
    pub launcher_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            border_width: 3,
            border_color: 0xff0000,
            background_color: 0x0000ff,
            tile_step: 100,
            column_floor: 100,
            launcher_command: "rofi -show drun".to_string(),
        }
    }
}
