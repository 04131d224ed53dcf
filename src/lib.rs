//! Special Stage - half-pipe bonus stage simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (track animation, objects, player, presentation timing)
//! - `assets`: Collaborator-supplied byte buffers and their layouts
//! - `settings`: Data-driven session configuration
//! - `error`: Initialization failures

pub mod assets;
pub mod error;
pub mod settings;
pub mod sim;

pub use assets::AssetBundle;
pub use error::SimError;
pub use settings::Settings;

use glam::IVec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation rate (one tick per displayed frame)
    pub const TICKS_PER_SECOND: u32 = 60;

    /// Number of stages
    pub const STAGE_COUNT: usize = 7;
    /// Number of pre-authored track images
    pub const TRACK_FRAME_COUNT: usize = 56;

    /// Decoded track grid dimensions (tiles)
    pub const TRACK_COLUMNS: usize = 32;
    pub const TRACK_ROWS: usize = 28;
    pub const TRACK_TILES: usize = TRACK_COLUMNS * TRACK_ROWS;

    /// Screen dimensions (pixels)
    pub const SCREEN_WIDTH: i32 = 256;
    pub const SCREEN_HEIGHT: i32 = 224;
    pub const SCREEN_CENTER_X: i32 = 0x80;
    pub const SCREEN_CENTER_Y: i32 = 0x70;

    /// Fractional bits of object depth (16.16)
    pub const DEPTH_SHIFT: u32 = 16;
    /// Fractional bits of trig results, inertia and velocities (8.8)
    pub const TRIG_SHIFT: u32 = 8;
}

/// Wrap any integer angle into the 256-step circle
#[inline]
pub fn wrap_angle(angle: i32) -> u8 {
    (angle & 0xFF) as u8
}

/// Shortest circular distance between two 8-bit angles (0..=128)
#[inline]
pub fn angle_distance(a: u8, b: u8) -> u8 {
    let forward = a.wrapping_sub(b);
    let backward = b.wrapping_sub(a);
    forward.min(backward)
}

/// Convert (angle, radius) to track-space x/y, radius in whole units
#[inline]
pub fn polar_to_track(angle: u8, radius: i32) -> IVec2 {
    use sim::tables::{cos, sin};
    IVec2::new(
        (cos(angle) as i32 * radius) >> consts::TRIG_SHIFT,
        (sin(angle) as i32 * radius) >> consts::TRIG_SHIFT,
    )
}
