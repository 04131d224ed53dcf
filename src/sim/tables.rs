//! Static lookup tables
//!
//! Trig is 8.8 fixed point over a 256-step circle: `sin(0x40) == 256`.
//! Everything here is pure data or a pure function of it.

use serde::{Deserialize, Serialize};

/// Sine table, `round(256 * sin(2*pi*i/256))`
pub const SINE_TABLE: [i16; 256] = [
    0, 6, 13, 19, 25, 31, 38, 44, 50, 56, 62, 68, 74, 80, 86, 92,
    98, 104, 109, 115, 121, 126, 132, 137, 142, 147, 152, 157, 162, 167, 172, 177,
    181, 185, 190, 194, 198, 202, 206, 209, 213, 216, 220, 223, 226, 229, 231, 234,
    237, 239, 241, 243, 245, 247, 248, 250, 251, 252, 253, 254, 255, 255, 256, 256,
    256, 256, 256, 255, 255, 254, 253, 252, 251, 250, 248, 247, 245, 243, 241, 239,
    237, 234, 231, 229, 226, 223, 220, 216, 213, 209, 206, 202, 198, 194, 190, 185,
    181, 177, 172, 167, 162, 157, 152, 147, 142, 137, 132, 126, 121, 115, 109, 104,
    98, 92, 86, 80, 74, 68, 62, 56, 50, 44, 38, 31, 25, 19, 13, 6,
    0, -6, -13, -19, -25, -31, -38, -44, -50, -56, -62, -68, -74, -80, -86, -92,
    -98, -104, -109, -115, -121, -126, -132, -137, -142, -147, -152, -157, -162, -167, -172, -177,
    -181, -185, -190, -194, -198, -202, -206, -209, -213, -216, -220, -223, -226, -229, -231, -234,
    -237, -239, -241, -243, -245, -247, -248, -250, -251, -252, -253, -254, -255, -255, -256, -256,
    -256, -256, -256, -255, -255, -254, -253, -252, -251, -250, -248, -247, -245, -243, -241, -239,
    -237, -234, -231, -229, -226, -223, -220, -216, -213, -209, -206, -202, -198, -194, -190, -185,
    -181, -177, -172, -167, -162, -157, -152, -147, -142, -137, -132, -126, -121, -115, -109, -104,
    -98, -92, -86, -80, -74, -68, -62, -56, -50, -44, -38, -31, -25, -19, -13, -6,
];

/// Sine of an 8-bit angle (8.8)
#[inline]
pub fn sin(angle: u8) -> i16 {
    SINE_TABLE[angle as usize]
}

/// Cosine of an 8-bit angle (8.8)
#[inline]
pub fn cos(angle: u8) -> i16 {
    SINE_TABLE[angle.wrapping_add(0x40) as usize]
}

/// Integer arctangent of the vector (x, y)
///
/// Returns 0 along +x, 0x40 along +y, 0x80 along -x and 0xC0 along -y.
/// Each octant interpolates linearly with one scaled division.
pub fn atan(x: i32, y: i32) -> u8 {
    if x == 0 && y == 0 {
        return 0x40;
    }
    let ax = x.unsigned_abs() as i64;
    let ay = y.unsigned_abs() as i64;
    let angle = match (x >= 0, y >= 0, ax >= ay) {
        (true, true, true) => ay * 32 / ax,
        (true, true, false) => 64 - ax * 32 / ay,
        (false, true, false) => 64 + ax * 32 / ay,
        (false, true, true) => 128 - ay * 32 / ax,
        (false, false, true) => 128 + ay * 32 / ax,
        (false, false, false) => 192 - ax * 32 / ay,
        (true, false, false) => 192 + ax * 32 / ay,
        (true, false, true) => 256 - ay * 32 / ax,
    };
    (angle & 0xFF) as u8
}

/// Track-animation durations indexed by `(speed_factor >> 1) & 7`
pub const DEFAULT_DURATIONS: [u8; 8] = [60, 30, 15, 10, 8, 6, 5, 0];

/// Ticks each track-animation frame is held for the given speed factor
///
/// A zero entry still advances one frame per tick.
#[inline]
pub fn frame_duration(durations: &[u8; 8], speed_factor: u8) -> u32 {
    (durations[((speed_factor >> 1) & 7) as usize] as u32).max(1)
}

/// Segment shapes along the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentType {
    TurnThenRise,
    TurnThenDrop,
    TurnThenStraight,
    Straight,
    StraightThenTurn,
}

impl SegmentType {
    /// Decode the low bits of a layout byte; unknown types read as straight
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SegmentType::TurnThenRise,
            1 => SegmentType::TurnThenDrop,
            2 => SegmentType::TurnThenStraight,
            3 => SegmentType::Straight,
            4 => SegmentType::StraightThenTurn,
            other => {
                log::warn!("segment type {} out of range, using straight", other);
                SegmentType::Straight
            }
        }
    }

    /// Track frames visited, in order, while this segment plays
    pub fn frames(self) -> &'static [u8] {
        match self {
            SegmentType::TurnThenRise => &ANIM_TURN_THEN_RISE,
            SegmentType::TurnThenDrop => &ANIM_TURN_THEN_DROP,
            SegmentType::TurnThenStraight => &ANIM_TURN_THEN_STRAIGHT,
            SegmentType::Straight => &ANIM_STRAIGHT,
            SegmentType::StraightThenTurn => &ANIM_STRAIGHT_THEN_TURN,
        }
    }

    /// Number of track frames in this segment
    #[inline]
    pub fn len(self) -> usize {
        self.frames().len()
    }
}

const ANIM_TURN_THEN_RISE: [u8; 24] = [
    0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x26, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
];
const ANIM_TURN_THEN_DROP: [u8; 24] = [
    0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x26, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C,
    0x1D, 0x1E, 0x1F, 0x20, 0x21, 0x22, 0x23, 0x24, 0x25,
];
const ANIM_TURN_THEN_STRAIGHT: [u8; 12] = [
    0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x26, 0x2C, 0x2D, 0x2E, 0x2F, 0x30,
];
const ANIM_STRAIGHT: [u8; 16] = [
    0x11, 0x12, 0x13, 0x14, 0x11, 0x12, 0x13, 0x14, 0x11, 0x12, 0x13, 0x14, 0x11, 0x12, 0x13,
    0x14,
];
const ANIM_STRAIGHT_THEN_TURN: [u8; 11] = [
    0x11, 0x12, 0x13, 0x14, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37,
];

/// Track frames at which the rendered orientation latches the segment flip bit
pub const ORIENTATION_TRIGGER_FRAMES: [u8; 3] = [0x11, 0x26, 0x31];

/// Object perspective size by integer depth (index 9 is closest)
pub const DEPTH_TO_ANIM: [u8; 32] = [
    9, 9, 9, 8, 8, 7, 7, 6, 6, 6, 5, 5, 5, 5, 4, 4, 4, 4, 3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1, 0, 0,
];

/// Perspective size for an integer depth; anything past the table is farthest
#[inline]
pub fn anim_index_for_depth(depth: u32) -> u8 {
    DEPTH_TO_ANIM.get(depth as usize).copied().unwrap_or(0)
}

/// Base added to a 9-bit uncompressed pattern index
pub const UNCOMPRESSED_EXTENDED_BASE: usize = 0x20;

/// Pattern-index tables consulted by the track decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTables {
    /// Tile words for uncompressed flags (5-bit, or 9-bit + 0x20)
    pub uncompressed: Vec<u16>,
    /// (tile word, run length) pairs for run-length flags (5 or 6 bit)
    pub run_length: Vec<(u16, u8)>,
}

impl Default for PatternTables {
    /// Identity tables: tile word equals index, runs cycle 1..=8
    fn default() -> Self {
        Self {
            uncompressed: (0..(UNCOMPRESSED_EXTENDED_BASE + 0x200) as u16).collect(),
            run_length: (0..0x40u16).map(|i| (i, (i % 8) as u8 + 1)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_cardinal_points() {
        assert_eq!(sin(0), 0);
        assert_eq!(sin(0x40), 256);
        assert_eq!(sin(0x80), 0);
        assert_eq!(sin(0xC0), -256);
        assert_eq!(cos(0), 256);
        assert_eq!(cos(0x80), -256);
    }

    #[test]
    fn test_atan_cardinal_and_diagonal() {
        assert_eq!(atan(100, 0), 0x00);
        assert_eq!(atan(0, 100), 0x40);
        assert_eq!(atan(-100, 0), 0x80);
        assert_eq!(atan(0, -100), 0xC0);
        assert_eq!(atan(50, 50), 0x20);
        assert_eq!(atan(-50, 50), 0x60);
        assert_eq!(atan(-50, -50), 0xA0);
        assert_eq!(atan(50, -50), 0xE0);
        assert_eq!(atan(0, 0), 0x40);
    }

    #[test]
    fn test_atan_tracks_table_angles() {
        // Linear per-octant approximation stays within a few steps of the table
        for angle in 0..=255u8 {
            let x = cos(angle) as i32 * 100;
            let y = sin(angle) as i32 * 100;
            let back = atan(x, y);
            assert!(crate::angle_distance(angle, back) <= 4, "angle {angle} -> {back}");
        }
    }

    #[test]
    fn test_segment_lengths() {
        assert_eq!(SegmentType::TurnThenRise.len(), 24);
        assert_eq!(SegmentType::TurnThenDrop.len(), 24);
        assert_eq!(SegmentType::TurnThenStraight.len(), 12);
        assert_eq!(SegmentType::Straight.len(), 16);
        assert_eq!(SegmentType::StraightThenTurn.len(), 11);
        assert_eq!(SegmentType::from_raw(9), SegmentType::Straight);
    }

    #[test]
    fn test_frame_duration_floor() {
        assert_eq!(frame_duration(&DEFAULT_DURATIONS, 0), 60);
        assert_eq!(frame_duration(&DEFAULT_DURATIONS, 8), 8);
        assert_eq!(frame_duration(&DEFAULT_DURATIONS, 14), 1);
    }

    #[test]
    fn test_depth_anim_table() {
        assert_eq!(anim_index_for_depth(0), 9);
        assert_eq!(anim_index_for_depth(3), 8);
        assert_eq!(anim_index_for_depth(30), 0);
        assert_eq!(anim_index_for_depth(500), 0);
    }
}
