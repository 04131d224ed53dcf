//! Depth/angle to screen projection
//!
//! Each track frame carries its own list of ellipses, one per visible depth:
//! centre, radii and an optional hidden angle range. Objects at `depth` use
//! entry `depth - 1`; depth 0 is not yet on screen.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::tables::{cos, sin};
use crate::assets::read_be_u16;
use crate::consts::{TRACK_FRAME_COUNT, TRIG_SHIFT};
use crate::error::SimError;

/// Bytes per perspective entry
pub const ENTRY_SIZE: usize = 6;

/// One depth slice of the tube for a given track frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerspectiveEntry {
    pub x_base: i32,
    pub y_base: i32,
    pub x_radius: i32,
    pub y_radius: i32,
    pub angle_min: u8,
    pub angle_max: u8,
}

/// Interpret the stored Y centre byte
///
/// 0x48..0x80 stays positive, high-bit values are sign extended, and the
/// low range below 0x48 passes through unchanged.
#[allow(clippy::if_same_then_else)]
pub fn decode_y_base(raw: u8) -> i32 {
    let v = raw as i32;
    if (0x48..0x80).contains(&v) {
        v
    } else if v & 0x80 != 0 {
        v - 256
    } else {
        v
    }
}

impl PerspectiveEntry {
    fn from_bytes(b: &[u8]) -> Self {
        Self {
            x_base: b[0] as i32,
            y_base: decode_y_base(b[1]),
            x_radius: b[2] as i32,
            y_radius: b[3] as i32,
            angle_min: b[4],
            angle_max: b[5],
        }
    }

    /// Whether an object at `angle` is drawn at this depth
    pub fn is_angle_visible(&self, angle: u8, flipped: bool) -> bool {
        if self.angle_max == 0 {
            return true;
        }
        let angle = if flipped { angle.wrapping_neg() } else { angle };
        angle < self.angle_min || angle >= self.angle_max
    }

    /// Screen position of a point on this ellipse
    pub fn screen_position(&self, angle: u8, flipped: bool) -> IVec2 {
        let x_base = if flipped { 256 - self.x_base } else { self.x_base };
        IVec2::new(
            x_base + ((cos(angle) as i32 * self.x_radius) >> TRIG_SHIFT),
            self.y_base + ((sin(angle) as i32 * self.y_radius) >> TRIG_SHIFT),
        )
    }
}

/// Per-track-frame perspective entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerspectiveTable {
    frames: Vec<Vec<PerspectiveEntry>>,
}

impl PerspectiveTable {
    /// Parse the decompressed perspective buffer
    ///
    /// A missing offset header is an error; a frame whose entries run past
    /// the end of the buffer keeps the entries that are present.
    pub fn parse(bytes: &[u8]) -> Result<Self, SimError> {
        let header = TRACK_FRAME_COUNT * 2;
        if bytes.len() < header {
            return Err(SimError::TruncatedTable {
                table: "perspective",
                needed: header,
                actual: bytes.len(),
            });
        }

        let mut frames = Vec::with_capacity(TRACK_FRAME_COUNT);
        for frame in 0..TRACK_FRAME_COUNT {
            let offset = read_be_u16(bytes, frame * 2).unwrap_or(0) as usize;
            let Some(count) = read_be_u16(bytes, offset) else {
                log::warn!("perspective frame {} offset {:#x} out of range", frame, offset);
                frames.push(Vec::new());
                continue;
            };
            let start = offset + 2;
            let available = bytes.len().saturating_sub(start) / ENTRY_SIZE;
            if (count as usize) > available {
                log::warn!(
                    "perspective frame {} claims {} entries, {} present",
                    frame,
                    count,
                    available
                );
            }
            let entries = bytes[start.min(bytes.len())..]
                .chunks_exact(ENTRY_SIZE)
                .take(count as usize)
                .map(PerspectiveEntry::from_bytes)
                .collect();
            frames.push(entries);
        }
        Ok(Self { frames })
    }

    /// Build directly from entries (tests and tools)
    pub fn from_frames(frames: Vec<Vec<PerspectiveEntry>>) -> Self {
        Self { frames }
    }

    /// Number of depth entries stored for a frame
    pub fn entry_count(&self, frame: u8) -> usize {
        self.frames.get(frame as usize).map_or(0, Vec::len)
    }

    /// Entry for a track frame and integer depth (depth 0 = not visible)
    pub fn get_entry(&self, frame: u8, depth: u32) -> Option<PerspectiveEntry> {
        if depth == 0 {
            return None;
        }
        self.frames
            .get(frame as usize)?
            .get(depth as usize - 1)
            .copied()
    }
}
