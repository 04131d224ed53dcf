//! Collaborator-supplied data
//!
//! Decompression happens elsewhere; this module only knows the byte layout
//! of each decompressed buffer. All multi-byte values are big-endian.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{STAGE_COUNT, TRACK_FRAME_COUNT};
use crate::error::SimError;
use crate::sim::tables::{DEFAULT_DURATIONS, PatternTables};
use crate::sim::track::Segment;

/// Quarters (checkpoints) per stage
pub const ACTS_PER_STAGE: usize = 4;

/// Read a big-endian u16 at `offset`, `None` past the end
#[inline]
pub fn read_be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let hi = *bytes.get(offset)?;
    let lo = *bytes.get(offset + 1)?;
    Some(u16::from_be_bytes([hi, lo]))
}

fn require(table: &'static str, bytes: &[u8], needed: usize) -> Result<(), SimError> {
    if bytes.len() < needed {
        return Err(SimError::TruncatedTable {
            table,
            needed,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Rings needed at each checkpoint, per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingRequirements {
    table: [[u8; ACTS_PER_STAGE]; STAGE_COUNT],
}

impl RingRequirements {
    /// Parse a 28-byte stage-major table
    pub fn parse(name: &'static str, bytes: &[u8]) -> Result<Self, SimError> {
        require(name, bytes, STAGE_COUNT * ACTS_PER_STAGE)?;
        let mut table = [[0u8; ACTS_PER_STAGE]; STAGE_COUNT];
        for (stage, row) in table.iter_mut().enumerate() {
            row.copy_from_slice(&bytes[stage * ACTS_PER_STAGE..(stage + 1) * ACTS_PER_STAGE]);
        }
        Ok(Self { table })
    }

    /// Requirement for a 1-based act; out-of-range values are clamped
    pub fn required(&self, stage: usize, act: u8) -> u16 {
        let stage = stage.min(STAGE_COUNT - 1);
        let quarter = (act.max(1) as usize - 1).min(ACTS_PER_STAGE - 1);
        if act == 0 || act as usize > ACTS_PER_STAGE {
            log::warn!("act {} out of range, using quarter {}", act, quarter + 1);
        }
        self.table[stage][quarter] as u16
    }
}

/// Every buffer the simulation consumes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBundle {
    /// Perspective table (56 frame offsets, then counted entry lists)
    pub perspective: Vec<u8>,
    /// Stage layouts (7 offsets, then one byte per segment)
    pub layouts: Vec<u8>,
    /// Object-location streams (7 offsets, then records)
    pub object_locations: Vec<u8>,
    /// Raw track images, one per track frame
    pub track_frames: Vec<Vec<u8>>,
    /// 7 stages x 4 quarters, solo play
    pub ring_requirements_solo: Vec<u8>,
    /// 7 stages x 4 quarters, team play
    pub ring_requirements_team: Vec<u8>,
    /// Animation-duration table; empty means the built-in table
    pub durations: Vec<u8>,
    /// Pattern-index tables for the track decoder
    #[serde(default)]
    pub patterns: PatternTables,
}

impl AssetBundle {
    /// Check the track images are all present
    pub fn validate_track_frames(&self) -> Result<(), SimError> {
        if self.track_frames.len() < TRACK_FRAME_COUNT {
            return Err(SimError::MissingTrackFrames {
                expected: TRACK_FRAME_COUNT,
                found: self.track_frames.len(),
            });
        }
        Ok(())
    }

    /// Segment list for a stage
    ///
    /// Stage `i` runs from its offset to the next stage's offset (or the end
    /// of the buffer for the last stage).
    pub fn stage_layout(&self, stage: usize) -> Result<Vec<Segment>, SimError> {
        let bytes = &self.layouts;
        require("layout", bytes, STAGE_COUNT * 2)?;

        let start = read_be_u16(bytes, stage * 2).unwrap_or(0) as usize;
        let end = if stage + 1 < STAGE_COUNT {
            read_be_u16(bytes, (stage + 1) * 2).unwrap_or(0) as usize
        } else {
            bytes.len()
        };
        let end = end.min(bytes.len());
        if start >= end {
            return Err(SimError::EmptyStageLayout { stage });
        }
        Ok(bytes[start..end].iter().copied().map(Segment::from_byte).collect())
    }

    /// Start of a stage's object-location stream
    pub fn object_stream_offset(&self, stage: usize) -> Result<usize, SimError> {
        require("object location", &self.object_locations, STAGE_COUNT * 2)?;
        Ok(read_be_u16(&self.object_locations, stage * 2).unwrap_or(0) as usize)
    }

    /// Solo or team ring requirements
    pub fn ring_requirements(&self, team: bool) -> Result<RingRequirements, SimError> {
        if team {
            RingRequirements::parse("team ring requirement", &self.ring_requirements_team)
        } else {
            RingRequirements::parse("solo ring requirement", &self.ring_requirements_solo)
        }
    }

    /// Animation-duration table
    pub fn duration_table(&self) -> Result<[u8; 8], SimError> {
        if self.durations.is_empty() {
            return Ok(DEFAULT_DURATIONS);
        }
        self.durations
            .as_slice()
            .try_into()
            .map_err(|_| SimError::InvalidDurationTable(self.durations.len()))
    }

    /// Load every buffer from a directory of decompressed files
    ///
    /// Expected names: `perspective.bin`, `layouts.bin`, `objects.bin`,
    /// `rings_solo.bin`, `rings_team.bin`, optional `durations.bin`, and
    /// `track_00.bin` .. `track_55.bin`.
    pub fn load_dir(dir: &Path) -> Result<Self, SimError> {
        let read = |name: &str| -> Result<Vec<u8>, SimError> {
            std::fs::read(dir.join(name)).map_err(|e| SimError::MissingAsset {
                name: name.to_string(),
                reason: e.to_string(),
            })
        };

        let track_frames = (0..TRACK_FRAME_COUNT)
            .map(|i| read(&format!("track_{:02}.bin", i)))
            .collect::<Result<Vec<_>, _>>()?;

        let bundle = Self {
            perspective: read("perspective.bin")?,
            layouts: read("layouts.bin")?,
            object_locations: read("objects.bin")?,
            track_frames,
            ring_requirements_solo: read("rings_solo.bin")?,
            ring_requirements_team: read("rings_team.bin")?,
            durations: read("durations.bin").unwrap_or_default(),
            patterns: PatternTables::default(),
        };
        log::info!("Loaded assets from {}", dir.display());
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tables::SegmentType;

    fn layouts(stages: &[&[u8]]) -> Vec<u8> {
        let mut bytes = vec![0u8; STAGE_COUNT * 2];
        for (i, stage) in stages.iter().enumerate() {
            let offset = bytes.len() as u16;
            bytes[i * 2..i * 2 + 2].copy_from_slice(&offset.to_be_bytes());
            bytes.extend_from_slice(stage);
        }
        // Unused stages start at the end (empty)
        for i in stages.len()..STAGE_COUNT {
            let offset = bytes.len() as u16;
            bytes[i * 2..i * 2 + 2].copy_from_slice(&offset.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_read_be_u16() {
        assert_eq!(read_be_u16(&[0x12, 0x34], 0), Some(0x1234));
        assert_eq!(read_be_u16(&[0x12], 0), None);
    }

    #[test]
    fn test_stage_layout_bounds() {
        let bundle = AssetBundle {
            layouts: layouts(&[&[0x03, 0x84], &[0x00]]),
            ..Default::default()
        };
        let stage0 = bundle.stage_layout(0).unwrap();
        assert_eq!(stage0.len(), 2);
        assert_eq!(stage0[1].kind, SegmentType::StraightThenTurn);
        assert!(stage0[1].flip);
        assert_eq!(bundle.stage_layout(1).unwrap().len(), 1);
        assert_eq!(
            bundle.stage_layout(2),
            Err(SimError::EmptyStageLayout { stage: 2 })
        );
    }

    #[test]
    fn test_ring_requirements_lookup() {
        let bytes: Vec<u8> = (0..28).collect();
        let reqs = RingRequirements::parse("solo", &bytes).unwrap();
        assert_eq!(reqs.required(0, 1), 0);
        assert_eq!(reqs.required(1, 4), 7);
        assert_eq!(reqs.required(6, 2), 25);
        // Clamped
        assert_eq!(reqs.required(9, 9), 27);
        assert!(RingRequirements::parse("solo", &bytes[..20]).is_err());
    }

    #[test]
    fn test_duration_table_default_and_invalid() {
        let mut bundle = AssetBundle::default();
        assert_eq!(bundle.duration_table().unwrap(), DEFAULT_DURATIONS);
        bundle.durations = vec![1, 2, 3];
        assert_eq!(
            bundle.duration_table(),
            Err(SimError::InvalidDurationTable(3))
        );
    }

    #[test]
    fn test_missing_track_frames() {
        let bundle = AssetBundle {
            track_frames: vec![Vec::new(); 10],
            ..Default::default()
        };
        assert_eq!(
            bundle.validate_track_frames(),
            Err(SimError::MissingTrackFrames {
                expected: 56,
                found: 10
            })
        );
    }
}
