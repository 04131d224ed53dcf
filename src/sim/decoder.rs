//! Track image decoder
//!
//! A raw track frame holds three length-prefixed bitstreams:
//! - flag stream: one bit per tile, 1 = uncompressed pattern, 0 = run-length pattern
//! - uncompressed stream: extended bit, then a 5-bit or (9-bit + 0x20) table index
//! - run-length stream: extended bit, then a 5-bit or 6-bit table index
//!
//! Decoding fills a 32x28 grid row-major. Bad input never panics: decoding
//! stops and the remaining slots stay empty.

use serde::{Deserialize, Serialize};

use super::tables::{PatternTables, UNCOMPRESSED_EXTENDED_BASE};
use crate::consts::{TRACK_COLUMNS, TRACK_FRAME_COUNT, TRACK_TILES};

/// Horizontal-flip bit inside a tile word
pub const TILE_HFLIP: u16 = 0x0800;

/// MSB-first bit reader over a byte slice
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, bit_pos: 0 }
    }

    /// Read `count` bits (at most 32), or `None` once the stream runs dry
    pub fn read(&mut self, count: u32) -> Option<u32> {
        if self.bit_pos + count as usize > self.bytes.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.bytes[self.bit_pos >> 3];
            let bit = (byte >> (7 - (self.bit_pos & 7))) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Some(value)
    }

    pub fn bits_remaining(&self) -> usize {
        self.bytes.len() * 8 - self.bit_pos
    }
}

/// A decoded 32x28 tile grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedFrame {
    /// Tile words, row-major; unfilled slots are 0
    pub tiles: Vec<u16>,
    /// Number of slots actually produced by the bitstream
    pub filled: usize,
}

impl DecodedFrame {
    pub fn empty() -> Self {
        Self {
            tiles: vec![0; TRACK_TILES],
            filled: 0,
        }
    }

    /// Tile word at (column, row); `None` outside the grid
    #[inline]
    pub fn tile(&self, column: usize, row: usize) -> Option<u16> {
        if column >= TRACK_COLUMNS {
            return None;
        }
        let index = row.checked_mul(TRACK_COLUMNS)?.checked_add(column)?;
        self.tiles.get(index).copied()
    }
}

/// Split a raw frame into its three sections, clamping truncated lengths
fn split_sections(raw: &[u8]) -> [&[u8]; 3] {
    let mut sections: [&[u8]; 3] = [&[], &[], &[]];
    let mut rest = raw;
    for section in sections.iter_mut() {
        if rest.len() < 4 {
            break;
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        let take = len.min(rest.len());
        *section = &rest[..take];
        rest = &rest[take..];
    }
    sections
}

/// Decode one raw track frame
pub fn decode_frame(raw: &[u8], flipped: bool, patterns: &PatternTables) -> DecodedFrame {
    let [flag_bytes, unc_bytes, rle_bytes] = split_sections(raw);
    let mut flags = BitReader::new(flag_bytes);
    let mut unc = BitReader::new(unc_bytes);
    let mut rle = BitReader::new(rle_bytes);

    let mut frame = DecodedFrame::empty();
    let mut pending_run = 0u32;
    let mut run_tile = 0u16;

    for slot in 0..TRACK_TILES {
        if pending_run > 0 {
            frame.tiles[slot] = run_tile;
            frame.filled = slot + 1;
            pending_run -= 1;
            continue;
        }

        let Some(flag) = flags.read(1) else { break };
        let tile = if flag == 1 {
            let Some(index) = read_uncompressed_index(&mut unc) else {
                break;
            };
            match patterns.uncompressed.get(index) {
                Some(&tile) => tile,
                None => {
                    log::warn!("uncompressed pattern index {} out of range", index);
                    break;
                }
            }
        } else {
            let Some(index) = read_run_length_index(&mut rle) else {
                break;
            };
            let Some(&(tile, run)) = patterns.run_length.get(index) else {
                log::warn!("run-length pattern index {} out of range", index);
                break;
            };
            if run == 0 {
                log::warn!("zero run length at slot {}, aborting frame", slot);
                break;
            }
            run_tile = tile;
            pending_run = run as u32 - 1;
            tile
        };
        frame.tiles[slot] = tile;
        frame.filled = slot + 1;
    }

    if flipped {
        mirror(&mut frame);
    }
    frame
}

fn read_uncompressed_index(stream: &mut BitReader) -> Option<usize> {
    match stream.read(1)? {
        0 => stream.read(5).map(|i| i as usize),
        _ => stream
            .read(9)
            .map(|i| i as usize + UNCOMPRESSED_EXTENDED_BASE),
    }
}

fn read_run_length_index(stream: &mut BitReader) -> Option<usize> {
    match stream.read(1)? {
        0 => stream.read(5).map(|i| i as usize),
        _ => stream.read(6).map(|i| i as usize),
    }
}

/// Mirror columns within each row and toggle the flip bit of filled tiles
fn mirror(frame: &mut DecodedFrame) {
    let filled = frame.filled;
    for (slot, tile) in frame.tiles.iter_mut().enumerate() {
        if slot < filled {
            *tile ^= TILE_HFLIP;
        }
    }
    for row in frame.tiles.chunks_mut(TRACK_COLUMNS) {
        row.reverse();
    }
}

/// Lazily decoded track frames keyed by (frame index, flipped)
#[derive(Debug, Clone)]
pub struct TrackFrameCache {
    raw: Vec<Vec<u8>>,
    patterns: PatternTables,
    decoded: Vec<[Option<DecodedFrame>; 2]>,
    empty: DecodedFrame,
}

impl TrackFrameCache {
    pub fn new(raw: Vec<Vec<u8>>, patterns: PatternTables) -> Self {
        let decoded = (0..raw.len()).map(|_| [None, None]).collect();
        Self {
            raw,
            patterns,
            decoded,
            empty: DecodedFrame::empty(),
        }
    }

    /// Decoded grid for a frame, decoding on first use
    ///
    /// An out-of-range frame index yields the blank grid.
    pub fn get(&mut self, frame_index: u8, flipped: bool) -> &DecodedFrame {
        let index = frame_index as usize;
        if index >= self.raw.len() || index >= TRACK_FRAME_COUNT {
            log::warn!("track frame {} out of range", frame_index);
            return &self.empty;
        }
        let slot = &mut self.decoded[index][flipped as usize];
        if slot.is_none() {
            *slot = Some(decode_frame(&self.raw[index], flipped, &self.patterns));
        }
        slot.as_ref().unwrap_or(&self.empty)
    }

    /// Number of grids decoded so far
    pub fn cached_count(&self) -> usize {
        self.decoded
            .iter()
            .flat_map(|pair| pair.iter())
            .filter(|d| d.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// MSB-first bit writer for building test frames
    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        bits: usize,
    }

    impl BitWriter {
        fn push(&mut self, value: u32, count: u32) {
            for i in (0..count).rev() {
                if self.bits % 8 == 0 {
                    self.bytes.push(0);
                }
                let bit = ((value >> i) & 1) as u8;
                let last = self.bytes.len() - 1;
                self.bytes[last] |= bit << (7 - (self.bits % 8));
                self.bits += 1;
            }
        }
    }

    fn build_frame(flags: &BitWriter, unc: &BitWriter, rle: &BitWriter) -> Vec<u8> {
        let mut raw = Vec::new();
        for section in [flags, unc, rle] {
            raw.extend_from_slice(&(section.bytes.len() as u32).to_be_bytes());
            raw.extend_from_slice(&section.bytes);
        }
        raw
    }

    #[test]
    fn test_bit_reader_msb_first() {
        let mut reader = BitReader::new(&[0b1010_0000, 0xFF]);
        assert_eq!(reader.read(1), Some(1));
        assert_eq!(reader.read(3), Some(0b010));
        assert_eq!(reader.read(8), Some(0x0F));
        assert_eq!(reader.bits_remaining(), 4);
        assert_eq!(reader.read(5), None);
    }

    #[test]
    fn test_uncompressed_short_and_extended_indices() {
        let mut flags = BitWriter::default();
        let mut unc = BitWriter::default();
        flags.push(0b11, 2);
        unc.push(0, 1);
        unc.push(7, 5);
        unc.push(1, 1);
        unc.push(0x101, 9);

        let frame = decode_frame(
            &build_frame(&flags, &unc, &BitWriter::default()),
            false,
            &PatternTables::default(),
        );
        assert_eq!(frame.tiles[0], 7);
        assert_eq!(frame.tiles[1], 0x101 + 0x20);
        // Flag stream padding bits are zero, which asks for an absent RLE entry
        assert_eq!(frame.filled, 2);
    }

    #[test]
    fn test_run_length_repeats_tile() {
        let patterns = PatternTables {
            uncompressed: vec![0; 32],
            run_length: vec![(0x55, 3); 64],
        };
        let mut flags = BitWriter::default();
        let mut rle = BitWriter::default();
        flags.push(0, 1);
        rle.push(1, 1);
        rle.push(40, 6);

        let frame = decode_frame(
            &build_frame(&flags, &BitWriter::default(), &rle),
            false,
            &patterns,
        );
        assert_eq!(&frame.tiles[..4], &[0x55, 0x55, 0x55, 0]);
        assert_eq!(frame.filled, 3);
    }

    #[test]
    fn test_zero_run_length_aborts() {
        let patterns = PatternTables {
            uncompressed: vec![9; 32],
            run_length: vec![(0x44, 0); 64],
        };
        let mut flags = BitWriter::default();
        let mut unc = BitWriter::default();
        let mut rle = BitWriter::default();
        flags.push(0b10, 2);
        unc.push(0, 6);
        rle.push(0, 6);

        let frame = decode_frame(&build_frame(&flags, &unc, &rle), false, &patterns);
        assert_eq!(frame.filled, 1);
        assert_eq!(frame.tiles[0], 9);
        assert_eq!(frame.tiles[1], 0);
    }

    #[test]
    fn test_truncated_and_garbage_input_do_not_panic() {
        let patterns = PatternTables::default();
        assert_eq!(decode_frame(&[], false, &patterns), DecodedFrame::empty());
        assert_eq!(decode_frame(&[0, 0], true, &patterns), DecodedFrame::empty());
        // Section length larger than the buffer
        let frame = decode_frame(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF], false, &patterns);
        assert_eq!(frame.tiles.len(), TRACK_TILES);
    }

    #[test]
    fn test_flip_mirrors_rows_and_toggles_bit() {
        let mut flags = BitWriter::default();
        let mut unc = BitWriter::default();
        for i in 0..TRACK_COLUMNS as u32 {
            flags.push(1, 1);
            unc.push(0, 1);
            unc.push(i % 32, 5);
        }
        let raw = build_frame(&flags, &unc, &BitWriter::default());
        let patterns = PatternTables::default();
        let plain = decode_frame(&raw, false, &patterns);
        let flipped = decode_frame(&raw, true, &patterns);

        assert_eq!(plain.tile(0, 0), Some(0));
        assert_eq!(flipped.tile(TRACK_COLUMNS - 1, 0), Some(TILE_HFLIP));
        assert_eq!(flipped.tile(0, 0), Some(31 | TILE_HFLIP));
        // Unfilled slots stay empty after mirroring
        assert_eq!(flipped.tile(0, 1), Some(0));
    }

    #[test]
    fn test_tile_outside_grid_is_none() {
        let frame = DecodedFrame::empty();
        let rows = TRACK_TILES / TRACK_COLUMNS;
        assert_eq!(frame.tile(TRACK_COLUMNS - 1, rows - 1), Some(0));
        assert_eq!(frame.tile(TRACK_COLUMNS, 0), None);
        assert_eq!(frame.tile(0, rows), None);
        assert_eq!(frame.tile(0, usize::MAX), None);
    }

    #[test]
    fn test_cache_decodes_once_and_blanks_bad_index() {
        let mut cache = TrackFrameCache::new(vec![Vec::new(); 56], PatternTables::default());
        cache.get(3, false);
        cache.get(3, false);
        cache.get(3, true);
        assert_eq!(cache.cached_count(), 2);
        assert_eq!(cache.get(200, false).filled, 0);
    }

    proptest! {
        #[test]
        fn prop_all_ones_flags_use_uncompressed_table(
            mut indices in proptest::collection::vec(0u32..32, 8..200)
        ) {
            // Whole bytes of flags, every one set
            indices.truncate(indices.len() / 8 * 8);
            let mut flags = BitWriter::default();
            let mut unc = BitWriter::default();
            for &i in &indices {
                flags.push(1, 1);
                unc.push(0, 1);
                unc.push(i, 5);
            }
            let patterns = PatternTables {
                uncompressed: (0..32u16).map(|i| 0x100 + i).collect(),
                run_length: Vec::new(),
            };
            let frame = decode_frame(&build_frame(&flags, &unc, &BitWriter::default()), false, &patterns);
            prop_assert_eq!(frame.filled, indices.len());
            for (slot, &i) in indices.iter().enumerate() {
                prop_assert_eq!(frame.tiles[slot], 0x100 + i as u16);
            }
        }
    }
}
