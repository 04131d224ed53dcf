//! Track animation sequencer
//!
//! Walks the stage layout one segment at a time, holding each track frame
//! for the duration selected by the current speed factor.

use serde::{Deserialize, Serialize};

use super::tables::{ORIENTATION_TRIGGER_FRAMES, SegmentType};

/// One entry of a stage layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentType,
    /// Segment is mirrored horizontally
    pub flip: bool,
}

impl Segment {
    /// Decode a layout byte: bit 7 is the flip flag, the rest is the type
    pub fn from_byte(byte: u8) -> Self {
        Self {
            kind: SegmentType::from_raw(byte & 0x7F),
            flip: byte & 0x80 != 0,
        }
    }
}

/// What changed during one `update`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackStep {
    /// A new track frame became active
    pub frame_advanced: bool,
    /// A new segment began
    pub segment_changed: bool,
}

/// Segment/frame cursor over a stage layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAnimator {
    layout: Vec<Segment>,
    pub segment_index: usize,
    pub frame_in_segment: usize,
    pub frame_delay_counter: u32,
    /// Rendered mirroring; latched only on trigger frames
    pub orientation_flipped: bool,
    /// Set when the layout wraps; the animator holds until cleared
    pub stage_complete: bool,
}

impl TrackAnimator {
    pub fn new(layout: Vec<Segment>) -> Self {
        let mut animator = Self {
            layout,
            segment_index: 0,
            frame_in_segment: 0,
            frame_delay_counter: 0,
            orientation_flipped: false,
            stage_complete: false,
        };
        animator.latch_orientation();
        animator
    }

    pub fn layout(&self) -> &[Segment] {
        &self.layout
    }

    /// Segment currently playing (straight if the layout is empty)
    pub fn current_segment(&self) -> Segment {
        self.layout.get(self.segment_index).copied().unwrap_or(Segment {
            kind: SegmentType::Straight,
            flip: false,
        })
    }

    /// Track frame index currently shown
    pub fn current_frame(&self) -> u8 {
        let frames = self.current_segment().kind.frames();
        frames[self.frame_in_segment.min(frames.len() - 1)]
    }

    /// Advance one tick given the current frame duration
    pub fn update(&mut self, duration: u32) -> TrackStep {
        let mut step = TrackStep::default();
        if self.stage_complete || self.layout.is_empty() {
            return step;
        }

        self.frame_delay_counter += 1;
        if self.frame_delay_counter >= duration.max(1) {
            self.frame_delay_counter = 0;
            self.frame_in_segment += 1;
            step.frame_advanced = true;

            if self.frame_in_segment >= self.current_segment().kind.len() {
                self.frame_in_segment = 0;
                self.segment_index += 1;
                step.segment_changed = true;

                if self.segment_index >= self.layout.len() {
                    self.segment_index = 0;
                    self.stage_complete = true;
                    log::info!("Track layout finished");
                }
            }
        }

        self.latch_orientation();
        step
    }

    /// Resume after the layout wrapped
    pub fn clear_stage_complete(&mut self) {
        self.stage_complete = false;
    }

    fn latch_orientation(&mut self) {
        if ORIENTATION_TRIGGER_FRAMES.contains(&self.current_frame()) {
            self.orientation_flipped = self.current_segment().flip;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(kind: SegmentType, flip: bool) -> Segment {
        Segment { kind, flip }
    }

    #[test]
    fn test_layout_byte_decoding() {
        assert_eq!(Segment::from_byte(0x83), seg(SegmentType::Straight, true));
        assert_eq!(Segment::from_byte(0x01), seg(SegmentType::TurnThenDrop, false));
    }

    #[test]
    fn test_frame_advances_after_duration() {
        let mut track = TrackAnimator::new(vec![seg(SegmentType::Straight, false)]);
        for _ in 0..7 {
            assert!(!track.update(8).frame_advanced);
        }
        assert!(track.update(8).frame_advanced);
        assert_eq!(track.frame_in_segment, 1);
        assert_eq!(track.current_frame(), 0x12);
    }

    #[test]
    fn test_segment_wrap_sets_stage_complete_and_holds() {
        let mut track = TrackAnimator::new(vec![
            seg(SegmentType::StraightThenTurn, false),
            seg(SegmentType::TurnThenStraight, false),
        ]);
        let mut changes = 0;
        for _ in 0..(11 + 12) {
            if track.update(1).segment_changed {
                changes += 1;
            }
        }
        assert_eq!(changes, 2);
        assert!(track.stage_complete);
        assert_eq!(track.segment_index, 0);

        // Held until the consumer clears the flag
        assert_eq!(track.update(1), TrackStep::default());
        track.clear_stage_complete();
        assert!(track.update(1).frame_advanced);
    }

    #[test]
    fn test_orientation_latches_only_on_trigger_frames() {
        // Flipped straight, then an unflipped turn-then-rise
        let mut track = TrackAnimator::new(vec![
            seg(SegmentType::Straight, true),
            seg(SegmentType::TurnThenRise, false),
        ]);
        assert!(track.orientation_flipped);

        // Through the straight: frames 0x12..0x14 are not triggers, 0x11 re-latches true
        for _ in 0..15 {
            track.update(1);
            assert!(track.orientation_flipped);
        }

        // Entering the turn at 0x26 latches the new segment's bit
        track.update(1);
        assert_eq!(track.current_frame(), 0x26);
        assert!(!track.orientation_flipped);
    }

    #[test]
    fn test_orientation_held_across_non_trigger_segment() {
        // A rise segment's tail frames never trigger, so the turn's bit is held
        let mut track = TrackAnimator::new(vec![
            seg(SegmentType::TurnThenRise, true),
            seg(SegmentType::TurnThenDrop, false),
        ]);
        for _ in 0..23 {
            track.update(1);
        }
        assert_eq!(track.current_frame(), 0x10);
        assert!(track.orientation_flipped);
    }
}
