//! Object-location stream and the active object list
//!
//! Each stage has one byte stream read front to back as the track plays.
//! At every segment start the records for the next segment are read:
//! - `00DDDDDD AAAAAAAA`: ring, distance index D, angle A
//! - `01DDDDDD AAAAAAAA`: bomb (bit 6 set)
//! - a single byte with the high bit set ends the segment's records:
//!   `FF` end, `FE` checkpoint, `FD` prize, anything else turns on the
//!   rings-to-go display.
//!
//! The cursor never rewinds.

use serde::{Deserialize, Serialize};

use super::objects::{ApproachTiming, ObjectKind, ObjectSignal, ObjectView, SpecialStageObject};
use super::perspective::PerspectiveTable;
use super::state::SimEvent;
use super::tables::SegmentType;
use crate::angle_distance;

pub const MARKER_END: u8 = 0xFF;
pub const MARKER_CHECKPOINT: u8 = 0xFE;
pub const MARKER_PRIZE: u8 = 0xFD;

/// Rings lost per bomb hit
pub const BOMB_RING_PENALTY: u16 = 10;
/// Angular half-width of the touch window
pub const COLLISION_ANGLE: u8 = 0x0C;
/// Ring counter ceiling
pub const MAX_RINGS: u16 = 999;

/// A character that can touch objects this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub angle: u8,
    /// Running on the track surface (airborne characters pass over objects)
    pub on_track: bool,
    /// Not hurt and not invulnerable
    pub can_be_hurt: bool,
}

/// What touching objects did to one character
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactResult {
    pub rings_collected: u16,
    pub bomb_hit: bool,
}

/// Stream cursor, counters and live objects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectManager {
    stream: Vec<u8>,
    cursor: usize,
    last_processed_segment: Option<usize>,
    objects: Vec<SpecialStageObject>,
    next_id: u32,
    pub ring_count: u16,
    /// Checkpoints passed in the stream so far
    pub act: u8,
    /// Rings-to-go counter is shown
    pub ring_countdown_display: bool,
    pub prize_spawned: bool,
    halted: bool,
}

impl ObjectManager {
    /// Start reading `stream` at `offset`
    pub fn new(stream: Vec<u8>, offset: usize) -> Self {
        let cursor = if offset > stream.len() {
            log::warn!("object stream offset {:#x} past end, stream is empty", offset);
            stream.len()
        } else {
            offset
        };
        Self {
            stream,
            cursor,
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn objects(&self) -> &[SpecialStageObject] {
        &self.objects
    }

    /// Stop spawning (stage is ending)
    pub fn halt(&mut self) {
        self.halted = true;
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.stream.get(self.cursor).copied();
        if byte.is_some() {
            self.cursor += 1;
        }
        byte
    }

    /// Read the records belonging to the segment after `segment_index`
    ///
    /// Runs at most once per segment index; returns the number of objects spawned.
    pub fn process_segment(
        &mut self,
        segment_index: usize,
        segment_type: SegmentType,
        events: &mut Vec<SimEvent>,
    ) -> usize {
        if self.halted || self.last_processed_segment == Some(segment_index) {
            return 0;
        }
        self.last_processed_segment = Some(segment_index);

        let depth_offset = segment_type.len() as u32 * 4;
        let mut spawned = 0;
        loop {
            let Some(head) = self.next_byte() else {
                log::warn!("object stream ran out at {:#x}", self.cursor);
                break;
            };

            if head & 0x80 != 0 {
                self.handle_marker(head, events);
                break;
            }

            let Some(angle) = self.next_byte() else {
                log::warn!("object record truncated at {:#x}", self.cursor);
                break;
            };
            let depth = (head & 0x3F) as u32 * 4 + depth_offset;
            let id = self.allocate_id();
            let object = if head & 0x40 != 0 {
                SpecialStageObject::bomb(id, angle, depth)
            } else {
                SpecialStageObject::ring(id, angle, depth)
            };
            self.objects.push(object);
            spawned += 1;
        }

        log::debug!("segment {}: spawned {} objects", segment_index, spawned);
        spawned
    }

    fn handle_marker(&mut self, marker: u8, events: &mut Vec<SimEvent>) {
        match marker {
            MARKER_END => {}
            MARKER_CHECKPOINT => {
                self.act += 1;
                log::info!("checkpoint {} reached with {} rings", self.act, self.ring_count);
                events.push(SimEvent::CheckpointReached {
                    act: self.act,
                    rings: self.ring_count,
                });
            }
            MARKER_PRIZE => {
                self.spawn_prize();
                events.push(SimEvent::PrizeReached);
            }
            _ => {
                self.ring_countdown_display = true;
            }
        }
    }

    /// Put the prize on the track
    pub fn spawn_prize(&mut self) {
        if self.prize_spawned {
            return;
        }
        let id = self.allocate_id();
        self.objects.push(SpecialStageObject::prize(id));
        self.prize_spawned = true;
    }

    pub fn collect_ring(&mut self) {
        self.ring_count = (self.ring_count + 1).min(MAX_RINGS);
    }

    /// Remove up to ten rings; returns how many were actually lost
    pub fn lose_rings(&mut self) -> u16 {
        let lost = self.ring_count.min(BOMB_RING_PENALTY);
        self.ring_count -= lost;
        lost
    }

    /// Advance every object one tick and drop finished ones
    pub fn update(&mut self, timing: ApproachTiming, events: &mut Vec<SimEvent>) {
        for object in &mut self.objects {
            if object.update(timing) == Some(ObjectSignal::PrizeCollected) {
                events.push(SimEvent::PrizeCollected);
            }
        }
        self.objects.retain(|o| !o.is_removed());
    }

    /// Resolve touches between one character and the collidable objects
    pub fn resolve_contact(&mut self, contact: Contact, events: &mut Vec<SimEvent>) -> ContactResult {
        let mut result = ContactResult::default();
        if !contact.on_track {
            return result;
        }

        let mut rings = 0;
        let mut bomb = false;
        for object in &mut self.objects {
            if !object.is_collidable() || angle_distance(object.angle, contact.angle) >= COLLISION_ANGLE {
                continue;
            }
            match object.kind {
                ObjectKind::Ring(_) => {
                    object.collect();
                    rings += 1;
                }
                ObjectKind::Bomb(_) if contact.can_be_hurt && !bomb => {
                    object.detonate();
                    bomb = true;
                }
                _ => {}
            }
        }

        for _ in 0..rings {
            self.collect_ring();
            events.push(SimEvent::RingCollected { total: self.ring_count });
        }
        result.rings_collected = rings;

        if bomb {
            let lost = self.lose_rings();
            events.push(SimEvent::BombHit { rings_lost: lost });
            result.bomb_hit = true;
        }
        result
    }

    /// Renderer views of every live object, in spawn order
    pub fn views(&self, perspective: &PerspectiveTable, frame: u8, flipped: bool) -> Vec<ObjectView> {
        self.objects
            .iter()
            .map(|o| o.view(perspective, frame, flipped))
            .collect()
    }
}
