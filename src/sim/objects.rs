//! Rings, bombs and the prize
//!
//! Objects approach the player along the tube. Depth is 16.16 fixed point
//! and shrinks in lockstep with the track animation, so an object spawned
//! `n` track frames ahead arrives exactly `n` frames later at any speed.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::perspective::PerspectiveTable;
use super::tables::anim_index_for_depth;
use crate::consts::DEPTH_SHIFT;

/// Depth lost per tick at the reference speed (16.16)
pub const BASE_DECREMENT: u32 = 0x8000;
/// Track-frame duration at the reference speed
pub const BASE_DURATION: u32 = 8;
/// Depth lost over one whole track-animation step (4.0)
pub const STEP_DECREMENT: u32 = BASE_DECREMENT * BASE_DURATION;

/// Perspective size at which objects touch the player
pub const COLLISION_ANIM_INDEX: u8 = 8;

/// Ring sparkle: frames x ticks per frame
const RING_SPARKLE_FRAMES: u8 = 4;
const RING_SPARKLE_TICKS: u8 = 6;
/// Ring spin cycle while approaching
const RING_SPIN_FRAMES: u8 = 4;
const RING_SPIN_TICKS: u8 = 4;
/// Bomb explosion: frames x ticks per frame
const BOMB_EXPLODE_FRAMES: u8 = 5;
const BOMB_EXPLODE_TICKS: u8 = 4;

/// Prize spawn placement
pub const PRIZE_SPAWN_DEPTH: u32 = 30;
pub const PRIZE_SPAWN_ANGLE: u8 = 0x40;
/// Prize timings (ticks)
pub const PRIZE_INIT_TICKS: u32 = 60;
pub const PRIZE_ARRIVE_DEPTH: u32 = 4;
pub const PRIZE_HOLD_TICKS: u32 = 30;
pub const PRIZE_COLLECT_TICKS: u32 = 32;

/// Depth decrement for one tick
///
/// `phase` is how many ticks of the current track step have elapsed. The
/// step total is spread so that `d` consecutive phases sum to exactly
/// `STEP_DECREMENT`, whatever the duration. Where `d` does not divide the
/// step (60, 30, 15, 10, 6, 5) single ticks are one unit above the
/// truncated `STEP_DECREMENT / d`.
pub fn depth_decrement(duration: u32, phase: u32) -> u32 {
    let d = duration.max(1) as u64;
    let k = (phase as u64).min(d - 1);
    let total = STEP_DECREMENT as u64;
    ((k + 1) * total / d - k * total / d) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RingState {
    Active,
    Collected,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BombState {
    Active,
    Exploding,
    Removed,
}

/// Prize sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrizePhase {
    /// Waiting off-screen before it starts moving
    Initializing,
    /// Closing in on the player
    Approaching,
    /// Hovering in front of the player
    Arrived,
    /// Grab flash
    Collected,
    /// Done; removed after signalling
    Finished,
}

/// Variant plus its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Ring(RingState),
    Bomb(BombState),
    Prize(PrizePhase),
}

/// Something an object reports back from its update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSignal {
    PrizeCollected,
}

/// Timing shared by every object this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproachTiming {
    /// Current track-frame duration
    pub duration: u32,
    /// Ticks elapsed in the current track step
    pub phase: u32,
}

impl ApproachTiming {
    pub fn decrement(&self) -> u32 {
        depth_decrement(self.duration, self.phase)
    }
}

/// A ring, bomb or prize on the track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialStageObject {
    pub id: u32,
    pub kind: ObjectKind,
    /// Track angle (0-255)
    pub angle: u8,
    /// Distance from the viewer, 16.16
    pub depth: u32,
    /// Perspective size (0 = farthest, 9 = closest)
    pub anim_index: u8,
    pub anim_frame: u8,
    pub anim_timer: u8,
    /// Prize phase timer
    pub phase_timer: u32,
}

impl SpecialStageObject {
    fn new(id: u32, kind: ObjectKind, angle: u8, depth_units: u32) -> Self {
        let mut object = Self {
            id,
            kind,
            angle,
            depth: depth_units << DEPTH_SHIFT,
            anim_index: 0,
            anim_frame: 0,
            anim_timer: 0,
            phase_timer: 0,
        };
        object.refresh_anim_index();
        object
    }

    pub fn ring(id: u32, angle: u8, depth_units: u32) -> Self {
        Self::new(id, ObjectKind::Ring(RingState::Active), angle, depth_units)
    }

    pub fn bomb(id: u32, angle: u8, depth_units: u32) -> Self {
        Self::new(id, ObjectKind::Bomb(BombState::Active), angle, depth_units)
    }

    pub fn prize(id: u32) -> Self {
        Self::new(
            id,
            ObjectKind::Prize(PrizePhase::Initializing),
            PRIZE_SPAWN_ANGLE,
            PRIZE_SPAWN_DEPTH,
        )
    }

    /// Integer part of the depth
    #[inline]
    pub fn depth_units(&self) -> u32 {
        self.depth >> DEPTH_SHIFT
    }

    /// Ring or bomb still in play at the touching size
    pub fn is_collidable(&self) -> bool {
        let active = matches!(
            self.kind,
            ObjectKind::Ring(RingState::Active) | ObjectKind::Bomb(BombState::Active)
        );
        active && self.anim_index == COLLISION_ANIM_INDEX
    }

    pub fn is_removed(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Ring(RingState::Removed)
                | ObjectKind::Bomb(BombState::Removed)
                | ObjectKind::Prize(PrizePhase::Finished)
        )
    }

    /// Ring touched by the player
    pub fn collect(&mut self) {
        if self.kind == ObjectKind::Ring(RingState::Active) {
            self.kind = ObjectKind::Ring(RingState::Collected);
            self.anim_frame = 0;
            self.anim_timer = 0;
        }
    }

    /// Bomb touched by the player
    pub fn detonate(&mut self) {
        if self.kind == ObjectKind::Bomb(BombState::Active) {
            self.kind = ObjectKind::Bomb(BombState::Exploding);
            self.anim_frame = 0;
            self.anim_timer = 0;
        }
    }

    /// Advance one tick
    pub fn update(&mut self, timing: ApproachTiming) -> Option<ObjectSignal> {
        match self.kind {
            ObjectKind::Ring(RingState::Active) => {
                self.approach(timing);
                self.cycle_frames(RING_SPIN_FRAMES, RING_SPIN_TICKS);
                if self.depth == 0 {
                    self.kind = ObjectKind::Ring(RingState::Removed);
                }
                None
            }
            ObjectKind::Ring(RingState::Collected) => {
                if self.play_once(RING_SPARKLE_FRAMES, RING_SPARKLE_TICKS) {
                    self.kind = ObjectKind::Ring(RingState::Removed);
                }
                None
            }
            ObjectKind::Bomb(BombState::Active) => {
                self.approach(timing);
                if self.depth == 0 {
                    self.kind = ObjectKind::Bomb(BombState::Removed);
                }
                None
            }
            ObjectKind::Bomb(BombState::Exploding) => {
                if self.play_once(BOMB_EXPLODE_FRAMES, BOMB_EXPLODE_TICKS) {
                    self.kind = ObjectKind::Bomb(BombState::Removed);
                }
                None
            }
            ObjectKind::Prize(phase) => self.update_prize(phase, timing),
            ObjectKind::Ring(RingState::Removed) | ObjectKind::Bomb(BombState::Removed) => None,
        }
    }

    fn update_prize(&mut self, phase: PrizePhase, timing: ApproachTiming) -> Option<ObjectSignal> {
        self.phase_timer += 1;
        match phase {
            PrizePhase::Initializing => {
                if self.phase_timer >= PRIZE_INIT_TICKS {
                    self.enter_prize_phase(PrizePhase::Approaching);
                }
            }
            PrizePhase::Approaching => {
                self.approach(timing);
                if self.depth_units() <= PRIZE_ARRIVE_DEPTH {
                    self.enter_prize_phase(PrizePhase::Arrived);
                }
            }
            PrizePhase::Arrived => {
                // Gentle bob while hovering
                self.anim_frame = ((self.phase_timer >> 3) & 1) as u8;
                if self.phase_timer >= PRIZE_HOLD_TICKS {
                    self.enter_prize_phase(PrizePhase::Collected);
                }
            }
            PrizePhase::Collected => {
                self.anim_frame = ((self.phase_timer >> 2) & 1) as u8;
                if self.phase_timer >= PRIZE_COLLECT_TICKS {
                    self.enter_prize_phase(PrizePhase::Finished);
                    return Some(ObjectSignal::PrizeCollected);
                }
            }
            PrizePhase::Finished => {}
        }
        None
    }

    fn enter_prize_phase(&mut self, phase: PrizePhase) {
        log::debug!("prize {} -> {:?}", self.id, phase);
        self.kind = ObjectKind::Prize(phase);
        self.phase_timer = 0;
        self.anim_frame = 0;
    }

    fn approach(&mut self, timing: ApproachTiming) {
        self.depth = self.depth.saturating_sub(timing.decrement());
        self.refresh_anim_index();
    }

    fn refresh_anim_index(&mut self) {
        self.anim_index = anim_index_for_depth(self.depth_units());
    }

    fn cycle_frames(&mut self, frames: u8, ticks: u8) {
        self.anim_timer += 1;
        if self.anim_timer >= ticks {
            self.anim_timer = 0;
            self.anim_frame = (self.anim_frame + 1) % frames;
        }
    }

    /// Step a one-shot animation; true once its last frame has been shown
    fn play_once(&mut self, frames: u8, ticks: u8) -> bool {
        self.anim_timer += 1;
        if self.anim_timer >= ticks {
            self.anim_timer = 0;
            self.anim_frame += 1;
        }
        self.anim_frame >= frames
    }

    /// Renderer view of this object for the given track frame
    pub fn view(&self, perspective: &PerspectiveTable, frame: u8, flipped: bool) -> ObjectView {
        let entry = perspective.get_entry(frame, self.depth_units());
        let (screen, visible) = match entry {
            Some(e) => (
                e.screen_position(self.angle, flipped),
                e.is_angle_visible(self.angle, flipped),
            ),
            None => (IVec2::ZERO, false),
        };
        ObjectView {
            id: self.id,
            kind: self.kind,
            screen,
            anim_index: self.anim_index,
            anim_frame: self.anim_frame,
            visible,
        }
    }
}

/// What the renderer needs for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectView {
    pub id: u32,
    pub kind: ObjectKind,
    pub screen: IVec2,
    pub anim_index: u8,
    pub anim_frame: u8,
    pub visible: bool,
}
