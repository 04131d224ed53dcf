//! Checkpoint resolution sequence
//!
//! Triggered when the object stream reaches a checkpoint marker:
//! 1. Rainbow: seven rings arc across the screen, one step per track beat
//! 2. The outcome is resolved against the ring requirement
//! 3. A message word is held on screen with a bobbing hand
//! 4. Success flies the letters out radially; failure fades the music out

use std::collections::VecDeque;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::state::SimEvent;
use super::tables::atan;
use crate::consts::{SCREEN_CENTER_X, SCREEN_CENTER_Y, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::polar_to_track;

pub const RAINBOW_RING_COUNT: usize = 7;
/// Ring whose x position ends the rainbow early
pub const SENTINEL_RING: usize = 6;
pub const SENTINEL_X: i32 = 0xE8;

pub const SUCCESS_MESSAGE: &str = "COOL!";
pub const FAILURE_MESSAGE: &str = "NOT ENOUGH RINGS...";
pub const MESSAGE_HOLD_TICKS: u32 = 60;
pub const FLYOUT_SPEED: i32 = 4;
pub const FADE_TICKS: u32 = 64;
pub const HAND_BOB_TICKS: u32 = 4;

/// Message baseline and glyph advance
const MESSAGE_Y: i32 = 0x58;
const LETTER_WIDTH: i32 = 8;
/// Hand sits to the right of the word
const HAND_OFFSET_X: i32 = 0x10;
/// Letters are gone once their 8px sprite clears the screen
const OFFSCREEN_MARGIN: i32 = 8;

/// Art frame for each step of a rainbow ring's life
const RAINBOW_FRAMES: [u8; 20] = [0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 4, 4, 3, 3, 2, 2, 1, 1];

const RAINBOW_POSITION_COUNT: usize = 48;

/// Arc across the upper screen: x advances 4 px per step, y dips then rises
const RAINBOW_POSITIONS: [(i32, i32); RAINBOW_POSITION_COUNT] = rainbow_positions();

const fn rainbow_positions() -> [(i32, i32); RAINBOW_POSITION_COUNT] {
    let mut table = [(0, 0); RAINBOW_POSITION_COUNT];
    let mut k = 0;
    while k < RAINBOW_POSITION_COUNT {
        let from_mid = k as i32 - 24;
        table[k] = (0x58 + 4 * k as i32, 0x30 + from_mid * from_mid / 16);
        k += 1;
    }
    table
}

/// Vertical bob of the hand, stepped every `HAND_BOB_TICKS`
const HAND_BOB: [i32; 8] = [0, -1, -2, -3, -3, -2, -1, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CheckpointPhase {
    #[default]
    None,
    Rainbow,
    MessageDisplay,
    MessageFlyout,
    FadeOut,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointOutcome {
    Passed,
    Failed,
    StageComplete,
}

/// Compare rings against the requirement
pub fn resolve_outcome(collected: u16, required: u16, is_final: bool) -> CheckpointOutcome {
    if collected < required {
        CheckpointOutcome::Failed
    } else if is_final {
        CheckpointOutcome::StageComplete
    } else {
        CheckpointOutcome::Passed
    }
}

/// Tile offset for a message character; `None` draws nothing
pub fn letter_tile(ch: char) -> Option<u16> {
    match ch {
        'A'..='Z' => Some((ch as u16 - 'A' as u16) * 2),
        '!' => Some(0x34),
        '.' => Some(0x36),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RainbowRing {
    /// Screen position
    pub position: IVec2,
    pub frame: u8,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLetter {
    pub ch: char,
    pub tile: u16,
    pub position: IVec2,
    /// Flyout direction
    pub angle: u8,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    pub position: IVec2,
    pub thumbs_up: bool,
}

/// One checkpoint's presentation and verdict
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointController {
    pub phase: CheckpointPhase,
    pub act: u8,
    pub required: u16,
    pub collected: u16,
    pub is_final: bool,
    pub outcome: Option<CheckpointOutcome>,
    /// Beats since the rainbow started
    pub beats: u32,
    pub rings: Vec<RainbowRing>,
    pub letters: Vec<MessageLetter>,
    pub hand: Option<Hand>,
    phase_timer: u32,
    /// Checkpoints reached while another was still running
    queued: VecDeque<QueuedCheckpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct QueuedCheckpoint {
    act: u8,
    collected: u16,
    required: u16,
    is_final: bool,
}

impl CheckpointController {
    pub fn new() -> Self {
        Self::default()
    }

    /// A checkpoint sequence is running
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, CheckpointPhase::None | CheckpointPhase::Complete)
    }

    /// Start a new checkpoint session
    ///
    /// A checkpoint reached while another is still running waits until
    /// that one completes.
    pub fn begin(&mut self, act: u8, collected: u16, required: u16, is_final: bool) {
        if self.is_active() {
            log::warn!(
                "Checkpoint {} reached while checkpoint {} is {:?}; queued",
                act,
                self.act,
                self.phase
            );
            self.queued.push_back(QueuedCheckpoint {
                act,
                collected,
                required,
                is_final,
            });
            return;
        }
        let queued = std::mem::take(&mut self.queued);
        log::info!(
            "Checkpoint {}: {} rings, {} required{}",
            act,
            collected,
            required,
            if is_final { " (final)" } else { "" }
        );
        *self = Self {
            phase: CheckpointPhase::Rainbow,
            act,
            required,
            collected,
            is_final,
            rings: vec![
                RainbowRing {
                    position: IVec2::ZERO,
                    frame: 0,
                    visible: false,
                };
                RAINBOW_RING_COUNT
            ],
            queued,
            ..Default::default()
        };
    }

    /// Start the next queued checkpoint once the current one is done
    pub fn start_queued(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        match self.queued.pop_front() {
            Some(next) => {
                self.begin(next.act, next.collected, next.required, next.is_final);
                true
            }
            None => false,
        }
    }

    /// Advance one tick; `beat` is true on ticks where the track stepped a frame
    pub fn update(&mut self, beat: bool, events: &mut Vec<SimEvent>) {
        match self.phase {
            CheckpointPhase::None | CheckpointPhase::Complete => {}
            CheckpointPhase::Rainbow => {
                if beat && self.step_rainbow() {
                    self.resolve(events);
                }
            }
            CheckpointPhase::MessageDisplay => self.update_message(events),
            CheckpointPhase::MessageFlyout => self.update_flyout(),
            CheckpointPhase::FadeOut => {
                self.phase_timer += 1;
                if self.phase_timer >= FADE_TICKS {
                    self.phase = CheckpointPhase::Complete;
                }
            }
        }
    }

    /// One rainbow beat; true when the rainbow is over
    fn step_rainbow(&mut self) -> bool {
        self.beats += 1;
        let beats = self.beats as usize;

        let mut all_done = true;
        for (i, ring) in self.rings.iter_mut().enumerate() {
            if beats < i {
                all_done = false;
                continue;
            }
            let step = beats - i;
            match RAINBOW_FRAMES.get(step) {
                Some(&frame) => {
                    let (x, y) = RAINBOW_POSITIONS[(i * 2 + beats).min(RAINBOW_POSITION_COUNT - 1)];
                    ring.position = IVec2::new(x, y);
                    ring.frame = frame;
                    ring.visible = true;
                    all_done = false;
                }
                None => ring.visible = false,
            }
        }

        let sentinel = &self.rings[SENTINEL_RING];
        all_done || (sentinel.visible && sentinel.position.x == SENTINEL_X)
    }

    fn resolve(&mut self, events: &mut Vec<SimEvent>) {
        let outcome = resolve_outcome(self.collected, self.required, self.is_final);
        log::info!("Checkpoint {} resolved: {:?}", self.act, outcome);
        self.outcome = Some(outcome);
        events.push(SimEvent::CheckpointResolved {
            act: self.act,
            outcome,
        });

        for ring in &mut self.rings {
            ring.visible = false;
        }

        let success = outcome != CheckpointOutcome::Failed;
        let word = if success { SUCCESS_MESSAGE } else { FAILURE_MESSAGE };
        self.letters = layout_message(word);
        let right_edge = self.letters.last().map_or(SCREEN_CENTER_X, |l| l.position.x);
        self.hand = Some(Hand {
            position: IVec2::new(right_edge + HAND_OFFSET_X, MESSAGE_Y),
            thumbs_up: success,
        });
        self.phase = CheckpointPhase::MessageDisplay;
        self.phase_timer = 0;
    }

    fn update_message(&mut self, events: &mut Vec<SimEvent>) {
        self.phase_timer += 1;
        if let Some(hand) = &mut self.hand {
            let bob = HAND_BOB[((self.phase_timer / HAND_BOB_TICKS) as usize) % HAND_BOB.len()];
            hand.position.y = MESSAGE_Y + bob;
        }
        if self.phase_timer < MESSAGE_HOLD_TICKS {
            return;
        }

        self.hand = None;
        self.phase_timer = 0;
        if self.outcome == Some(CheckpointOutcome::Failed) {
            events.push(SimEvent::MusicFadeRequested);
            self.phase = CheckpointPhase::FadeOut;
        } else {
            let center = IVec2::new(SCREEN_CENTER_X, SCREEN_CENTER_Y);
            for letter in &mut self.letters {
                let offset = letter.position - center;
                letter.angle = atan(offset.x, offset.y);
            }
            self.phase = CheckpointPhase::MessageFlyout;
        }
    }

    fn update_flyout(&mut self) {
        for letter in self.letters.iter_mut().filter(|l| l.visible) {
            letter.position += polar_to_track(letter.angle, FLYOUT_SPEED);
            if offscreen(letter.position) {
                letter.visible = false;
            }
        }
        if self.letters.iter().all(|l| !l.visible) {
            self.phase = CheckpointPhase::Complete;
        }
    }
}

fn offscreen(p: IVec2) -> bool {
    p.x < -OFFSCREEN_MARGIN
        || p.x > SCREEN_WIDTH + OFFSCREEN_MARGIN
        || p.y < -OFFSCREEN_MARGIN
        || p.y > SCREEN_HEIGHT + OFFSCREEN_MARGIN
}

/// Centre a word on the message line; spaces take room but no sprite
fn layout_message(word: &str) -> Vec<MessageLetter> {
    let width = word.chars().count() as i32 * LETTER_WIDTH;
    let mut x = (SCREEN_WIDTH - width) / 2;
    let mut letters = Vec::new();
    for ch in word.chars() {
        if let Some(tile) = letter_tile(ch) {
            letters.push(MessageLetter {
                ch,
                tile,
                position: IVec2::new(x, MESSAGE_Y),
                angle: 0,
                visible: true,
            });
        }
        x += LETTER_WIDTH;
    }
    letters
}
