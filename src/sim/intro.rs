//! Stage-start banner sequence
//!
//! The banner drops in, its letters burst, the ring requirement is shown and
//! then drifts away. Player input is ignored until the message starts to
//! leave.

use glam::IVec2;
use serde::{Deserialize, Serialize};

pub const BANNER_START_Y: i32 = -0x30;
pub const BANNER_END_Y: i32 = 0x48;
pub const DROP_TICKS: u32 = 32;
pub const WAIT1_TICKS: u32 = 32;
/// Letter-burst radius growth per tick during the first wait
pub const EXPLODE_STEP: i32 = 2;
pub const WAIT2_TICKS: u32 = 64;
pub const FLYOUT_DISPLAY_TICKS: u32 = 48;
pub const FLYOUT_DRIFT_TICKS: u32 = 32;
/// Per-tick drift of the requirement message (up and to the right)
pub const FLYOUT_DRIFT: IVec2 = IVec2::new(2, -2);

const MESSAGE_START: IVec2 = IVec2::new(0x50, 0x70);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntroPhase {
    #[default]
    Drop,
    Wait1,
    Wait2,
    MessageFlyout,
    Gameplay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntroSequencer {
    pub phase: IntroPhase,
    pub banner_y: i32,
    pub banner_visible: bool,
    /// Radius of the bursting banner letters
    pub explode_radius: i32,
    pub message_position: IVec2,
    pub message_visible: bool,
    /// Rings needed for the first checkpoint, shown in the message
    pub rings_required: u16,
    phase_timer: u32,
}

impl IntroSequencer {
    pub fn new(rings_required: u16) -> Self {
        Self {
            phase: IntroPhase::Drop,
            banner_y: BANNER_START_Y,
            banner_visible: true,
            explode_radius: 0,
            message_position: MESSAGE_START,
            message_visible: false,
            rings_required,
            phase_timer: 0,
        }
    }

    /// Player controls are live
    pub fn accepts_input(&self) -> bool {
        matches!(self.phase, IntroPhase::MessageFlyout | IntroPhase::Gameplay)
    }

    pub fn update(&mut self) {
        self.phase_timer += 1;
        let t = self.phase_timer;
        match self.phase {
            IntroPhase::Drop => {
                let span = BANNER_END_Y - BANNER_START_Y;
                self.banner_y = BANNER_START_Y + span * t.min(DROP_TICKS) as i32 / DROP_TICKS as i32;
                if t >= DROP_TICKS {
                    self.enter(IntroPhase::Wait1);
                }
            }
            IntroPhase::Wait1 => {
                self.explode_radius += EXPLODE_STEP;
                if t >= WAIT1_TICKS {
                    self.banner_visible = false;
                    self.message_visible = true;
                    self.enter(IntroPhase::Wait2);
                }
            }
            IntroPhase::Wait2 => {
                if t >= WAIT2_TICKS {
                    self.enter(IntroPhase::MessageFlyout);
                }
            }
            IntroPhase::MessageFlyout => {
                if t > FLYOUT_DISPLAY_TICKS {
                    self.message_position += FLYOUT_DRIFT;
                }
                if t >= FLYOUT_DISPLAY_TICKS + FLYOUT_DRIFT_TICKS {
                    self.message_visible = false;
                    self.enter(IntroPhase::Gameplay);
                }
            }
            IntroPhase::Gameplay => {}
        }
    }

    fn enter(&mut self, phase: IntroPhase) {
        log::debug!("intro -> {:?}", phase);
        self.phase = phase;
        self.phase_timer = 0;
    }
}
