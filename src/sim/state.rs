//! Stage session state
//!
//! One `SpecialStage` owns every component for the session. Nothing is
//! global: the host creates the context, initializes it with a stage and
//! its backing data, then calls `tick` once per 60Hz frame.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::checkpoint::{
    CheckpointController, CheckpointOutcome, CheckpointPhase, Hand, MessageLetter, RainbowRing,
};
use super::decoder::TrackFrameCache;
use super::intro::{IntroPhase, IntroSequencer};
use super::objects::ObjectView;
use super::perspective::PerspectiveTable;
use super::player::{CountdownTimer, InvulnerabilityTimer, Player, PlayerView};
use super::stream::ObjectManager;
use super::tables::frame_duration;
use super::track::TrackAnimator;
use crate::assets::{ACTS_PER_STAGE, AssetBundle, RingRequirements};
use crate::consts::STAGE_COUNT;
use crate::error::SimError;
use crate::settings::Settings;

/// Notifications raised during a tick, drained by the host afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// The object stream passed a checkpoint marker
    CheckpointReached { act: u8, rings: u16 },
    /// The object stream placed the prize
    PrizeReached,
    /// A checkpoint verdict was reached
    CheckpointResolved { act: u8, outcome: CheckpointOutcome },
    /// Fade the stage music (failed checkpoint)
    MusicFadeRequested,
    RingCollected { total: u16 },
    BombHit { rings_lost: u16 },
    PrizeCollected,
    /// The session is over
    StageComplete { outcome: StageOutcome },
}

/// How the stage is going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StageOutcome {
    #[default]
    InProgress,
    Failed,
    Cleared,
}

/// Everything that lives for one initialized stage
#[derive(Debug, Clone)]
pub struct Session<T: InvulnerabilityTimer = CountdownTimer> {
    pub stage: usize,
    pub team_mode: bool,
    pub ring_requirements: RingRequirements,
    pub durations: [u8; 8],
    /// 0-14, selects the frame duration
    pub speed_factor: u8,
    pub track: TrackAnimator,
    pub frames: TrackFrameCache,
    pub perspective: PerspectiveTable,
    pub objects: ObjectManager,
    /// Leader first, follower second in team mode
    pub players: Vec<Player>,
    pub timers: Vec<T>,
    pub checkpoint: CheckpointController,
    pub intro: IntroSequencer,
    pub outcome: StageOutcome,
    /// Cycles 0-4 once per simulated tick; segment records are read at 0
    pub drawing_index: u8,
    /// Dropped-frame accumulator, 16.16
    pub lag_accumulator: u32,
    /// Simulated ticks (skipped ticks excluded)
    pub time_ticks: u64,
    pub skipped_ticks: u64,
}

impl<T: InvulnerabilityTimer + Default> Session<T> {
    fn build(settings: &Settings, assets: &AssetBundle) -> Result<Self, SimError> {
        let stage = settings.stage.min(STAGE_COUNT - 1);
        assets.validate_track_frames()?;
        let layout = assets.stage_layout(stage)?;
        let durations = assets.duration_table()?;
        let ring_requirements = assets.ring_requirements(settings.team_mode)?;
        let perspective = PerspectiveTable::parse(&assets.perspective)?;
        let stream_offset = assets.object_stream_offset(stage)?;

        let player_count = if settings.team_mode { 2 } else { 1 };
        Ok(Self {
            stage,
            team_mode: settings.team_mode,
            ring_requirements,
            durations,
            speed_factor: settings.initial_speed_factor,
            track: TrackAnimator::new(layout),
            frames: TrackFrameCache::new(assets.track_frames.clone(), assets.patterns.clone()),
            perspective,
            objects: ObjectManager::new(assets.object_locations.clone(), stream_offset),
            players: (0..player_count).map(|_| Player::new()).collect(),
            timers: (0..player_count).map(|_| T::default()).collect(),
            checkpoint: CheckpointController::new(),
            intro: IntroSequencer::new(ring_requirements.required(stage, 1)),
            outcome: StageOutcome::InProgress,
            drawing_index: 0,
            lag_accumulator: 0,
            time_ticks: 0,
            skipped_ticks: 0,
        })
    }
}

impl<T: InvulnerabilityTimer> Session<T> {
    /// Frame duration for the current speed factor
    pub fn frame_duration(&self) -> u32 {
        frame_duration(&self.durations, self.speed_factor)
    }

    /// Rings needed at a checkpoint (1-based act)
    pub fn rings_required(&self, act: u8) -> u16 {
        self.ring_requirements.required(self.stage, act)
    }

    /// Checkpoint `act` is the last one of the stage
    pub fn is_final_act(&self, act: u8) -> bool {
        act as usize >= ACTS_PER_STAGE
    }
}

/// Simulation context; `Uninitialized` until a stage loads successfully
#[derive(Debug, Clone)]
pub struct SpecialStage<T: InvulnerabilityTimer = CountdownTimer> {
    pub settings: Settings,
    session: Option<Session<T>>,
    events: Vec<SimEvent>,
}

impl<T: InvulnerabilityTimer + Default> Default for SpecialStage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: InvulnerabilityTimer + Default> SpecialStage<T> {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            session: None,
            events: Vec::new(),
        }
    }

    /// Load a stage; on failure the context is left uninitialized
    pub fn initialize(&mut self, settings: Settings, assets: &AssetBundle) -> Result<(), SimError> {
        self.session = None;
        self.events.clear();
        let settings = settings.sanitized();

        match Session::build(&settings, assets) {
            Ok(session) => {
                log::info!(
                    "Stage {} initialized ({} segments, {})",
                    session.stage,
                    session.track.layout().len(),
                    if session.team_mode { "team" } else { "solo" }
                );
                self.settings = settings;
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                log::warn!("Stage {} failed to initialize: {}", settings.stage, e);
                Err(e)
            }
        }
    }

    /// Drop the session (full reset)
    pub fn reset(&mut self) {
        log::info!("Special stage reset");
        self.session = None;
        self.events.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session<T>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session<T>> {
        self.session.as_mut()
    }

    /// Split borrow for the tick
    pub(crate) fn parts_mut(&mut self) -> (&Settings, Option<&mut Session<T>>, &mut Vec<SimEvent>) {
        (&self.settings, self.session.as_mut(), &mut self.events)
    }

    pub fn outcome(&self) -> StageOutcome {
        self.session.as_ref().map_or(StageOutcome::InProgress, |s| s.outcome)
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Published state for the renderer
    pub fn snapshot(&mut self) -> Option<Snapshot> {
        let session = self.session.as_mut()?;
        let frame = session.track.current_frame();
        let flipped = session.track.orientation_flipped;
        let tiles = session.frames.get(frame, flipped).tiles.clone();

        Some(Snapshot {
            stage: session.stage,
            time_ticks: session.time_ticks,
            outcome: session.outcome,
            speed_factor: session.speed_factor,
            track_frame: frame,
            orientation_flipped: flipped,
            segment_index: session.track.segment_index,
            tiles,
            rings: session.objects.ring_count,
            ring_countdown_display: session.objects.ring_countdown_display,
            act: session.objects.act,
            objects: session.objects.views(&session.perspective, frame, flipped),
            players: session
                .players
                .iter()
                .zip(&session.timers)
                .map(|(p, t)| p.view(t))
                .collect(),
            checkpoint: CheckpointSnapshot {
                phase: session.checkpoint.phase,
                rings: session.checkpoint.rings.clone(),
                letters: session.checkpoint.letters.clone(),
                hand: session.checkpoint.hand,
            },
            intro: IntroSnapshot {
                phase: session.intro.phase,
                banner_y: session.intro.banner_y,
                banner_visible: session.intro.banner_visible,
                explode_radius: session.intro.explode_radius,
                message_position: session.intro.message_position,
                message_visible: session.intro.message_visible,
                rings_required: session.intro.rings_required,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    pub phase: CheckpointPhase,
    pub rings: Vec<RainbowRing>,
    pub letters: Vec<MessageLetter>,
    pub hand: Option<Hand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroSnapshot {
    pub phase: IntroPhase,
    pub banner_y: i32,
    pub banner_visible: bool,
    pub explode_radius: i32,
    pub message_position: IVec2,
    pub message_visible: bool,
    pub rings_required: u16,
}

/// Renderer-facing copy of the published state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stage: usize,
    pub time_ticks: u64,
    pub outcome: StageOutcome,
    pub speed_factor: u8,
    pub track_frame: u8,
    pub orientation_flipped: bool,
    pub segment_index: usize,
    /// Decoded 32x28 grid for `track_frame`
    pub tiles: Vec<u16>,
    pub rings: u16,
    pub ring_countdown_display: bool,
    pub act: u8,
    pub objects: Vec<ObjectView>,
    pub players: Vec<PlayerView>,
    pub checkpoint: CheckpointSnapshot,
    pub intro: IntroSnapshot,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::consts::TRACK_FRAME_COUNT;

    /// Seven-stage offset table followed by per-stage bodies
    pub fn offset_table(bodies: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = vec![0u8; STAGE_COUNT * 2];
        for i in 0..STAGE_COUNT {
            let offset = bytes.len() as u16;
            bytes[i * 2..i * 2 + 2].copy_from_slice(&offset.to_be_bytes());
            if let Some(body) = bodies.get(i) {
                bytes.extend_from_slice(body);
            }
        }
        bytes
    }

    /// Perspective buffer giving every frame the same ten-depth tube
    pub fn perspective_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; TRACK_FRAME_COUNT * 2];
        let shared = bytes.len() as u16;
        for frame in 0..TRACK_FRAME_COUNT {
            bytes[frame * 2..frame * 2 + 2].copy_from_slice(&shared.to_be_bytes());
        }
        bytes.extend_from_slice(&10u16.to_be_bytes());
        for depth in 0..10u8 {
            bytes.extend_from_slice(&[0x80, 0x70, 0x60 - depth * 4, 0x40 - depth * 2, 0, 0]);
        }
        bytes
    }

    /// A complete bundle for stage 0 with the given layout and object stream
    pub fn bundle(layout: &[u8], stream: &[u8], requirements: [u8; 4]) -> AssetBundle {
        let mut rings = vec![0u8; STAGE_COUNT * ACTS_PER_STAGE];
        rings[..ACTS_PER_STAGE].copy_from_slice(&requirements);
        AssetBundle {
            perspective: perspective_bytes(),
            layouts: offset_table(&[layout.to_vec()]),
            object_locations: offset_table(&[stream.to_vec()]),
            track_frames: vec![Vec::new(); TRACK_FRAME_COUNT],
            ring_requirements_solo: rings.clone(),
            ring_requirements_team: rings,
            durations: Vec::new(),
            patterns: Default::default(),
        }
    }
}
