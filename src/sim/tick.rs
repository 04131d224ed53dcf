//! Fixed timestep simulation tick
//!
//! Advances every component of an initialized stage by one 60Hz frame:
//! 1. dropped-frame emulation (may skip the whole tick)
//! 2. track animation and the decoded-frame cache
//! 3. object approach, then the stream records for the current segment
//! 4. characters, then their contacts with objects
//! 5. checkpoint and intro presentation
//! 6. speed progression and the stage outcome

use super::checkpoint::{CheckpointOutcome, CheckpointPhase};
use super::objects::ApproachTiming;
use super::player::{Controls, InvulnerabilityTimer};
use super::state::{Session, SimEvent, SpecialStage, StageOutcome};
use super::stream::Contact;
use crate::settings::{LAG_ONE, Settings};

pub use super::player::{
    BUTTON_A, BUTTON_B, BUTTON_C, BUTTON_DOWN, BUTTON_JUMP, BUTTON_LEFT, BUTTON_RIGHT,
    BUTTON_START, BUTTON_UP,
};

/// Drawing index period
pub const DRAWING_INDEX_CYCLE: u8 = 5;

/// Input for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    /// Buttons held this tick (`BUTTON_*` bits)
    pub held: u8,
    /// Buttons newly pressed this tick
    pub pressed: u8,
}

impl TickInput {
    fn controls(&self) -> Controls {
        Controls {
            held: self.held,
            pressed: self.pressed,
        }
    }
}

/// Advance the stage by one fixed timestep
///
/// A no-op before initialization and after the stage has ended.
pub fn tick<T: InvulnerabilityTimer + Default>(sim: &mut SpecialStage<T>, input: &TickInput) {
    let (settings, session, events) = sim.parts_mut();
    let Some(s) = session else {
        return;
    };
    if s.outcome != StageOutcome::InProgress {
        return;
    }

    // Emulated dropped frame: nothing advances
    if settings.lag_ratio > 0 {
        s.lag_accumulator += settings.lag_ratio;
        if s.lag_accumulator >= LAG_ONE {
            s.lag_accumulator -= LAG_ONE;
            s.skipped_ticks += 1;
            return;
        }
    }
    s.time_ticks += 1;

    let mut raised = Vec::new();

    // Track
    let duration = s.frame_duration();
    let timing = ApproachTiming {
        duration,
        phase: s.track.frame_delay_counter,
    };
    let step = s.track.update(duration);
    if s.track.stage_complete {
        log::info!("Stage {} layout wrapped, looping", s.stage);
        s.track.clear_stage_complete();
    }
    if step.frame_advanced {
        let frame = s.track.current_frame();
        s.frames.get(frame, s.track.orientation_flipped);
    }

    // Objects
    s.objects.update(timing, &mut raised);
    if step.segment_changed || s.drawing_index == 0 {
        let segment = s.track.current_segment();
        s.objects
            .process_segment(s.track.segment_index, segment.kind, &mut raised);
    }

    update_players(s, settings, input);
    resolve_contacts(s, &mut raised);

    // Checkpoints reached this tick start their sequence now
    for event in raised.clone() {
        match event {
            SimEvent::CheckpointReached { act, rings } => {
                let required = s.rings_required(act);
                let is_final = s.is_final_act(act);
                s.checkpoint.begin(act, rings, required, is_final);
            }
            SimEvent::PrizeCollected => {
                log::info!("Prize collected");
                s.outcome = StageOutcome::Cleared;
            }
            _ => {}
        }
    }

    update_checkpoint(s, settings, step.frame_advanced, &mut raised);
    s.intro.update();

    if s.outcome != StageOutcome::InProgress {
        log::info!("Stage {} over: {:?} after {} ticks", s.stage, s.outcome, s.time_ticks);
        s.objects.halt();
        raised.push(SimEvent::StageComplete { outcome: s.outcome });
    }

    s.drawing_index = (s.drawing_index + 1) % DRAWING_INDEX_CYCLE;
    events.extend(raised);
}

/// Leader takes live input (once the intro allows it); the follower replays
/// the leader's input from `HISTORY_LEN` ticks earlier
fn update_players<T: InvulnerabilityTimer>(s: &mut Session<T>, settings: &Settings, input: &TickInput) {
    let controls = if s.intro.accepts_input() {
        input.controls()
    } else {
        Controls::default()
    };

    let Some(leader) = s.players.first_mut() else {
        return;
    };
    let delayed = leader.delayed_controls();
    leader.record_controls(controls);

    for (i, (player, timer)) in s.players.iter_mut().zip(s.timers.iter_mut()).enumerate() {
        let controls = if i == 0 { controls } else { delayed };
        player.update(controls, timer, settings.invulnerability_frames);
    }
}

fn resolve_contacts<T: InvulnerabilityTimer>(s: &mut Session<T>, raised: &mut Vec<SimEvent>) {
    for (player, timer) in s.players.iter_mut().zip(s.timers.iter()) {
        let contact = Contact {
            angle: player.angle,
            on_track: player.on_track(),
            can_be_hurt: !player.hurt && !timer.is_active(),
        };
        if s.objects.resolve_contact(contact, raised).bomb_hit {
            player.hurt();
        }
    }
}

fn update_checkpoint<T: InvulnerabilityTimer>(
    s: &mut Session<T>,
    settings: &Settings,
    beat: bool,
    raised: &mut Vec<SimEvent>,
) {
    let was_complete = s.checkpoint.phase == CheckpointPhase::Complete;
    let mut resolved = Vec::new();
    s.checkpoint.update(beat, &mut resolved);

    for event in &resolved {
        if let SimEvent::CheckpointResolved { outcome, .. } = *event {
            match outcome {
                CheckpointOutcome::Passed => {
                    let faster = s
                        .speed_factor
                        .saturating_add(settings.speed_step_per_act)
                        .min(settings.max_speed_factor);
                    if faster > s.speed_factor {
                        log::info!("Speed factor {} -> {}", s.speed_factor, faster);
                        s.speed_factor = faster;
                    }
                }
                CheckpointOutcome::Failed => s.objects.halt(),
                CheckpointOutcome::StageComplete => {}
            }
        }
    }
    raised.extend(resolved);

    if !was_complete && s.checkpoint.phase == CheckpointPhase::Complete {
        match s.checkpoint.outcome {
            Some(CheckpointOutcome::Failed) => s.outcome = StageOutcome::Failed,
            Some(CheckpointOutcome::StageComplete) if !s.objects.prize_spawned => {
                // Stream carried no prize marker after the last checkpoint
                s.objects.spawn_prize();
                raised.push(SimEvent::PrizeReached);
            }
            _ => {}
        }
    }

    if s.outcome == StageOutcome::InProgress {
        s.checkpoint.start_queued();
    }
}
