//! Deterministic simulation module
//!
//! All per-frame logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only, one `tick` per 60Hz frame
//! - Fixed-point integer arithmetic only (8.8 trig, 16.16 depth)
//! - Stable iteration order (objects in spawn order)
//! - No rendering, audio or platform dependencies

pub mod checkpoint;
pub mod decoder;
pub mod intro;
pub mod objects;
pub mod perspective;
pub mod player;
pub mod state;
pub mod stream;
pub mod tables;
pub mod tick;
pub mod track;

pub use checkpoint::{CheckpointController, CheckpointOutcome, CheckpointPhase, resolve_outcome};
pub use decoder::{DecodedFrame, TrackFrameCache, decode_frame};
pub use intro::{IntroPhase, IntroSequencer};
pub use objects::{ObjectKind, ObjectView, SpecialStageObject};
pub use perspective::{PerspectiveEntry, PerspectiveTable};
pub use player::{CountdownTimer, InvulnerabilityTimer, Player, PlayerView, RoutineState};
pub use state::{Session, SimEvent, Snapshot, SpecialStage, StageOutcome};
pub use stream::ObjectManager;
pub use tables::SegmentType;
pub use tick::{TickInput, tick};
pub use track::{Segment, TrackAnimator};
