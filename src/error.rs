//! Initialization failures
//!
//! Per-frame code never fails: out-of-range values are clamped and logged.
//! Only loading a stage can report an error, and doing so leaves the
//! simulation uninitialized.

/// Errors surfaced while initializing a stage session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Fewer than the 56 track images were supplied
    #[error("expected {expected} track frames, got {found}")]
    MissingTrackFrames { expected: usize, found: usize },

    /// A backing table is shorter than its header says it must be
    #[error("{table} table truncated: need {needed} bytes, have {actual}")]
    TruncatedTable {
        table: &'static str,
        needed: usize,
        actual: usize,
    },

    /// The selected stage has no segments
    #[error("stage {stage} layout is empty")]
    EmptyStageLayout { stage: usize },

    /// Animation-duration table must have exactly 8 entries
    #[error("duration table has {0} entries (must be 8)")]
    InvalidDurationTable(usize),

    /// A backing file could not be read
    #[error("asset {name} unavailable: {reason}")]
    MissingAsset { name: String, reason: String },

    /// Settings could not be parsed
    #[error("invalid settings: {0}")]
    Config(String),
}
