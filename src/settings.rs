//! Session settings
//!
//! Loaded once per stage session from JSON. Every field has a default so a
//! partial file (or none at all) still yields a playable session.

use serde::{Deserialize, Serialize};

use crate::consts::STAGE_COUNT;
use crate::error::SimError;

/// Highest speed factor the duration table understands
pub const MAX_SPEED_FACTOR: u8 = 14;

/// One whole frame expressed in the 16.16 lag ratio
pub const LAG_ONE: u32 = 0x1_0000;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Stage to play (0-based)
    pub stage: usize,
    /// Two-player team: team ring table plus a follower character
    pub team_mode: bool,

    // === Speed ===
    /// Speed factor at stage start (0-14)
    pub initial_speed_factor: u8,
    /// Speed factor gained per passed checkpoint
    pub speed_step_per_act: u8,
    /// Speed factor ceiling
    pub max_speed_factor: u8,

    // === Timing ===
    /// Dropped-frame emulation rate, 16.16 fixed point (0 = never skip)
    pub lag_ratio: u32,
    /// Invulnerability after a bomb hit, in ticks
    pub invulnerability_frames: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stage: 0,
            team_mode: false,

            initial_speed_factor: 8,
            speed_step_per_act: 2,
            max_speed_factor: 12,

            lag_ratio: 0,
            invulnerability_frames: 120,
        }
    }
}

impl Settings {
    /// Parse settings from JSON and clamp them into range
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| SimError::Config(e.to_string()))?;
        Ok(settings.sanitized())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Load settings from a file, falling back to defaults when it is absent
    pub fn load(path: &std::path::Path) -> Result<Self, SimError> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let settings = Self::from_json(&json)?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
            Err(e) => Err(SimError::Config(e.to_string())),
        }
    }

    /// Clamp every field into its legal range, logging substitutions
    pub fn sanitized(mut self) -> Self {
        if self.stage >= STAGE_COUNT {
            log::warn!("stage {} out of range, using {}", self.stage, STAGE_COUNT - 1);
            self.stage = STAGE_COUNT - 1;
        }
        if self.max_speed_factor > MAX_SPEED_FACTOR {
            log::warn!("max_speed_factor {} clamped", self.max_speed_factor);
            self.max_speed_factor = MAX_SPEED_FACTOR;
        }
        if self.initial_speed_factor > MAX_SPEED_FACTOR {
            log::warn!("initial_speed_factor {} clamped", self.initial_speed_factor);
            self.initial_speed_factor = MAX_SPEED_FACTOR;
        }
        if self.lag_ratio >= LAG_ONE {
            log::warn!("lag_ratio {:#x} would skip every tick, disabling", self.lag_ratio);
            self.lag_ratio = 0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{ "stage": 3, "team_mode": true }"#).unwrap();
        assert_eq!(settings.stage, 3);
        assert!(settings.team_mode);
        assert_eq!(settings.initial_speed_factor, 8);
        assert_eq!(settings.invulnerability_frames, 120);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let settings =
            Settings::from_json(r#"{ "stage": 12, "max_speed_factor": 40, "lag_ratio": 131072 }"#)
                .unwrap();
        assert_eq!(settings.stage, STAGE_COUNT - 1);
        assert_eq!(settings.max_speed_factor, MAX_SPEED_FACTOR);
        assert_eq!(settings.lag_ratio, 0);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            Settings::from_json("{ stage: "),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = Settings {
            team_mode: true,
            lag_ratio: 0x0800,
            ..Default::default()
        };
        assert_eq!(Settings::from_json(&settings.to_json()).unwrap(), settings);
    }
}
