//! Data-driven game balance
//!
//! Every gameplay constant that a designer might want to tweak lives here.
//! Loaded from the `skyhop_tuning` key as partial JSON; anything missing
//! falls back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::Viewport;
use crate::consts::*;
use crate::persistence::DualStore;
use crate::sim::generator::GeneratorConfig;

/// Gameplay tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Gravity (units/tick²)
    pub gravity: f32,
    /// Charge gained per frame while held
    pub charge_rate: f32,
    /// Charge cap
    pub max_charge: f32,
    /// Vertical landing window around a platform top (±)
    pub landing_tolerance: f32,
    /// Centre distance below which a landing is perfect (strict)
    pub perfect_radius: f32,
    /// Combo multiplier cap
    pub max_combo: u32,
    /// Points per landing, multiplied by combo
    pub base_points: u64,
    /// Extra points per perfect landing, multiplied by combo
    pub perfect_bonus: u64,
    /// Starting horizontal velocity multiplier
    pub initial_game_speed: f32,
    /// Starting world scroll speed (units/tick)
    pub initial_platform_speed: f32,
    /// Game speed increase per score milestone
    pub game_speed_step: f32,
    /// Scroll speed increase per score milestone
    pub platform_speed_step: f32,
    /// Score milestone size for speed-ups
    pub speed_up_every: u64,
    /// Sustained-fall window before failure (ms)
    pub fall_timer_ms: f64,
    /// Duration of one tick (ms)
    pub frame_ms: f64,
    /// Delay standing in for a validation round trip (ms)
    pub secondary_validation_delay_ms: u32,
    /// Visible play area
    pub viewport: Viewport,
    /// Platform generation ranges
    pub generator: GeneratorConfig,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            charge_rate: CHARGE_RATE,
            max_charge: MAX_CHARGE,
            landing_tolerance: 25.0,
            perfect_radius: 20.0,
            max_combo: 5,
            base_points: 10,
            perfect_bonus: 5,
            initial_game_speed: 1.0,
            initial_platform_speed: 0.5,
            game_speed_step: 0.1,
            platform_speed_step: 0.05,
            speed_up_every: 100,
            fall_timer_ms: 1000.0,
            frame_ms: FRAME_MS,
            secondary_validation_delay_ms: 1000,
            viewport: Viewport::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl Tuning {
    /// Storage key for designer overrides
    pub const STORAGE_KEY: &'static str = "skyhop_tuning";

    /// Parse a (possibly partial) JSON tuning document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Same tuning with a different viewport
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Load overrides from storage. Falls back to defaults if the key is
    /// missing or unparseable.
    pub fn load(store: &mut DualStore) -> Self {
        match store.get(Self::STORAGE_KEY) {
            Some(json) => match Self::from_json(&json) {
                Ok(tuning) => {
                    log::info!("Loaded tuning overrides");
                    tuning
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {e}, using defaults", Self::STORAGE_KEY);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }
}
