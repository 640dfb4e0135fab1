//! Game state and core simulation types
//!
//! Everything a run mutates lives here and is owned by the single game loop.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::trajectory::{LandingPreview, PredictionCache};
use crate::Tuning;
use crate::consts::*;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Run ended
    GameOver(FailureReason),
}

/// Why a run ended. Each guard is independent; see `collision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Left the [-200, width + 200] horizontal band
    HorizontalBounds,
    /// Bottom edge more than 50 units below the screen
    FellOffScreen,
    /// Box entirely past either side margin
    DriftedOffSide,
    /// Top edge below the screen bottom
    BelowScreenBottom,
    /// Falling faster than 15 in the lowest fifth of the screen
    TerminalVelocity,
    /// Descending while touching the bottom edge band
    StuckAtBottomEdge,
    /// Kept falling in the lowest tenth for over the fall window
    SustainedFall,
    /// Flew more than 500 units above the screen
    FlewTooHigh,
    /// Velocity outside physical sanity limits
    SpeedAnomaly,
    /// Touched the invisible strip at the bottom of the viewport
    BottomLine,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::HorizontalBounds => "horizontal_bounds",
            FailureReason::FellOffScreen => "fell_off_screen",
            FailureReason::DriftedOffSide => "drifted_off_side",
            FailureReason::BelowScreenBottom => "below_screen_bottom",
            FailureReason::TerminalVelocity => "terminal_velocity",
            FailureReason::StuckAtBottomEdge => "stuck_at_bottom_edge",
            FailureReason::SustainedFall => "sustained_fall",
            FailureReason::FlewTooHigh => "flew_too_high",
            FailureReason::SpeedAnomaly => "speed_anomaly",
            FailureReason::BottomLine => "bottom_line",
        }
    }
}

/// What the character is standing on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Support {
    /// In flight (or falling after losing its platform)
    Airborne,
    /// Riding a platform, pinned at `platform.x + offset`
    Attached { platform_id: u32, offset: f32 },
}

/// The player-controlled block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    /// Top-left corner
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub support: Support,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            size: Vec2::new(CHARACTER_WIDTH, CHARACTER_HEIGHT),
            support: Support::Airborne,
        }
    }
}

impl Character {
    #[inline]
    pub fn is_jumping(&self) -> bool {
        matches!(self.support, Support::Airborne)
    }

    /// Id of the supporting platform, if attached
    pub fn attached_platform(&self) -> Option<u32> {
        match self.support {
            Support::Attached { platform_id, .. } => Some(platform_id),
            Support::Airborne => None,
        }
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.pos.y + self.size.y
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        self.pos.x + self.size.x / 2.0
    }

    /// Midpoint of the bottom edge (the "feet")
    #[inline]
    pub fn bottom_center(&self) -> Vec2 {
        Vec2::new(self.center_x(), self.bottom())
    }

    /// Stand on a platform at the given horizontal offset from its left edge
    pub fn attach_to(&mut self, platform: &Platform, offset: f32) {
        self.pos = Vec2::new(platform.pos.x + offset, platform.top() - self.size.y);
        self.vel = Vec2::ZERO;
        self.support = Support::Attached {
            platform_id: platform.id,
            offset,
        };
    }

    /// Drop any attachment and start falling
    pub fn detach(&mut self) {
        self.support = Support::Airborne;
    }
}

/// Platform types (only one so far)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlatformKind {
    #[default]
    Normal,
}

/// Horizontal oscillation parameters of a moving platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    /// Angular rate factor (sign picks the phase direction)
    pub speed: f32,
    /// Nominal direction (±1)
    pub direction: f32,
    /// Peak displacement from `original_x`
    pub move_range: f32,
    /// Anchor the oscillation is centred on
    pub original_x: f32,
}

/// A platform entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: u32,
    /// Top-left corner
    pub pos: Vec2,
    pub width: f32,
    pub height: f32,
    pub kind: PlatformKind,
    pub motion: Option<Oscillation>,
    pub created_at_ms: f64,
}

impl Platform {
    #[inline]
    pub fn top(&self) -> f32 {
        self.pos.y
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.pos.x + self.width
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        self.pos.x + self.width / 2.0
    }

    /// Centre of the top edge (the landing target)
    #[inline]
    pub fn top_center(&self) -> Vec2 {
        Vec2::new(self.center_x(), self.top())
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Zero-size platforms are skipped by collision
    #[inline]
    pub fn has_collision(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Shift with the world scroll. Oscillation anchors move too.
    pub fn scroll(&mut self, dx: f32) {
        self.pos.x -= dx;
        if let Some(motion) = self.motion.as_mut() {
            motion.original_x -= dx;
        }
    }

    /// Recompute x for moving platforms from the anchor and the clock
    pub fn oscillate(&mut self, now_ms: f64, screen_width: f32) {
        if let Some(motion) = self.motion {
            if motion.speed == 0.0 {
                return;
            }
            let phase = (now_ms * 0.001 * motion.speed as f64).sin() as f32;
            let x = motion.original_x + phase * motion.move_range;
            self.pos.x = x.clamp(-self.width, screen_width + 200.0);
        }
    }
}

/// One recorded kinematic sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub pos: Vec2,
    pub vel: Vec2,
    pub timestamp_ms: f64,
}

/// Bounded per-jump trajectory buffer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionTrace {
    samples: Vec<MotionSample>,
}

impl MotionTrace {
    pub fn new() -> Self {
        Self {
            samples: Vec::with_capacity(MOTION_TRACE_CAPACITY),
        }
    }

    /// Append a sample; returns false once the buffer is full
    pub fn push(&mut self, sample: MotionSample) -> bool {
        if self.samples.len() >= MOTION_TRACE_CAPACITY {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }
}

impl FromIterator<MotionSample> for MotionTrace {
    fn from_iter<I: IntoIterator<Item = MotionSample>>(iter: I) -> Self {
        let mut trace = MotionTrace::new();
        for sample in iter {
            if !trace.push(sample) {
                break;
            }
        }
        trace
    }
}

/// Per-jump telemetry, consumed by the judge and the anti-cheat monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpTelemetry {
    /// Time between the previous landing and this launch
    pub reaction_time_ms: f64,
    /// Horizontal distance between character and platform centres on landing
    pub position_delta: f32,
    /// Consecutive perfect landings so far
    pub perfect_streak: u32,
    /// Velocity at the moment of impact
    pub landing_velocity: Vec2,
    /// Impact angle below horizontal, degrees
    pub landing_angle_deg: f32,
    pub optimal_timing_ms: f64,
    /// Launch-to-landing flight duration
    pub actual_timing_ms: f64,
    pub trajectory: MotionTrace,
    /// Character feet at landing
    pub player_position: Vec2,
    /// Top centre of the platform landed on
    pub target_position: Vec2,
}

/// Flight time a well-judged hop is expected to take
pub const OPTIMAL_TIMING_MS: f64 = 500.0;

impl Default for JumpTelemetry {
    fn default() -> Self {
        Self {
            reaction_time_ms: 0.0,
            position_delta: 0.0,
            perfect_streak: 0,
            landing_velocity: Vec2::ZERO,
            landing_angle_deg: 0.0,
            optimal_timing_ms: OPTIMAL_TIMING_MS,
            actual_timing_ms: 0.0,
            trajectory: MotionTrace::new(),
            player_position: Vec2::ZERO,
            target_position: Vec2::ZERO,
        }
    }
}

/// Charge input state. The preview only runs while `charging` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargeState {
    pub charging: bool,
    pub power: f32,
}

/// Complete run state
#[derive(Debug, Clone)]
pub struct GameState {
    pub character: Character,
    /// Active platforms in creation order
    pub platforms: Vec<Platform>,
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub perfect_count: u32,
    pub perfect_streak: u32,
    pub landings: u32,
    pub phase: GamePhase,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Simulation clock (ms since run start)
    pub clock_ms: f64,
    /// Horizontal velocity multiplier
    pub game_speed: f32,
    /// World scroll per tick
    pub platform_speed: f32,
    /// Last score milestone that triggered a speed-up
    pub speed_milestone: u64,
    /// Start of the current sustained-fall window
    pub fall_started_ms: Option<f64>,
    pub charge: ChargeState,
    /// Landing forecast shown while charging
    pub preview: Option<LandingPreview>,
    /// Number of ticks that recomputed the preview
    pub preview_updates: u64,
    pub preview_cache: PredictionCache,
    /// Trace and telemetry of the jump in progress / last jump
    pub trace: MotionTrace,
    pub telemetry: JumpTelemetry,
    pub launched_at_ms: f64,
    pub last_landing_ms: f64,
    next_id: u32,
}

impl GameState {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            character: Character::default(),
            platforms: Vec::new(),
            score: 0,
            combo: 1,
            max_combo: 1,
            perfect_count: 0,
            perfect_streak: 0,
            landings: 0,
            phase: GamePhase::Playing,
            time_ticks: 0,
            clock_ms: 0.0,
            game_speed: tuning.initial_game_speed,
            platform_speed: tuning.initial_platform_speed,
            speed_milestone: 0,
            fall_started_ms: None,
            charge: ChargeState::default(),
            preview: None,
            preview_updates: 0,
            preview_cache: PredictionCache::default(),
            trace: MotionTrace::new(),
            telemetry: JumpTelemetry::default(),
            launched_at_ms: 0.0,
            last_landing_ms: 0.0,
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, GamePhase::GameOver(_))
    }

    pub fn platform(&self, id: u32) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    /// Right edge of the rightmost platform (0 when empty)
    pub fn rightmost_edge(&self) -> f32 {
        self.platforms
            .iter()
            .map(Platform::right)
            .fold(0.0, f32::max)
    }

    /// End the run. The first reason sticks.
    pub fn fail(&mut self, reason: FailureReason) {
        if self.is_over() {
            return;
        }
        log::info!("Run over: {} (score {})", reason.as_str(), self.score);
        self.character.detach();
        self.charge = ChargeState::default();
        self.preview = None;
        self.phase = GamePhase::GameOver(reason);
    }
}
