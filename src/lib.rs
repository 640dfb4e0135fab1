//! SkyHop - a one-button platform hopper
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, platforms, collisions, prediction)
//! - `judge`: Multi-dimensional landing precision judgment
//! - `anticheat`: Heuristic, client-side score plausibility checks
//! - `persistence`: Key-value storage contract with dual-backend redundancy
//! - `platform`: Browser/headless environment abstraction
//! - `highscores`: Local leaderboard
//! - `profile`: Player save data, skins and nickname
//! - `i18n`: Localized UI strings
//! - `eventlog`: Bounded structured event log
//! - `session`: Run orchestration and score submission
//! - `tuning`: Data-driven game balance

pub mod anticheat;
pub mod error;
pub mod eventlog;
pub mod highscores;
pub mod i18n;
pub mod judge;
pub mod persistence;
pub mod platform;
pub mod profile;
pub mod session;
pub mod sim;
pub mod tuning;

pub use anticheat::{AntiCheatMonitor, AntiCheatReport, RiskLevel};
pub use error::{NicknameError, StorageError, SubmissionError};
pub use highscores::{Leaderboard, RankingEntry};
pub use judge::{Judgment, JudgmentLabel, PrecisionJudge};
pub use profile::GameSave;
pub use session::{GameOverSummary, GameSession, ScoreSubmission, SubmissionWarning};
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Frame duration of one simulation tick (60 Hz animation frames)
    pub const FRAME_MS: f64 = 1000.0 / 60.0;

    /// Gravity (units/tick²)
    pub const GRAVITY: f32 = 0.8;

    /// Character bounding box
    pub const CHARACTER_WIDTH: f32 = 40.0;
    pub const CHARACTER_HEIGHT: f32 = 40.0;

    /// Charge power accumulates this much per frame while held
    pub const CHARGE_RATE: f32 = 2.0;
    /// Charge power cap (150 = "overcharge" region past r = 1)
    pub const MAX_CHARGE: f32 = 150.0;

    /// Platform collision box height (never varies)
    pub const PLATFORM_HEIGHT: f32 = 20.0;

    /// Trajectory buffer capacity per jump
    pub const MOTION_TRACE_CAPACITY: usize = 50;

    /// Default viewport when the environment can't report one
    pub const DEFAULT_VIEWPORT_WIDTH: f32 = 800.0;
    pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 600.0;
}

/// Visible play area in world units (origin top-left, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: consts::DEFAULT_VIEWPORT_WIDTH,
            height: consts::DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

/// Axis-aligned box overlap test (strict: touching edges don't overlap)
#[inline]
pub fn boxes_overlap(a_pos: Vec2, a_size: Vec2, b_pos: Vec2, b_size: Vec2) -> bool {
    a_pos.x < b_pos.x + b_size.x
        && a_pos.x + a_size.x > b_pos.x
        && a_pos.y < b_pos.y + b_size.y
        && a_pos.y + a_size.y > b_pos.y
}

/// Width of the horizontal overlap between two spans (0 when disjoint)
#[inline]
pub fn horizontal_overlap(a_left: f32, a_width: f32, b_left: f32, b_width: f32) -> f32 {
    ((a_left + a_width).min(b_left + b_width) - a_left.max(b_left)).max(0.0)
}
