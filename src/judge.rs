//! Multi-dimensional landing precision judgment
//!
//! A landing is graded on four normalized metrics (position, timing,
//! trajectory smoothness, landing stability), combined with fixed weights
//! into a composite score that maps onto a label.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::state::{JumpTelemetry, MotionSample};

/// Distance at which position accuracy reaches zero
const MAX_POSITION_ERROR: f32 = 50.0;
/// Timing error at which timing precision reaches zero (ms)
const MAX_TIMING_ERROR_MS: f64 = 200.0;
/// Jerk at which a trajectory segment scores zero
const MAX_JERK: f64 = 100.0;
/// Landing speed at which velocity stability reaches zero
const MAX_LANDING_SPEED: f32 = 200.0;
/// Landing angle (degrees) at which angle stability reaches zero
const MAX_LANDING_ANGLE: f32 = 45.0;

/// Metric weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub position: f32,
    pub timing: f32,
    pub smoothness: f32,
    pub stability: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            position: 0.4,
            timing: 0.3,
            smoothness: 0.2,
            stability: 0.1,
        }
    }
}

/// Judgment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentLabel {
    Perfect,
    Excellent,
    Good,
    Acceptable,
    Miss,
}

impl JudgmentLabel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.95 {
            JudgmentLabel::Perfect
        } else if score >= 0.9 {
            JudgmentLabel::Excellent
        } else if score >= 0.8 {
            JudgmentLabel::Good
        } else if score >= 0.7 {
            JudgmentLabel::Acceptable
        } else {
            JudgmentLabel::Miss
        }
    }

    /// Score a landing with this label is expected to have
    pub fn reference_score(&self) -> f32 {
        match self {
            JudgmentLabel::Perfect => 0.95,
            JudgmentLabel::Excellent => 0.9,
            JudgmentLabel::Good => 0.8,
            JudgmentLabel::Acceptable => 0.7,
            JudgmentLabel::Miss => 0.3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JudgmentLabel::Perfect => "perfect",
            JudgmentLabel::Excellent => "excellent",
            JudgmentLabel::Good => "good",
            JudgmentLabel::Acceptable => "acceptable",
            JudgmentLabel::Miss => "miss",
        }
    }
}

/// The four metrics, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub position_accuracy: f32,
    pub timing_precision: f32,
    pub trajectory_smoothness: f32,
    pub landing_stability: f32,
}

/// Pixel bands per label, scaled by player skill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelThresholds {
    pub perfect: f32,
    pub excellent: f32,
    pub good: f32,
    pub acceptable: f32,
}

impl Default for PixelThresholds {
    fn default() -> Self {
        Self {
            perfect: 5.0,
            excellent: 10.0,
            good: 15.0,
            acceptable: 20.0,
        }
    }
}

impl PixelThresholds {
    fn scaled(&self, factor: f32) -> Self {
        Self {
            perfect: self.perfect * factor,
            excellent: self.excellent * factor,
            good: self.good * factor,
            acceptable: self.acceptable * factor,
        }
    }
}

/// Player skill level (1 = beginner)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSkill {
    pub level: u32,
}

impl Default for PlayerSkill {
    fn default() -> Self {
        Self { level: 1 }
    }
}

impl PlayerSkill {
    /// One level per ten games played
    pub fn from_games_played(games: u32) -> Self {
        Self {
            level: games / 10 + 1,
        }
    }

    /// Pixel threshold multiplier: shrinks 5% per level, never below 0.8
    pub fn threshold_factor(&self) -> f32 {
        (1.0 - (self.level.max(1) - 1) as f32 * 0.05).max(0.8)
    }
}

/// Result of judging one landing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub composite_score: f32,
    pub dimensions: Dimensions,
    pub label: JudgmentLabel,
    pub confidence: f32,
    /// Skill-scaled pixel bands. Reported only; the label uses the
    /// composite cut points.
    pub pixel_thresholds: PixelThresholds,
}

/// Landing judge
#[derive(Debug, Clone, Default)]
pub struct PrecisionJudge {
    weights: Weights,
    base_thresholds: PixelThresholds,
}

impl PrecisionJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn judge(
        &self,
        player_pos: Vec2,
        target_pos: Vec2,
        telemetry: &JumpTelemetry,
        skill: PlayerSkill,
    ) -> Judgment {
        let dimensions = Dimensions {
            position_accuracy: position_accuracy(player_pos, target_pos),
            timing_precision: timing_precision(telemetry.actual_timing_ms, telemetry.optimal_timing_ms),
            trajectory_smoothness: trajectory_smoothness(telemetry.trajectory.samples()),
            landing_stability: landing_stability(telemetry.landing_velocity, telemetry.landing_angle_deg),
        };

        let w = self.weights;
        let composite_score = dimensions.position_accuracy * w.position
            + dimensions.timing_precision * w.timing
            + dimensions.trajectory_smoothness * w.smoothness
            + dimensions.landing_stability * w.stability;

        let label = JudgmentLabel::from_score(composite_score);
        let confidence = (1.0 - (composite_score - label.reference_score()).abs()).max(0.1);

        Judgment {
            composite_score,
            dimensions,
            label,
            confidence,
            pixel_thresholds: self.base_thresholds.scaled(skill.threshold_factor()),
        }
    }
}

pub fn position_accuracy(player: Vec2, target: Vec2) -> f32 {
    (1.0 - player.distance(target) / MAX_POSITION_ERROR).clamp(0.0, 1.0)
}

pub fn timing_precision(actual_ms: f64, optimal_ms: f64) -> f32 {
    (1.0 - (actual_ms - optimal_ms).abs() / MAX_TIMING_ERROR_MS).clamp(0.0, 1.0) as f32
}

/// Velocity change rate between two samples (0 when they share a timestamp)
fn acceleration(a: &MotionSample, b: &MotionSample) -> f64 {
    let dt = b.timestamp_ms - a.timestamp_ms;
    if dt == 0.0 {
        return 0.0;
    }
    (b.vel - a.vel).length() as f64 / dt
}

/// Mean per-triplet smoothness; 0.5 when there is too little data
pub fn trajectory_smoothness(samples: &[MotionSample]) -> f32 {
    if samples.len() < 3 {
        return 0.5;
    }
    let total: f64 = samples
        .windows(3)
        .map(|w| {
            let jerk = (acceleration(&w[1], &w[2]) - acceleration(&w[0], &w[1])).abs();
            (1.0 - jerk / MAX_JERK).max(0.0)
        })
        .sum();
    (total / (samples.len() - 2) as f64) as f32
}

pub fn landing_stability(velocity: Vec2, angle_deg: f32) -> f32 {
    let speed = (1.0 - velocity.length() / MAX_LANDING_SPEED).clamp(0.0, 1.0);
    let angle = (1.0 - angle_deg.abs() / MAX_LANDING_ANGLE).clamp(0.0, 1.0);
    0.7 * speed + 0.3 * angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::MotionTrace;

    fn samples(vels: &[(f32, f64)]) -> Vec<MotionSample> {
        vels.iter()
            .map(|&(vy, t)| MotionSample {
                pos: Vec2::ZERO,
                vel: Vec2::new(0.0, vy),
                timestamp_ms: t,
            })
            .collect()
    }

    #[test]
    fn test_position_accuracy() {
        assert_eq!(position_accuracy(Vec2::ZERO, Vec2::ZERO), 1.0);
        assert!((position_accuracy(Vec2::ZERO, Vec2::new(30.0, 40.0)) - 0.0).abs() < 1e-6);
        assert!((position_accuracy(Vec2::ZERO, Vec2::new(25.0, 0.0)) - 0.5).abs() < 1e-6);
        assert_eq!(position_accuracy(Vec2::ZERO, Vec2::new(500.0, 0.0)), 0.0);
    }

    #[test]
    fn test_timing_precision() {
        assert_eq!(timing_precision(500.0, 500.0), 1.0);
        assert!((timing_precision(600.0, 500.0) - 0.5).abs() < 1e-6);
        assert_eq!(timing_precision(900.0, 500.0), 0.0);
    }

    #[test]
    fn test_smoothness() {
        assert_eq!(trajectory_smoothness(&[]), 0.5);
        assert_eq!(trajectory_smoothness(&samples(&[(0.0, 0.0), (1.0, 1.0)])), 0.5);

        // Constant acceleration: zero jerk
        let steady = samples(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert!((trajectory_smoothness(&steady) - 1.0).abs() < 1e-6);

        // Acceleration jumps from 1 to 51 per ms: jerk 50
        let jolt = samples(&[(0.0, 0.0), (1.0, 1.0), (52.0, 2.0)]);
        assert!((trajectory_smoothness(&jolt) - 0.5).abs() < 1e-6);

        // Shared timestamps count as zero acceleration
        let stuck = samples(&[(0.0, 5.0), (9.0, 5.0), (9.0, 5.0)]);
        assert_eq!(trajectory_smoothness(&stuck), 1.0);
    }

    #[test]
    fn test_landing_stability() {
        assert_eq!(landing_stability(Vec2::ZERO, 0.0), 1.0);
        // Speed 100 → 0.5, angle 90 → 0
        assert!((landing_stability(Vec2::new(0.0, 100.0), 90.0) - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_labels_and_reference_scores() {
        assert_eq!(JudgmentLabel::from_score(0.95), JudgmentLabel::Perfect);
        assert_eq!(JudgmentLabel::from_score(0.949), JudgmentLabel::Excellent);
        assert_eq!(JudgmentLabel::from_score(0.8), JudgmentLabel::Good);
        assert_eq!(JudgmentLabel::from_score(0.7), JudgmentLabel::Acceptable);
        assert_eq!(JudgmentLabel::from_score(0.69), JudgmentLabel::Miss);
        assert_eq!(JudgmentLabel::Miss.reference_score(), 0.3);
    }

    #[test]
    fn test_composite_and_confidence() {
        let judge = PrecisionJudge::new();
        let telemetry = JumpTelemetry {
            actual_timing_ms: 500.0,
            trajectory: MotionTrace::new(),
            ..Default::default()
        };
        let j = judge.judge(Vec2::ZERO, Vec2::ZERO, &telemetry, PlayerSkill::default());
        // 0.4 + 0.3 + 0.2 * 0.5 + 0.1 * 1.0
        assert!((j.composite_score - 0.9).abs() < 1e-6);
        assert_eq!(j.label, JudgmentLabel::Excellent);
        assert!((j.confidence - 1.0).abs() < 1e-6);

        let far = judge.judge(Vec2::ZERO, Vec2::new(100.0, 0.0), &telemetry, PlayerSkill::default());
        // 0.3 + 0.1 + 0.1 = 0.5 → miss, confidence 1 - |0.5 - 0.3|
        assert_eq!(far.label, JudgmentLabel::Miss);
        assert!((far.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_floor() {
        // A composite of 0 sits 0.3 below the miss reference
        let judge = PrecisionJudge::new();
        let telemetry = JumpTelemetry {
            actual_timing_ms: 5000.0,
            landing_velocity: Vec2::new(0.0, 500.0),
            landing_angle_deg: 90.0,
            trajectory: samples(&[(0.0, 0.0), (0.0, 1.0), (500.0, 2.0)]).into_iter().collect(),
            ..Default::default()
        };
        let j = judge.judge(Vec2::ZERO, Vec2::new(100.0, 0.0), &telemetry, PlayerSkill::default());
        assert_eq!(j.composite_score, 0.0);
        assert!((j.confidence - 0.7).abs() < 1e-6);
        assert!(j.confidence >= 0.1);
    }

    #[test]
    fn test_skill_scales_thresholds_not_labels() {
        let judge = PrecisionJudge::new();
        let telemetry = JumpTelemetry::default();
        let novice = judge.judge(Vec2::ZERO, Vec2::ZERO, &telemetry, PlayerSkill::from_games_played(0));
        let veteran = judge.judge(Vec2::ZERO, Vec2::ZERO, &telemetry, PlayerSkill::from_games_played(200));

        assert_eq!(novice.pixel_thresholds.perfect, 5.0);
        assert!((veteran.pixel_thresholds.perfect - 4.0).abs() < 1e-6);
        assert!((veteran.pixel_thresholds.acceptable - 16.0).abs() < 1e-6);
        assert_eq!(novice.label, veteran.label);
        assert_eq!(novice.composite_score, veteran.composite_score);

        assert!((PlayerSkill { level: 3 }.threshold_factor() - 0.9).abs() < 1e-6);
    }
}
