//! Per-frame character integration and the charge → launch model
//!
//! Pure functions: no randomness, no clock reads. The caller supplies the
//! timestamp that goes into the motion trace.

use glam::Vec2;

use super::state::{Character, MotionSample, MotionTrace};

/// Below this y an airborne character at rest is considered stuck mid-air
const STALL_GUARD_MAX_Y: f32 = 400.0;
/// Nudge applied to a stalled character
const STALL_NUDGE_VY: f32 = 0.1;

/// Result of a single integration step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// Whether the character moved this step
    pub integrated: bool,
    /// Whether the zero-velocity guard had to nudge the character
    pub stall_corrected: bool,
}

/// Advance an airborne character by one frame and record the new sample.
///
/// Grounded characters are left untouched; their motion comes from the
/// platform they ride.
pub fn integrate(
    character: &mut Character,
    trace: &mut MotionTrace,
    gravity: f32,
    game_speed: f32,
    now_ms: f64,
) -> StepReport {
    if !character.is_jumping() {
        return StepReport::default();
    }

    character.pos.x += character.vel.x * game_speed;
    character.pos.y += character.vel.y;
    character.vel.y += gravity;

    trace.push(MotionSample {
        pos: character.pos,
        vel: character.vel,
        timestamp_ms: now_ms,
    });

    let mut report = StepReport {
        integrated: true,
        stall_corrected: false,
    };

    if character.vel == Vec2::ZERO && character.pos.y < STALL_GUARD_MAX_Y {
        log::warn!(
            "Character stalled mid-air at ({:.1}, {:.1}), nudging downward",
            character.pos.x,
            character.pos.y
        );
        character.vel.y = STALL_NUDGE_VY;
        report.stall_corrected = true;
    }

    report
}

/// Launch velocity for a charge level.
///
/// Horizontal reach grows with power, but the vertical component follows
/// `sin(π·r)`: it peaks at r = 0.5 and points downward once r passes 1.
/// Power is clamped to `[0, max_charge]`; r is always `power / 100`.
pub fn launch_velocity(power: f32, max_charge: f32, inherited_vx: f32) -> Vec2 {
    let ratio = power.clamp(0.0, max_charge.max(0.0)) / 100.0;
    let vx = (50.0 + ratio * 200.0) / 20.0 + inherited_vx;
    let vy = -(std::f32::consts::PI * ratio).sin() * 15.0;
    Vec2::new(vx, vy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{GRAVITY, MAX_CHARGE};
    use crate::sim::state::Support;

    fn airborne(pos: Vec2, vel: Vec2) -> Character {
        Character {
            pos,
            vel,
            support: Support::Airborne,
            ..Default::default()
        }
    }

    #[test]
    fn test_integrate_applies_gravity_after_position() {
        let mut c = airborne(Vec2::new(100.0, 200.0), Vec2::new(4.0, -10.0));
        let mut trace = MotionTrace::new();
        integrate(&mut c, &mut trace, GRAVITY, 1.0, 16.0);

        assert_eq!(c.pos, Vec2::new(104.0, 190.0));
        assert!((c.vel.y - (-9.2)).abs() < 1e-5);
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.samples()[0].timestamp_ms, 16.0);
    }

    #[test]
    fn test_game_speed_scales_horizontal_only() {
        let mut c = airborne(Vec2::ZERO, Vec2::new(4.0, 2.0));
        let mut trace = MotionTrace::new();
        integrate(&mut c, &mut trace, GRAVITY, 1.5, 0.0);
        assert_eq!(c.pos, Vec2::new(6.0, 2.0));
    }

    #[test]
    fn test_grounded_is_untouched() {
        let mut c = Character::default();
        c.support = Support::Attached {
            platform_id: 1,
            offset: 10.0,
        };
        c.vel = Vec2::new(3.0, 3.0);
        let mut trace = MotionTrace::new();
        let report = integrate(&mut c, &mut trace, GRAVITY, 1.0, 0.0);
        assert!(!report.integrated);
        assert_eq!(c.pos, Vec2::ZERO);
        assert!(trace.is_empty());
    }

    #[test]
    fn test_stall_guard_nudges() {
        // vy = -0.8 becomes exactly 0 after gravity
        let mut c = airborne(Vec2::new(100.0, 100.0), Vec2::new(0.0, -GRAVITY));
        let mut trace = MotionTrace::new();
        let report = integrate(&mut c, &mut trace, GRAVITY, 1.0, 0.0);
        assert!(report.stall_corrected);
        assert_eq!(c.vel.y, 0.1);
    }

    #[test]
    fn test_stall_guard_ignores_low_positions() {
        let mut c = airborne(Vec2::new(100.0, 500.0), Vec2::new(0.0, -GRAVITY));
        let mut trace = MotionTrace::new();
        let report = integrate(&mut c, &mut trace, GRAVITY, 1.0, 0.0);
        assert!(!report.stall_corrected);
        assert_eq!(c.vel.y, 0.0);
    }

    #[test]
    fn test_determinism() {
        let run = || {
            let mut c = airborne(Vec2::new(140.0, 280.0), launch_velocity(75.0, MAX_CHARGE, 0.0));
            let mut trace = MotionTrace::new();
            for i in 0..30 {
                integrate(&mut c, &mut trace, GRAVITY, 1.0, i as f64);
            }
            (c.pos, c.vel, trace)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_launch_reference_values() {
        let v = launch_velocity(75.0, MAX_CHARGE, 0.0);
        assert!((v.x - 12.5).abs() < 1e-5);
        assert!((v.y - (-10.6066)).abs() < 1e-3);

        // Peak lift at half charge
        let half = launch_velocity(50.0, MAX_CHARGE, 0.0);
        assert!((half.y + 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_launch_is_non_monotonic() {
        let lift = |p: f32| -launch_velocity(p, MAX_CHARGE, 0.0).y;
        assert!(lift(50.0) > lift(25.0));
        assert!(lift(50.0) > lift(75.0));
        // Overcharge points the jump downward
        assert!(launch_velocity(130.0, MAX_CHARGE, 0.0).y > 0.0);
        // Power is clamped
        assert_eq!(launch_velocity(400.0, MAX_CHARGE, 0.0), launch_velocity(150.0, MAX_CHARGE, 0.0));
        assert_eq!(launch_velocity(-5.0, MAX_CHARGE, 0.0), launch_velocity(0.0, MAX_CHARGE, 0.0));
    }

    #[test]
    fn test_launch_inherits_platform_velocity() {
        let base = launch_velocity(60.0, MAX_CHARGE, 0.0);
        let moving = launch_velocity(60.0, MAX_CHARGE, 1.5);
        assert!((moving.x - base.x - 1.5).abs() < 1e-5);
        assert_eq!(moving.y, base.y);
    }

    #[test]
    fn test_launch_respects_charge_cap() {
        // A raised cap lets power past 150 through
        let raised = launch_velocity(200.0, 200.0, 0.0);
        assert!((raised.x - 22.5).abs() < 1e-5);
        assert_ne!(raised, launch_velocity(150.0, 200.0, 0.0));
        assert_eq!(launch_velocity(300.0, 200.0, 0.0), raised);

        // A lowered cap clamps earlier
        assert_eq!(launch_velocity(90.0, 60.0, 0.0), launch_velocity(60.0, MAX_CHARGE, 0.0));
    }
}
