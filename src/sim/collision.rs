//! Failure guards, landing detection and platform attachment
//!
//! The airborne failure guards overlap on purpose: each one catches a
//! different physics edge case (moving platforms, overcharge launches), so
//! they stay independent and are evaluated in a fixed order.

use glam::Vec2;

use super::state::{Character, FailureReason, GameState, MotionSample, Platform, Support};
use crate::{Tuning, Viewport, boxes_overlap, horizontal_overlap};

/// Attached characters drift at most this far before being snapped back
const ATTACH_SNAP_TOLERANCE: f32 = 2.0;
/// Grounded characters must have their feet this close to the platform top
const SUPPORT_TOLERANCE: f32 = 5.0;

/// Full-width failure strip near the bottom of the viewport
pub fn bottom_line(viewport: Viewport) -> (Vec2, Vec2) {
    (
        Vec2::new(0.0, viewport.height - 10.0),
        Vec2::new(viewport.width, 5.0),
    )
}

/// Always-on failure check, valid in every state
pub fn touches_bottom_line(character: &Character, viewport: Viewport) -> bool {
    let (pos, size) = bottom_line(viewport);
    boxes_overlap(character.pos, character.size, pos, size)
}

/// Airborne failure guards. `fall_started` carries the sustained-fall timer
/// between ticks and is reset whenever its condition does not hold.
pub fn airborne_failure(
    character: &Character,
    viewport: Viewport,
    now_ms: f64,
    fall_window_ms: f64,
    fall_started: &mut Option<f64>,
) -> Option<FailureReason> {
    let (w, h) = (viewport.width, viewport.height);
    let pos = character.pos;
    let vel = character.vel;
    let bottom = character.bottom();

    if pos.x < -200.0 || pos.x > w + 200.0 {
        return Some(FailureReason::HorizontalBounds);
    }
    if bottom > h + 50.0 {
        return Some(FailureReason::FellOffScreen);
    }
    if pos.x + character.size.x < -100.0 || pos.x > w + 100.0 {
        return Some(FailureReason::DriftedOffSide);
    }
    if pos.y > h {
        return Some(FailureReason::BelowScreenBottom);
    }
    if vel.y > 15.0 && pos.y > h * 0.8 {
        return Some(FailureReason::TerminalVelocity);
    }
    if bottom >= h - 10.0 && vel.y > 0.0 {
        return Some(FailureReason::StuckAtBottomEdge);
    }

    if pos.y > h * 0.9 && vel.y > 5.0 {
        let started = *fall_started.get_or_insert(now_ms);
        if now_ms - started > fall_window_ms {
            return Some(FailureReason::SustainedFall);
        }
    } else {
        *fall_started = None;
    }

    if pos.y < -500.0 {
        return Some(FailureReason::FlewTooHigh);
    }
    if vel.x.abs() > 50.0 || vel.y.abs() > 30.0 {
        return Some(FailureReason::SpeedAnomaly);
    }
    None
}

/// Outcome of attachment upkeep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Not attached to anything
    None,
    /// Still riding the platform
    Held,
    /// Lost the platform this tick
    Released,
}

/// Keep a grounded character pinned to its platform, or release it when the
/// platform is gone or no longer underneath.
pub fn maintain_attachment(character: &mut Character, platforms: &[Platform]) -> Attachment {
    let Support::Attached { platform_id, offset } = character.support else {
        return Attachment::None;
    };
    let Some(platform) = platforms.iter().find(|p| p.id == platform_id) else {
        log::debug!("Platform {platform_id} vanished, character released");
        character.detach();
        return Attachment::Released;
    };

    let target_x = platform.pos.x + offset;
    if (target_x - character.pos.x).abs() > ATTACH_SNAP_TOLERANCE {
        character.pos.x = target_x;
    }

    if character.pos.x + character.size.x < platform.pos.x || character.pos.x > platform.right() {
        log::debug!("Character left platform {platform_id}");
        character.detach();
        return Attachment::Released;
    }

    let feet_gap = character.bottom() - platform.top();
    if feet_gap.abs() > SUPPORT_TOLERANCE {
        log::debug!("Character lost support on platform {platform_id} (gap {feet_gap:.1})");
        character.detach();
        return Attachment::Released;
    }

    Attachment::Held
}

/// Index of the first platform (creation order) the falling character lands on
pub fn find_landing(character: &Character, platforms: &[Platform], tolerance: f32) -> Option<usize> {
    if !character.is_jumping() || character.vel.y <= 0.0 {
        return None;
    }
    let bottom = character.bottom();
    platforms.iter().position(|p| {
        p.has_collision()
            && bottom >= p.top() - tolerance
            && bottom <= p.top() + tolerance
            && horizontal_overlap(character.pos.x, character.size.x, p.pos.x, p.width) > 0.0
    })
}

/// Scoring outcome of a landing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landing {
    pub platform_id: u32,
    pub perfect: bool,
    /// Horizontal distance between character and platform centres
    pub center_distance: f32,
    pub points: u64,
}

/// Snap onto `platforms[index]`, award points and record jump telemetry
pub fn resolve_landing(state: &mut GameState, index: usize, tuning: &Tuning) -> Option<Landing> {
    let platform = state.platforms.get(index)?.clone();
    let impact_velocity = state.character.vel;

    state.character.pos.y = platform.top() - state.character.size.y;
    let offset = state.character.pos.x - platform.pos.x;
    state.character.vel = Vec2::ZERO;
    state.character.support = Support::Attached {
        platform_id: platform.id,
        offset,
    };

    let center_distance = (platform.center_x() - state.character.center_x()).abs();
    let perfect = center_distance < tuning.perfect_radius;
    let mut points = 0;

    if perfect {
        state.combo = (state.combo + 1).min(tuning.max_combo);
        state.max_combo = state.max_combo.max(state.combo);
        state.perfect_count += 1;
        state.perfect_streak += 1;
        points += tuning.perfect_bonus * state.combo as u64;
        log::debug!("Perfect landing on {} (combo x{})", platform.id, state.combo);
    } else {
        state.combo = 1;
        state.perfect_streak = 0;
    }
    points += tuning.base_points * state.combo as u64;
    state.score += points;
    state.landings += 1;

    let now = state.clock_ms;
    state.trace.push(MotionSample {
        pos: state.character.pos,
        vel: impact_velocity,
        timestamp_ms: now,
    });
    let telemetry = &mut state.telemetry;
    telemetry.position_delta = center_distance;
    telemetry.perfect_streak = state.perfect_streak;
    telemetry.landing_velocity = impact_velocity;
    telemetry.landing_angle_deg = impact_velocity.y.atan2(impact_velocity.x).to_degrees();
    telemetry.actual_timing_ms = now - state.launched_at_ms;
    telemetry.trajectory = state.trace.clone();
    telemetry.player_position = state.character.bottom_center();
    telemetry.target_position = platform.top_center();
    state.last_landing_ms = now;

    log::debug!(
        "Landed on {} at offset {:.1} (+{} points, distance {:.1})",
        platform.id,
        offset,
        points,
        center_distance
    );

    Some(Landing {
        platform_id: platform.id,
        perfect,
        center_distance,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::PLATFORM_HEIGHT;
    use crate::sim::state::PlatformKind;

    fn platform(id: u32, x: f32, y: f32, width: f32) -> Platform {
        Platform {
            id,
            pos: Vec2::new(x, y),
            width,
            height: PLATFORM_HEIGHT,
            kind: PlatformKind::Normal,
            motion: None,
            created_at_ms: 0.0,
        }
    }

    fn falling(x: f32, bottom: f32) -> Character {
        let mut c = Character::default();
        c.pos = Vec2::new(x, bottom - c.size.y);
        c.vel = Vec2::new(3.0, 4.0);
        c
    }

    fn check(c: &Character) -> Option<FailureReason> {
        let mut timer = None;
        airborne_failure(c, Viewport::default(), 0.0, 1000.0, &mut timer)
    }

    #[test]
    fn test_landing_tolerance_boundary() {
        let platforms = vec![platform(1, 100.0, 300.0, 100.0)];
        assert_eq!(find_landing(&falling(120.0, 275.0), &platforms, 25.0), Some(0));
        assert_eq!(find_landing(&falling(120.0, 274.0), &platforms, 25.0), None);
        assert_eq!(find_landing(&falling(120.0, 325.0), &platforms, 25.0), Some(0));
        assert_eq!(find_landing(&falling(120.0, 326.0), &platforms, 25.0), None);
    }

    #[test]
    fn test_landing_needs_descent_and_overlap() {
        let platforms = vec![platform(1, 100.0, 300.0, 100.0)];
        let mut rising = falling(120.0, 300.0);
        rising.vel.y = -2.0;
        assert_eq!(find_landing(&rising, &platforms, 25.0), None);

        // Touching the left edge is not an overlap
        assert_eq!(find_landing(&falling(60.0, 300.0), &platforms, 25.0), None);
        assert_eq!(find_landing(&falling(61.0, 300.0), &platforms, 25.0), Some(0));
    }

    #[test]
    fn test_landing_first_match_and_zero_size_skip() {
        let mut empty = platform(1, 100.0, 300.0, 0.0);
        empty.height = 0.0;
        let platforms = vec![empty, platform(2, 100.0, 305.0, 100.0), platform(3, 100.0, 300.0, 100.0)];
        assert_eq!(find_landing(&falling(120.0, 300.0), &platforms, 25.0), Some(1));
    }

    fn land_at_distance(distance: f32) -> (GameState, Landing) {
        let tuning = Tuning::default();
        let mut state = GameState::new(&tuning);
        state.platforms.push(platform(1, 100.0, 300.0, 100.0));
        // Platform centre 150, character width 40
        state.character = falling(150.0 + distance - 20.0, 300.0);
        let landing = resolve_landing(&mut state, 0, &tuning).unwrap();
        (state, landing)
    }

    #[test]
    fn test_perfect_boundary_is_strict() {
        let (state, landing) = land_at_distance(19.99);
        assert!(landing.perfect);
        assert_eq!(state.combo, 2);
        // Bonus 5*2 + base 10*2
        assert_eq!(landing.points, 30);

        let (state, landing) = land_at_distance(20.0);
        assert!(!landing.perfect);
        assert_eq!(state.combo, 1);
        assert_eq!(landing.points, 10);
    }

    #[test]
    fn test_landing_snaps_and_attaches() {
        let (state, landing) = land_at_distance(30.0);
        let c = &state.character;
        assert_eq!(c.bottom(), 300.0);
        assert_eq!(c.vel, Vec2::ZERO);
        assert!(!c.is_jumping());
        assert_eq!(
            c.support,
            Support::Attached {
                platform_id: 1,
                offset: 60.0
            }
        );
        assert_eq!(landing.center_distance, 30.0);
        // Impact velocity is kept for telemetry
        assert_eq!(state.telemetry.landing_velocity, Vec2::new(3.0, 4.0));
        assert!((state.telemetry.landing_angle_deg - 53.13).abs() < 0.01);
        assert_eq!(state.telemetry.target_position, Vec2::new(150.0, 300.0));
    }

    #[test]
    fn test_combo_caps_and_resets() {
        let tuning = Tuning::default();
        let mut state = GameState::new(&tuning);
        state.platforms.push(platform(1, 100.0, 300.0, 100.0));
        for _ in 0..7 {
            state.character = falling(130.0, 300.0);
            resolve_landing(&mut state, 0, &tuning);
        }
        assert_eq!(state.combo, 5);
        assert_eq!(state.max_combo, 5);
        assert_eq!(state.perfect_streak, 7);

        state.character = falling(100.0, 300.0);
        resolve_landing(&mut state, 0, &tuning);
        assert_eq!(state.combo, 1);
        assert_eq!(state.perfect_streak, 0);
        assert_eq!(state.max_combo, 5);
        assert_eq!(state.perfect_count, 7);
    }

    #[test]
    fn test_attachment_follows_and_releases() {
        let mut platforms = vec![platform(1, 100.0, 300.0, 100.0)];
        let mut c = Character::default();
        c.attach_to(&platforms[0], 30.0);

        platforms[0].pos.x = 101.5;
        assert_eq!(maintain_attachment(&mut c, &platforms), Attachment::Held);
        // Within tolerance: not snapped
        assert_eq!(c.pos.x, 130.0);

        platforms[0].pos.x = 90.0;
        assert_eq!(maintain_attachment(&mut c, &platforms), Attachment::Held);
        assert_eq!(c.pos.x, 120.0);

        assert_eq!(maintain_attachment(&mut c, &[]), Attachment::Released);
        assert!(c.is_jumping());
    }

    #[test]
    fn test_attachment_releases_without_support() {
        let mut platforms = vec![platform(1, 100.0, 300.0, 100.0)];
        let mut c = Character::default();
        c.attach_to(&platforms[0], 30.0);
        platforms[0].pos.y = 310.0;
        assert_eq!(maintain_attachment(&mut c, &platforms), Attachment::Released);
    }

    #[test]
    fn test_failure_guards() {
        let mut c = Character::default();
        c.vel = Vec2::new(1.0, 1.0);

        c.pos = Vec2::new(-201.0, 100.0);
        assert_eq!(check(&c), Some(FailureReason::HorizontalBounds));
        c.pos = Vec2::new(100.0, 611.0);
        assert_eq!(check(&c), Some(FailureReason::FellOffScreen));
        c.pos = Vec2::new(-150.0, 100.0);
        assert_eq!(check(&c), Some(FailureReason::DriftedOffSide));
        c.pos = Vec2::new(100.0, 500.0);
        c.vel = Vec2::new(1.0, 16.0);
        assert_eq!(check(&c), Some(FailureReason::TerminalVelocity));
        c.pos = Vec2::new(100.0, 555.0);
        c.vel = Vec2::new(1.0, 1.0);
        assert_eq!(check(&c), Some(FailureReason::StuckAtBottomEdge));
        c.pos = Vec2::new(100.0, -501.0);
        assert_eq!(check(&c), Some(FailureReason::FlewTooHigh));
        c.pos = Vec2::new(100.0, 100.0);
        c.vel = Vec2::new(51.0, 0.0);
        assert_eq!(check(&c), Some(FailureReason::SpeedAnomaly));
        c.vel = Vec2::new(5.0, -3.0);
        assert_eq!(check(&c), None);
    }

    #[test]
    fn test_sustained_fall_timer() {
        // Tall viewport so only the timer guard can fire
        let viewport = Viewport {
            width: 800.0,
            height: 2000.0,
        };
        let mut c = Character::default();
        c.pos = Vec2::new(100.0, 1850.0);
        c.vel = Vec2::new(0.0, 6.0);
        let mut timer = None;

        assert_eq!(airborne_failure(&c, viewport, 0.0, 1000.0, &mut timer), None);
        assert_eq!(timer, Some(0.0));
        assert_eq!(airborne_failure(&c, viewport, 1000.0, 1000.0, &mut timer), None);

        // Condition breaks: timer resets
        c.vel.y = 2.0;
        assert_eq!(airborne_failure(&c, viewport, 1010.0, 1000.0, &mut timer), None);
        assert_eq!(timer, None);

        c.vel.y = 6.0;
        assert_eq!(airborne_failure(&c, viewport, 1020.0, 1000.0, &mut timer), None);
        assert_eq!(
            airborne_failure(&c, viewport, 2021.0, 1000.0, &mut timer),
            Some(FailureReason::SustainedFall)
        );
    }

    #[test]
    fn test_bottom_line() {
        let mut c = Character::default();
        c.pos = Vec2::new(300.0, 550.0);
        assert!(!touches_bottom_line(&c, Viewport::default()));
        c.pos.y = 551.0;
        assert!(touches_bottom_line(&c, Viewport::default()));
    }
}
