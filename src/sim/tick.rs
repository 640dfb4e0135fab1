//! Fixed timestep simulation tick
//!
//! Core game loop that advances the run deterministically. One call per
//! animation frame; the clock is derived from the tick count.

use super::collision::{self, Attachment, Landing};
use super::generator::PlatformGenerator;
use super::physics;
use super::state::{ChargeState, FailureReason, GameState, JumpTelemetry, Support};
use super::trajectory::{self, LandingPreview};
use crate::Tuning;

/// Offset of the character on the starting platform
pub const START_OFFSET: f32 = 60.0;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    pub landing: Option<Landing>,
    pub failure: Option<FailureReason>,
    /// Character fell off its platform
    pub released: bool,
    /// Zero-velocity guard fired
    pub stall_corrected: bool,
    /// Score crossed a speed-up milestone
    pub speed_up: bool,
    pub platforms_added: usize,
    pub platforms_removed: usize,
}

/// Reset `state` for a new run: opening platforms and the character on the
/// first one.
pub fn start_run(state: &mut GameState, generator: &mut PlatformGenerator, tuning: &Tuning) {
    *state = GameState::new(tuning);
    generator.bootstrap(state, tuning.viewport.width);
    if let Some(first) = state.platforms.first() {
        state.character.attach_to(first, START_OFFSET);
    }
    log::info!(
        "Run started with {} platforms (seed {})",
        state.platforms.len(),
        generator.seed()
    );
}

/// Start charging. Only a grounded character can charge.
pub fn begin_charge(state: &mut GameState) -> bool {
    if state.is_over() || state.character.is_jumping() || state.charge.charging {
        return false;
    }
    state.charge = ChargeState {
        charging: true,
        power: 0.0,
    };
    true
}

/// Stop charging and jump with the accumulated power. Clears the preview in
/// the same call so no further preview work happens after release.
pub fn release_charge(state: &mut GameState, tuning: &Tuning) -> bool {
    if !state.charge.charging {
        return false;
    }
    let power = state.charge.power;
    state.charge = ChargeState::default();
    state.preview = None;
    launch(state, power, tuning)
}

/// Stop charging without jumping
pub fn cancel_charge(state: &mut GameState) {
    state.charge = ChargeState::default();
    state.preview = None;
}

/// Horizontal speed a launch inherits from a moving platform
fn inherited_speed(state: &GameState) -> f32 {
    state
        .character
        .attached_platform()
        .and_then(|id| state.platform(id))
        .and_then(|p| p.motion)
        .map(|m| m.speed)
        .unwrap_or(0.0)
}

/// Jump off the current platform with the given charge power
pub fn launch(state: &mut GameState, power: f32, tuning: &Tuning) -> bool {
    if state.is_over() || state.character.is_jumping() {
        return false;
    }
    let power = power.clamp(0.0, tuning.max_charge);
    state.character.vel = physics::launch_velocity(power, tuning.max_charge, inherited_speed(state));
    state.character.detach();
    state.charge = ChargeState::default();
    state.preview = None;

    state.trace.clear();
    state.telemetry = JumpTelemetry {
        reaction_time_ms: state.clock_ms - state.last_landing_ms,
        ..Default::default()
    };
    state.launched_at_ms = state.clock_ms;
    state.fall_started_ms = None;

    log::debug!(
        "Jump: power {:.0}, velocity ({:.2}, {:.2})",
        power,
        state.character.vel.x,
        state.character.vel.y
    );
    true
}

/// Recompute the landing forecast for the current charge
fn update_preview(state: &mut GameState, tuning: &Tuning) {
    let start = state.character.bottom_center();
    let power = state.charge.power;
    let inherited = inherited_speed(state);
    let game_speed = state.game_speed;
    let gravity = tuning.gravity;
    let max_charge = tuning.max_charge;

    let prediction = state.preview_cache.get_or_insert_with(start, power, inherited, || {
        let mut velocity = physics::launch_velocity(power, max_charge, inherited);
        velocity.x *= game_speed;
        trajectory::predict(start, velocity, gravity)
    });
    let hit = trajectory::predict_platform_hit(&prediction, &state.platforms, gravity);
    let points = trajectory::trajectory_points(&prediction, power, gravity, tuning.viewport);

    state.preview = Some(LandingPreview {
        power,
        prediction,
        hit,
        points,
    });
    state.preview_updates += 1;
}

/// Advance the game state by one frame
pub fn tick(state: &mut GameState, generator: &mut PlatformGenerator, tuning: &Tuning) -> TickEvents {
    let mut events = TickEvents::default();
    if state.is_over() {
        return events;
    }

    state.time_ticks += 1;
    state.clock_ms = state.time_ticks as f64 * tuning.frame_ms;
    let viewport = tuning.viewport;

    // Charge and preview only while the button is held
    if state.charge.charging {
        if state.character.is_jumping() {
            cancel_charge(state);
        } else {
            state.charge.power = (state.charge.power + tuning.charge_rate).min(tuning.max_charge);
            update_preview(state, tuning);
        }
    }

    let step = physics::integrate(
        &mut state.character,
        &mut state.trace,
        tuning.gravity,
        state.game_speed,
        state.clock_ms,
    );
    events.stall_corrected = step.stall_corrected;

    if step.integrated {
        let failure = collision::airborne_failure(
            &state.character,
            viewport,
            state.clock_ms,
            tuning.fall_timer_ms,
            &mut state.fall_started_ms,
        );
        if let Some(reason) = failure {
            state.fail(reason);
            events.failure = Some(reason);
            return events;
        }
    }

    if collision::touches_bottom_line(&state.character, viewport) {
        state.fail(FailureReason::BottomLine);
        events.failure = Some(FailureReason::BottomLine);
        return events;
    }

    if collision::maintain_attachment(&mut state.character, &state.platforms) == Attachment::Released {
        events.released = true;
    }

    if let Some(index) = collision::find_landing(&state.character, &state.platforms, tuning.landing_tolerance) {
        events.landing = collision::resolve_landing(state, index, tuning);
    }

    // World scroll, moving platforms, despawn and coverage
    let scroll = state.platform_speed * state.game_speed;
    let now = state.clock_ms;
    for platform in state.platforms.iter_mut() {
        platform.scroll(scroll);
        platform.oscillate(now, viewport.width);
    }
    events.platforms_removed = generator.remove_offscreen(state);
    events.platforms_added = generator.ensure_coverage(state, viewport.width);

    events.speed_up = apply_speed_up(state, tuning);
    events
}

/// Bump game and scroll speed once for each newly crossed score milestone
fn apply_speed_up(state: &mut GameState, tuning: &Tuning) -> bool {
    if tuning.speed_up_every == 0 {
        return false;
    }
    let milestone = state.score / tuning.speed_up_every;
    if milestone <= state.speed_milestone {
        return false;
    }
    let steps = (milestone - state.speed_milestone) as f32;
    state.speed_milestone = milestone;
    state.game_speed += tuning.game_speed_step * steps;
    state.platform_speed += tuning.platform_speed_step * steps;
    // Cached forecasts assumed the old speed
    state.preview_cache.clear();
    log::info!(
        "Speed up at {} points: game {:.2}, scroll {:.2}",
        state.score,
        state.game_speed,
        state.platform_speed
    );
    true
}

/// Whether the character currently rides a platform
pub fn is_grounded(state: &GameState) -> bool {
    matches!(state.character.support, Support::Attached { .. })
}
