//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only (the clock is derived from the tick count)
//! - Seeded RNG only
//! - Stable iteration order (platforms in creation order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod generator;
pub mod physics;
pub mod state;
pub mod tick;
pub mod trajectory;

pub use collision::Landing;
pub use generator::{GeneratorConfig, PlatformGenerator};
pub use physics::{StepReport, integrate, launch_velocity};
pub use state::{
    Character, FailureReason, GamePhase, GameState, JumpTelemetry, MotionSample, MotionTrace,
    Oscillation, Platform, PlatformKind, Support,
};
pub use tick::{TickEvents, begin_charge, cancel_charge, launch, release_charge, start_run, tick};
pub use trajectory::{
    LandingPreview, LandingQuality, PlatformHit, Prediction, PredictionCache, TrajectoryPoint,
};
