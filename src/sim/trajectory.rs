//! Landing prediction for the charge preview
//!
//! Closed-form ballistic solution of the same launch model the integrator
//! uses. Everything here is a pure function of its inputs; the cache is a
//! memo and never changes results.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::physics::launch_velocity;
use super::state::Platform;
use crate::Viewport;

/// Predicted flight from launch to return to the launch height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub start: Vec2,
    pub landing: Vec2,
    /// Flight time in ticks
    pub flight_time: f32,
    /// Launch velocity
    pub velocity: Vec2,
    pub horizontal_distance: f32,
}

impl Prediction {
    /// Vertical speed on arrival
    pub fn landing_vy(&self, gravity: f32) -> f32 {
        self.velocity.y + gravity * self.flight_time
    }

    /// Position `t` ticks after launch
    pub fn position_at(&self, t: f32, gravity: f32) -> Vec2 {
        self.start + self.velocity * t + Vec2::new(0.0, 0.5 * gravity * t * t)
    }
}

/// Ballistic landing for a launch velocity from `start`
pub fn predict(start: Vec2, velocity: Vec2, gravity: f32) -> Prediction {
    let flight_time = if gravity > 0.0 {
        (-2.0 * velocity.y / gravity).max(0.0)
    } else {
        0.0
    };
    let landing = start + velocity * flight_time + Vec2::new(0.0, 0.5 * gravity * flight_time * flight_time);
    Prediction {
        start,
        landing,
        flight_time,
        velocity,
        horizontal_distance: velocity.x * flight_time,
    }
}

/// Prediction for a charge level, using the integrator's launch model
pub fn predict_from_power(start: Vec2, power: f32, max_charge: f32, inherited_vx: f32, gravity: f32) -> Prediction {
    predict(start, launch_velocity(power, max_charge, inherited_vx), gravity)
}

/// Landing quality band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandingQuality {
    Perfect,
    Excellent,
    Good,
    Ok,
    Miss,
}

impl LandingQuality {
    pub fn from_accuracy(accuracy: f32) -> Self {
        if accuracy >= 0.9 {
            LandingQuality::Perfect
        } else if accuracy >= 0.7 {
            LandingQuality::Excellent
        } else if accuracy >= 0.5 {
            LandingQuality::Good
        } else if accuracy >= 0.3 {
            LandingQuality::Ok
        } else {
            LandingQuality::Miss
        }
    }

    pub fn base_score(&self) -> f32 {
        match self {
            LandingQuality::Perfect => 100.0,
            LandingQuality::Excellent => 70.0,
            LandingQuality::Good => 40.0,
            LandingQuality::Ok => 20.0,
            LandingQuality::Miss => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandingQuality::Perfect => "perfect",
            LandingQuality::Excellent => "excellent",
            LandingQuality::Good => "good",
            LandingQuality::Ok => "ok",
            LandingQuality::Miss => "miss",
        }
    }
}

/// Platform the prediction lands on and how well
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformHit {
    pub platform_id: u32,
    /// 1 at the centre, 0 at (or past) the edge
    pub accuracy: f32,
    pub quality: LandingQuality,
    pub score: f32,
}

/// Platform tops must lie within this band around the predicted landing y
const HIT_BAND_ABOVE: f32 = 20.0;
const HIT_BAND_BELOW: f32 = 10.0;

/// Pick the platform nearest the predicted landing x among those whose top
/// sits in the landing band, and grade the landing.
pub fn predict_platform_hit(prediction: &Prediction, platforms: &[Platform], gravity: f32) -> Option<PlatformHit> {
    let landing = prediction.landing;
    let target = platforms
        .iter()
        .filter(|p| p.has_collision())
        .filter(|p| p.top() >= landing.y - HIT_BAND_ABOVE && p.top() <= landing.y + HIT_BAND_BELOW)
        .min_by(|a, b| {
            let da = (a.center_x() - landing.x).abs();
            let db = (b.center_x() - landing.x).abs();
            da.total_cmp(&db)
        })?;

    let half_width = target.width / 2.0;
    let accuracy = (1.0 - (landing.x - target.center_x()).abs() / half_width).max(0.0);
    let quality = LandingQuality::from_accuracy(accuracy);
    let penalty = 2.0 * prediction.landing_vy(gravity).abs();
    let score = (quality.base_score() - penalty).max(0.0);

    Some(PlatformHit {
        platform_id: target.id,
        accuracy,
        quality,
        score,
    })
}

/// A dot of the preview arc
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub pos: Vec2,
    pub alpha: f32,
    pub scale: f32,
    pub time: f32,
}

/// Evenly timed preview dots along the predicted arc. More charge draws more
/// dots (8 to 15); dots outside the padded viewport are dropped.
pub fn trajectory_points(prediction: &Prediction, power: f32, gravity: f32, viewport: Viewport) -> Vec<TrajectoryPoint> {
    let ratio = power / 100.0;
    let count = ((ratio * 15.0).floor() as i32).clamp(8, 15) as usize;

    (0..=count)
        .filter_map(|i| {
            let frac = i as f32 / count as f32;
            let time = frac * prediction.flight_time;
            let pos = prediction.position_at(time, gravity);
            let visible = pos.x > -50.0
                && pos.x < viewport.width + 50.0
                && pos.y > -50.0
                && pos.y < viewport.height + 50.0;
            visible.then_some(TrajectoryPoint {
                pos,
                alpha: 1.0 - frac * 0.7,
                scale: 1.0 - frac * 0.3,
                time,
            })
        })
        .collect()
}

/// Everything the charge preview shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingPreview {
    pub power: f32,
    pub prediction: Prediction,
    pub hit: Option<PlatformHit>,
    pub points: Vec<TrajectoryPoint>,
}

/// Cache key: rounded launch point, charge and inherited velocity (hundredths)
type CacheKey = (i32, i32, i32, i32);

/// FIFO memo of recent predictions
#[derive(Debug, Clone)]
pub struct PredictionCache {
    entries: VecDeque<(CacheKey, Prediction)>,
    capacity: usize,
}

impl Default for PredictionCache {
    fn default() -> Self {
        Self::with_capacity(50)
    }
}

impl PredictionCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn key(start: Vec2, power: f32, inherited_vx: f32) -> CacheKey {
        (
            start.x.round() as i32,
            start.y.round() as i32,
            power.round() as i32,
            (inherited_vx * 100.0).round() as i32,
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up a prediction, computing and inserting it on a miss. The oldest
    /// entry is evicted when full.
    pub fn get_or_insert_with(
        &mut self,
        start: Vec2,
        power: f32,
        inherited_vx: f32,
        compute: impl FnOnce() -> Prediction,
    ) -> Prediction {
        let key = Self::key(start, power, inherited_vx);
        if let Some((_, cached)) = self.entries.iter().find(|(k, _)| *k == key) {
            return *cached;
        }
        let prediction = compute();
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, prediction));
        prediction
    }
}
