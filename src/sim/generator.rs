//! Procedural platform generation
//!
//! Platforms are laid out left to right from the previous platform's right
//! edge. A seeded `Pcg32` keeps every layout reproducible from the run seed.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::state::{GameState, Oscillation, Platform, PlatformKind};
use crate::consts::PLATFORM_HEIGHT;

/// Generation ranges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Gap from the previous right edge
    pub min_spacing: f32,
    pub max_spacing: f32,
    /// Allowed platform top range
    pub min_y: f32,
    pub max_y: f32,
    /// Maximum height change from the previous platform
    pub max_height_change: f32,
    /// Tops within this distance of `min_y`/`max_y` get pushed back inward
    pub edge_band: f32,
    pub base_width: f32,
    pub width_spread: f32,
    pub min_width: f32,
    /// Chance that a generated platform oscillates
    pub moving_chance: f64,
    pub min_move_range: f32,
    pub move_range_spread: f32,
    /// Generated platforms never start left of `screen_width * min_x_ratio`
    pub min_x_ratio: f32,
    /// Fixed starting platform
    pub start_x: f32,
    pub start_y: f32,
    pub start_width: f32,
    /// Second platform placement relative to the first
    pub second_gap: f32,
    pub second_min_y: f32,
    pub second_max_y: f32,
    pub second_min_width: f32,
    pub second_max_width: f32,
    /// Platforms created before play starts
    pub bootstrap_count: usize,
    /// Required coverage past the right screen edge
    pub coverage_margin: f32,
    pub min_platforms: usize,
    pub max_platforms: usize,
    /// Platforms whose right edge reaches this x are removed
    pub despawn_x: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_spacing: 100.0,
            max_spacing: 180.0,
            min_y: 200.0,
            max_y: 400.0,
            max_height_change: 80.0,
            edge_band: 50.0,
            base_width: 60.0,
            width_spread: 40.0,
            min_width: 50.0,
            moving_chance: 0.3,
            min_move_range: 50.0,
            move_range_spread: 100.0,
            min_x_ratio: 0.5,
            start_x: 80.0,
            start_y: 320.0,
            start_width: 250.0,
            second_gap: 120.0,
            second_min_y: 280.0,
            second_max_y: 340.0,
            second_min_width: 80.0,
            second_max_width: 120.0,
            bootstrap_count: 5,
            coverage_margin: 200.0,
            min_platforms: 4,
            max_platforms: 8,
            despawn_x: -100.0,
        }
    }
}

/// Seeded platform generator
#[derive(Debug, Clone)]
pub struct PlatformGenerator {
    config: GeneratorConfig,
    seed: u64,
    rng: Pcg32,
}

impl PlatformGenerator {
    pub fn new(seed: u64, config: GeneratorConfig) -> Self {
        Self {
            config,
            seed,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Swap the generation ranges; the rng stream is untouched
    pub fn configure(&mut self, config: GeneratorConfig) {
        self.config = config;
    }

    /// Uniform sample in `[min, min + spread)`
    fn uniform(&mut self, min: f32, spread: f32) -> f32 {
        min + self.rng.random::<f32>() * spread
    }

    /// Build the platform that follows `platforms` (creation order; the last
    /// entry is the previous platform).
    pub fn generate_next(
        &mut self,
        platforms: &[Platform],
        id: u32,
        screen_width: f32,
        now_ms: f64,
    ) -> Platform {
        let cfg = self.config.clone();
        let width = self.uniform(cfg.base_width, cfg.width_spread).max(cfg.min_width);

        let (x, y) = match platforms.last() {
            None => (
                (screen_width * 0.3).max(cfg.min_spacing),
                (cfg.min_y + cfg.max_y) / 2.0,
            ),
            Some(prev) => {
                let x = prev.right() + self.uniform(cfg.min_spacing, cfg.max_spacing - cfg.min_spacing);
                let delta = self.uniform(-cfg.max_height_change, cfg.max_height_change * 2.0);
                let mut y = (prev.top() + delta).clamp(cfg.min_y, cfg.max_y);
                if y < cfg.min_y + cfg.edge_band {
                    y = cfg.min_y + cfg.edge_band + self.uniform(0.0, cfg.edge_band);
                } else if y > cfg.max_y - cfg.edge_band {
                    y = cfg.max_y - cfg.edge_band - self.uniform(0.0, cfg.edge_band);
                }
                (x, y)
            }
        };
        let x = x.max(screen_width * cfg.min_x_ratio);

        let motion = if self.rng.random_bool(cfg.moving_chance.clamp(0.0, 1.0)) {
            let speed = self.uniform(-1.0, 2.0);
            let direction = if self.rng.random_bool(0.5) { 1.0 } else { -1.0 };
            let move_range = self.uniform(cfg.min_move_range, cfg.move_range_spread);
            Some(Oscillation {
                speed,
                direction,
                move_range,
                original_x: x,
            })
        } else {
            None
        };

        Platform {
            id,
            pos: Vec2::new(x, y),
            width,
            height: PLATFORM_HEIGHT,
            kind: PlatformKind::Normal,
            motion,
            created_at_ms: now_ms,
        }
    }

    /// Replace the platform set with the opening layout: a wide fixed start
    /// platform, a near second one, then generated platforms.
    pub fn bootstrap(&mut self, state: &mut GameState, screen_width: f32) {
        let cfg = self.config.clone();
        let now = state.clock_ms;
        state.platforms.clear();

        let first = Platform {
            id: state.next_entity_id(),
            pos: Vec2::new(cfg.start_x, cfg.start_y),
            width: cfg.start_width,
            height: PLATFORM_HEIGHT,
            kind: PlatformKind::Normal,
            motion: None,
            created_at_ms: now,
        };
        let second_y = self.uniform(cfg.second_min_y, cfg.second_max_y - cfg.second_min_y);
        let second_width =
            self.uniform(cfg.second_min_width, cfg.second_max_width - cfg.second_min_width);
        let second = Platform {
            id: state.next_entity_id(),
            pos: Vec2::new(first.right() + cfg.second_gap, second_y),
            width: second_width,
            height: PLATFORM_HEIGHT,
            kind: PlatformKind::Normal,
            motion: None,
            created_at_ms: now,
        };
        state.platforms.push(first);
        state.platforms.push(second);

        while state.platforms.len() < cfg.bootstrap_count {
            let id = state.next_entity_id();
            let platform = self.generate_next(&state.platforms, id, screen_width, now);
            state.platforms.push(platform);
        }
        log::debug!("Bootstrapped {} platforms (seed {})", state.platforms.len(), self.seed);
    }

    /// Top the set back up: extend past the right edge while under the cap,
    /// then guarantee the minimum count. Returns how many were added.
    pub fn ensure_coverage(&mut self, state: &mut GameState, screen_width: f32) -> usize {
        let target = screen_width + self.config.coverage_margin;
        let now = state.clock_ms;
        let mut added = 0;

        while state.rightmost_edge() < target && state.platforms.len() < self.config.max_platforms {
            let id = state.next_entity_id();
            let platform = self.generate_next(&state.platforms, id, screen_width, now);
            state.platforms.push(platform);
            added += 1;
        }
        while state.platforms.len() < self.config.min_platforms {
            let id = state.next_entity_id();
            let platform = self.generate_next(&state.platforms, id, screen_width, now);
            state.platforms.push(platform);
            added += 1;
        }
        added
    }

    /// Drop platforms that have scrolled past the left despawn line
    pub fn remove_offscreen(&self, state: &mut GameState) -> usize {
        let before = state.platforms.len();
        let despawn_x = self.config.despawn_x;
        state.platforms.retain(|p| p.right() > despawn_x);
        before - state.platforms.len()
    }
}
