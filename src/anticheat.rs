//! Heuristic, client-side score plausibility checks
//!
//! Four static rules flag impossible scores, inhuman reaction times,
//! teleport-sized landing errors and implausible perfect streaks. An
//! adaptive check compares a score against the player's own history.
//! None of this is authoritative; it only decides whether a run is kept
//! off the local leaderboard.

use std::collections::BTreeMap;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::sim::state::JumpTelemetry;

/// Suspicious records older than this are pruned
pub const RECORD_RETENTION_MS: f64 = 30.0 * 24.0 * 60.0 * 60.0 * 1000.0;
/// Games needed before the adaptive check has an opinion
pub const MIN_BASELINE_GAMES: u32 = 5;

/// Static rule limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheatThresholds {
    pub impossible_score: u64,
    pub min_reaction_ms: f64,
    pub max_position_delta: f32,
    pub max_perfect_streak: u32,
}

impl Default for CheatThresholds {
    fn default() -> Self {
        Self {
            impossible_score: 10_000,
            min_reaction_ms: 200.0,
            max_position_delta: 100.0,
            max_perfect_streak: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ImpossibleScore,
    SpeedHack,
    PositionTeleport,
    PerfectStreak,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::ImpossibleScore => "impossible_score",
            ViolationKind::SpeedHack => "speed_hack",
            ViolationKind::PositionTeleport => "position_teleport",
            ViolationKind::PerfectStreak => "perfect_streak",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::ImpossibleScore | ViolationKind::PositionTeleport => Severity::High,
            ViolationKind::SpeedHack | ViolationKind::PerfectStreak => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub details: String,
    pub timestamp_ms: f64,
}

impl Violation {
    fn new(kind: ViolationKind, details: String, timestamp_ms: f64) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            details,
            timestamp_ms,
        }
    }
}

/// Ordinal risk summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_violations(violations: &[Violation]) -> Self {
        let high = violations.iter().filter(|v| v.severity == Severity::High).count();
        let medium = violations.iter().filter(|v| v.severity == Severity::Medium).count();

        if high >= 2 || (high >= 1 && medium >= 2) {
            RiskLevel::Critical
        } else if high >= 1 || medium >= 3 {
            RiskLevel::High
        } else if medium >= 1 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Outcome of the static rules for one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiCheatReport {
    pub is_cheating: bool,
    pub violations: Vec<Violation>,
    pub risk_level: RiskLevel,
}

/// A flagged submission kept for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousRecord {
    pub score: u64,
    pub violations: Vec<Violation>,
    pub timestamp_ms: f64,
}

/// Running per-player statistics (Welford). Variances are population
/// variances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerBehaviorBaseline {
    pub games_played: u32,
    pub mean_score: f64,
    /// Sum of squared score deviations
    pub m2_score: f64,
    pub mean_reaction_ms: f64,
    pub m2_reaction: f64,
    pub last_update_ms: f64,
}

impl PlayerBehaviorBaseline {
    /// Fold in one completed game
    pub fn record(&mut self, score: f64, reaction_ms: f64, now_ms: f64) {
        self.games_played += 1;
        let n = self.games_played as f64;

        let delta = score - self.mean_score;
        self.mean_score += delta / n;
        self.m2_score += delta * (score - self.mean_score);

        let delta = reaction_ms - self.mean_reaction_ms;
        self.mean_reaction_ms += delta / n;
        self.m2_reaction += delta * (reaction_ms - self.mean_reaction_ms);

        self.last_update_ms = now_ms;
    }

    pub fn score_variance(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.m2_score / self.games_played as f64
        }
    }

    pub fn score_std_dev(&self) -> f64 {
        self.score_variance().sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    InsufficientData,
    WithinReasonableRange,
    ScoreTooHigh,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::InsufficientData => "insufficient_data",
            ValidationReason::WithinReasonableRange => "within_reasonable_range",
            ValidationReason::ScoreTooHigh => "score_too_high",
        }
    }
}

/// Adaptive baseline check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub is_valid: bool,
    pub reason: ValidationReason,
    pub details: Option<String>,
}

/// Combined verdict of the delayed second check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryValidation {
    pub is_valid: bool,
    pub risk_level: RiskLevel,
    pub baseline: Validation,
    pub reason: String,
}

/// Second check: waits on `delay` (standing in for a round trip), then
/// accepts only when the baseline check passed and risk is below critical.
/// Owns everything it needs, so the caller keeps running while it waits.
pub async fn secondary_validation(
    baseline: Validation,
    risk_level: RiskLevel,
    delay: LocalBoxFuture<'static, ()>,
) -> SecondaryValidation {
    delay.await;
    let is_valid = baseline.is_valid && risk_level != RiskLevel::Critical;
    let reason = if is_valid {
        baseline.reason.as_str().to_string()
    } else if !baseline.is_valid {
        format!("baseline {}", baseline.reason.as_str())
    } else {
        format!("risk {}", risk_level.as_str())
    };
    SecondaryValidation {
        is_valid,
        risk_level,
        baseline,
        reason,
    }
}

/// Monitor summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiCheatHealth {
    pub tracked_players: usize,
    pub suspicious_players: usize,
    pub suspicious_records: usize,
}

/// Per-player cheat heuristics and behavior baselines
#[derive(Debug, Clone, Default)]
pub struct AntiCheatMonitor {
    thresholds: CheatThresholds,
    suspicious: BTreeMap<String, Vec<SuspiciousRecord>>,
    baselines: BTreeMap<String, PlayerBehaviorBaseline>,
}

impl AntiCheatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: CheatThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    /// Run every static rule (no short-circuit) and record a suspicious entry
    /// when anything fires.
    pub fn evaluate(&mut self, player_id: &str, score: u64, telemetry: &JumpTelemetry, now_ms: f64) -> AntiCheatReport {
        let t = self.thresholds;
        let mut violations = Vec::new();

        if score > t.impossible_score {
            violations.push(Violation::new(
                ViolationKind::ImpossibleScore,
                format!("Score {score} exceeds maximum threshold"),
                now_ms,
            ));
        }
        if telemetry.reaction_time_ms < t.min_reaction_ms {
            violations.push(Violation::new(
                ViolationKind::SpeedHack,
                format!("Reaction time {:.0}ms too fast", telemetry.reaction_time_ms),
                now_ms,
            ));
        }
        if telemetry.position_delta > t.max_position_delta {
            violations.push(Violation::new(
                ViolationKind::PositionTeleport,
                format!("Position jump {:.1} detected", telemetry.position_delta),
                now_ms,
            ));
        }
        if telemetry.perfect_streak > t.max_perfect_streak {
            violations.push(Violation::new(
                ViolationKind::PerfectStreak,
                format!("Perfect streak {} exceeds threshold", telemetry.perfect_streak),
                now_ms,
            ));
        }

        let risk_level = RiskLevel::from_violations(&violations);
        if !violations.is_empty() {
            for v in &violations {
                log::warn!("Anti-cheat [{}] {}: {}", player_id, v.kind.as_str(), v.details);
            }
            self.record_suspicious(player_id, score, violations.clone(), now_ms);
        }

        AntiCheatReport {
            is_cheating: !violations.is_empty(),
            violations,
            risk_level,
        }
    }

    fn record_suspicious(&mut self, player_id: &str, score: u64, violations: Vec<Violation>, now_ms: f64) {
        self.suspicious
            .entry(player_id.to_string())
            .or_default()
            .push(SuspiciousRecord {
                score,
                violations,
                timestamp_ms: now_ms,
            });
        self.prune(player_id, now_ms);
    }

    /// Drop records past the retention window
    pub fn prune(&mut self, player_id: &str, now_ms: f64) {
        let cutoff = now_ms - RECORD_RETENTION_MS;
        if let Some(records) = self.suspicious.get_mut(player_id) {
            records.retain(|r| r.timestamp_ms > cutoff);
            if records.is_empty() {
                self.suspicious.remove(player_id);
            }
        }
    }

    pub fn suspicious_records(&self, player_id: &str) -> &[SuspiciousRecord] {
        self.suspicious.get(player_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn baseline(&self, player_id: &str) -> Option<&PlayerBehaviorBaseline> {
        self.baselines.get(player_id)
    }

    /// Install a baseline loaded from storage
    pub fn set_baseline(&mut self, player_id: &str, baseline: PlayerBehaviorBaseline) {
        self.baselines.insert(player_id.to_string(), baseline);
    }

    /// Fold a finished game into the player's baseline
    pub fn update_baseline(&mut self, player_id: &str, score: u64, reaction_ms: f64, now_ms: f64) -> &PlayerBehaviorBaseline {
        let baseline = self.baselines.entry(player_id.to_string()).or_default();
        baseline.record(score as f64, reaction_ms, now_ms);
        baseline
    }

    /// Compare a score with the player's history (mean + 3σ)
    pub fn validate_score_reasonableness(&self, player_id: &str, score: u64) -> Validation {
        let Some(baseline) = self
            .baselines
            .get(player_id)
            .filter(|b| b.games_played >= MIN_BASELINE_GAMES)
        else {
            return Validation {
                is_valid: true,
                reason: ValidationReason::InsufficientData,
                details: None,
            };
        };

        let limit = baseline.mean_score + 3.0 * baseline.score_std_dev();
        if score as f64 > limit {
            Validation {
                is_valid: false,
                reason: ValidationReason::ScoreTooHigh,
                details: Some(format!("Score {score} exceeds reasonable maximum {limit:.2}")),
            }
        } else {
            Validation {
                is_valid: true,
                reason: ValidationReason::WithinReasonableRange,
                details: None,
            }
        }
    }

    pub fn system_health(&self) -> AntiCheatHealth {
        AntiCheatHealth {
            tracked_players: self.baselines.len(),
            suspicious_players: self.suspicious.len(),
            suspicious_records: self.suspicious.values().map(Vec::len).sum(),
        }
    }
}
