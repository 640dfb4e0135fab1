//! Run orchestration and score submission
//!
//! `GameSession` owns the run state and every collaborator. Input and the
//! frame loop call `press`/`release`/`tick`; when a run ends the session
//! updates the save and the caller submits the score.
//!
//! Submission is split so the frame loop never waits on it:
//! - `prepare_submission` (sync): anti-cheat, judgment, baseline check
//! - `settle_submission` (async, abortable): delayed second check; the
//!   returned future borrows nothing from the session
//! - `commit_submission` (sync): leaderboard, personal best, baseline
//!
//! `submit_score` chains the three and falls back to a local-only result
//! when settling is cancelled or storage is gone.

use std::rc::Rc;

use futures::future::{AbortHandle, AbortRegistration, Abortable, LocalBoxFuture};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::anticheat::{
    AntiCheatMonitor, AntiCheatReport, PlayerBehaviorBaseline, SecondaryValidation, Validation, secondary_validation,
};
use crate::error::{NicknameError, StorageError, SubmissionError};
use crate::eventlog::{GameLog, events};
use crate::highscores::Leaderboard;
use crate::i18n::{Language, Translator, detect_language};
use crate::judge::{Judgment, PlayerSkill, PrecisionJudge};
use crate::persistence::{DualStore, StorageHealth, keys};
use crate::platform::{Environment, clock_of};
use crate::profile::{self, GameRecord, GameSave, PersonalBest, Skin};
use crate::sim::generator::PlatformGenerator;
use crate::sim::state::{FailureReason, GameState, JumpTelemetry};
use crate::sim::tick::{self, TickEvents};
use crate::tuning::Tuning;

/// Non-fatal note attached to an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionWarning {
    /// Flagged by anti-cheat, accepted by the second check
    ValidatedButMonitored,
    /// Validation did not finish; scored locally only
    LocalOnly,
    /// Neither storage backend accepted the write
    StorageUnavailable,
}

impl SubmissionWarning {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionWarning::ValidatedButMonitored => "score_validated_but_monitored",
            SubmissionWarning::LocalOnly => "local_only",
            SubmissionWarning::StorageUnavailable => "storage_unavailable",
        }
    }
}

/// Result of a score submission
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSubmission {
    /// Score reached the leaderboard and storage
    pub success: bool,
    pub score: u64,
    pub judgment: Judgment,
    pub anti_cheat: AntiCheatReport,
    /// Present when anti-cheat flagged the run
    pub validation: Option<SecondaryValidation>,
    pub storage_health: StorageHealth,
    pub warning: Option<SubmissionWarning>,
}

/// Output of the synchronous prepare step
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub score: u64,
    pub nickname: String,
    pub telemetry: JumpTelemetry,
    pub anti_cheat: AntiCheatReport,
    pub judgment: Judgment,
    baseline_check: Validation,
}

/// Output of the asynchronous settle step
#[derive(Debug, Clone)]
pub struct SettledSubmission {
    pub pending: PendingSubmission,
    pub validation: Option<SecondaryValidation>,
}

/// End-of-run summary for the game over screen
#[derive(Debug, Clone, PartialEq)]
pub struct GameOverSummary {
    pub reason: FailureReason,
    pub score: u64,
    pub perfect_count: u32,
    pub max_combo: u32,
    pub record: GameRecord,
    /// Share of the leaderboard this score ties or beats
    pub beat_percentage: u32,
}

pub struct GameSession {
    env: Rc<dyn Environment>,
    store: DualStore,
    tuning: Tuning,
    generator: PlatformGenerator,
    judge: PrecisionJudge,
    monitor: AntiCheatMonitor,
    state: GameState,
    running: bool,
    player_id: String,
    nickname: String,
    save: GameSave,
    leaderboard: Leaderboard,
    translator: Translator,
    log: GameLog,
    last_game_over: Option<GameOverSummary>,
    abort_registration: Option<AbortRegistration>,
}

impl GameSession {
    /// Wire a session to its host and collaborators, loading everything the
    /// player has stored.
    pub fn new(
        env: Rc<dyn Environment>,
        mut generator: PlatformGenerator,
        judge: PrecisionJudge,
        mut monitor: AntiCheatMonitor,
    ) -> Self {
        let mut store = DualStore::new(env.primary_store(), env.backup_store(), clock_of(&env));
        let health = store.check_health();
        if !health.overall {
            log::warn!("No storage backend is writable; progress will not persist");
        }
        let tuning = Tuning::load(&mut store).with_viewport(env.viewport());
        generator.configure(tuning.generator.clone());
        let now = env.now_ms();

        let player_id = profile::load_or_create_player_id(&mut store, now, env.entropy());
        if let Some(baseline) = store.get_json::<PlayerBehaviorBaseline>(&keys::baseline(&player_id)) {
            monitor.set_baseline(&player_id, baseline);
        }

        let stored_language = store.get(keys::LANGUAGE);
        let language = detect_language(
            env.requested_language().as_deref(),
            stored_language.as_deref(),
            &env.preferred_languages(),
        );

        let nickname = profile::load_nickname(&mut store);
        let save = GameSave::load(&mut store);
        let leaderboard = Leaderboard::load(&mut store);
        let session_id = format!("session_{}_{}", now as u64, profile::base36(env.entropy(), 9));
        let state = GameState::new(&tuning);

        log::info!("Session {session_id} for {player_id} ({})", language.code());

        Self {
            env,
            store,
            tuning,
            generator,
            judge,
            monitor,
            state,
            running: false,
            player_id,
            nickname,
            save,
            leaderboard,
            translator: Translator::new(language),
            log: GameLog::new(session_id),
            last_game_over: None,
            abort_registration: None,
        }
    }

    // === Run control ===

    /// Begin a fresh run
    pub fn start(&mut self) {
        tick::start_run(&mut self.state, &mut self.generator, &self.tuning);
        self.running = true;
        self.last_game_over = None;
        self.log.record(
            events::SESSION_STARTED,
            json!({ "player_id": self.player_id, "seed": self.generator.seed() }),
            self.env.now_ms(),
        );
    }

    /// Restart after a game over
    pub fn reset(&mut self) {
        self.start();
    }

    /// Halt the loop without ending the run
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Button down
    pub fn press(&mut self) -> bool {
        self.running && tick::begin_charge(&mut self.state)
    }

    /// Button up
    pub fn release(&mut self) -> bool {
        self.running && tick::release_charge(&mut self.state, &self.tuning)
    }

    /// Advance one frame. Ends the run on a terminal failure.
    pub fn tick(&mut self) -> TickEvents {
        if !self.running {
            return TickEvents::default();
        }
        let events = tick::tick(&mut self.state, &mut self.generator, &self.tuning);
        if let Some(reason) = events.failure {
            self.running = false;
            self.finish_run(reason);
        }
        events
    }

    fn finish_run(&mut self, reason: FailureReason) {
        let now = self.env.now_ms();
        let score = self.state.score;
        let record = self.save.record_game(score);
        if let Err(e) = self.save.save(&mut self.store) {
            log::warn!("Save not persisted: {e}");
        }

        self.log.record(
            events::GAME_OVER,
            json!({ "reason": reason.as_str(), "score": score, "perfect_count": self.state.perfect_count }),
            now,
        );
        for skin in &record.unlocked {
            self.log.record(events::SKIN_UNLOCKED, json!({ "skin": skin.as_str() }), now);
        }
        if record.prompt_nickname {
            self.log.record(events::NICKNAME_PROMPT, json!({ "score": score }), now);
        }

        self.last_game_over = Some(GameOverSummary {
            reason,
            score,
            perfect_count: self.state.perfect_count,
            max_combo: self.state.max_combo,
            record,
            beat_percentage: self.leaderboard.beat_percentage(score),
        });
    }

    /// Telemetry of the run that just ended, as handed to the monitor. A
    /// run that ended mid-flight is measured against the nearest platform.
    pub fn submission_telemetry(&self) -> JumpTelemetry {
        let state = &self.state;
        let mut telemetry = state.telemetry.clone();
        telemetry.perfect_streak = state.perfect_count;

        let landed_last_jump = state.landings > 0 && state.last_landing_ms >= state.launched_at_ms;
        if !landed_last_jump {
            let feet = state.character.bottom_center();
            telemetry.player_position = feet;
            telemetry.target_position = state
                .platforms
                .iter()
                .map(|p| p.top_center())
                .min_by(|a, b| (a.x - feet.x).abs().total_cmp(&(b.x - feet.x).abs()))
                .unwrap_or(Vec2::ZERO);
        }
        telemetry
    }

    // === Score submission ===

    /// Run anti-cheat and judgment for a finished run
    pub fn prepare_submission(&mut self, score: u64, telemetry: JumpTelemetry) -> PendingSubmission {
        let now = self.env.now_ms();
        let anti_cheat = self.monitor.evaluate(&self.player_id, score, &telemetry, now);
        let skill = PlayerSkill::from_games_played(self.save.game_count);
        let judgment = self
            .judge
            .judge(telemetry.player_position, telemetry.target_position, &telemetry, skill);
        let baseline_check = self.monitor.validate_score_reasonableness(&self.player_id, score);

        if anti_cheat.is_cheating {
            self.log.record(
                events::SUSPICIOUS_SCORE,
                json!({
                    "player_id": self.player_id,
                    "score": score,
                    "risk_level": anti_cheat.risk_level.as_str(),
                    "violations": anti_cheat.violations.len(),
                }),
                now,
            );
            for violation in &anti_cheat.violations {
                self.log.record(events::VIOLATION_RECORDED, json!(violation), now);
            }
        }

        PendingSubmission {
            score,
            nickname: self.nickname.clone(),
            telemetry,
            anti_cheat,
            judgment,
            baseline_check,
        }
    }

    /// Handle that cancels the next settle step
    pub fn submission_abort_handle(&mut self) -> AbortHandle {
        let (handle, registration) = AbortHandle::new_pair();
        self.abort_registration = Some(registration);
        handle
    }

    /// Second check for flagged runs. Clean runs settle immediately. The
    /// future owns its inputs, so the session stays usable while it runs.
    pub fn settle_submission(
        &mut self,
        pending: PendingSubmission,
    ) -> LocalBoxFuture<'static, Result<SettledSubmission, SubmissionError>> {
        let registration = self
            .abort_registration
            .take()
            .unwrap_or_else(|| AbortHandle::new_pair().1);
        let delay = self.env.delay(self.tuning.secondary_validation_delay_ms);

        let work = async move {
            let validation = if pending.anti_cheat.is_cheating {
                let check = pending.baseline_check.clone();
                Some(secondary_validation(check, pending.anti_cheat.risk_level, delay).await)
            } else {
                None
            };
            SettledSubmission { pending, validation }
        };

        Box::pin(async move {
            Abortable::new(work, registration)
                .await
                .map_err(|_| SubmissionError::Cancelled)
        })
    }

    /// Apply a settled submission: baseline, then leaderboard and personal
    /// best unless the second check rejected it.
    pub fn commit_submission(&mut self, settled: SettledSubmission) -> Result<ScoreSubmission, SubmissionError> {
        let SettledSubmission { pending, validation } = settled;
        let now = self.env.now_ms();
        self.update_baseline(pending.score, pending.telemetry.reaction_time_ms, now);

        if let Some(check) = validation.as_ref().filter(|v| !v.is_valid) {
            log::warn!("Score {} rejected: {}", pending.score, check.reason);
            self.log.record(
                events::SCORE_REJECTED,
                json!({ "score": pending.score, "reason": check.reason }),
                now,
            );
            return Err(SubmissionError::ScoreRejected {
                anti_cheat: Box::new(pending.anti_cheat),
                validation: Box::new(check.clone()),
            });
        }

        self.leaderboard.submit(&pending.nickname, pending.score, now);
        self.persist_score(pending.score, now)?;

        self.log.record(
            events::SCORE_SUBMITTED,
            json!({
                "player_id": self.player_id,
                "score": pending.score,
                "judgment": pending.judgment.label.as_str(),
                "risk_level": pending.anti_cheat.risk_level.as_str(),
            }),
            now,
        );
        log::info!(
            "Score {} submitted ({}, risk {})",
            pending.score,
            pending.judgment.label.as_str(),
            pending.anti_cheat.risk_level.as_str()
        );

        Ok(ScoreSubmission {
            success: true,
            score: pending.score,
            warning: validation.as_ref().map(|_| SubmissionWarning::ValidatedButMonitored),
            judgment: pending.judgment,
            anti_cheat: pending.anti_cheat,
            validation,
            storage_health: self.store.health(),
        })
    }

    /// Full submission. Rejections surface as `ScoreRejected`; cancellation
    /// and storage loss degrade to a local-only result.
    pub async fn submit_score(
        &mut self,
        score: u64,
        telemetry: JumpTelemetry,
    ) -> Result<ScoreSubmission, SubmissionError> {
        let pending = self.prepare_submission(score, telemetry);
        let fallback = pending.clone();
        let settled = self.settle_submission(pending).await;
        self.finish_submission(fallback, settled)
    }

    /// Commit a settle result, degrading cancellation and storage loss to a
    /// local-only result. `fallback` is the prepared submission that was
    /// handed to the settle step.
    pub fn finish_submission(
        &mut self,
        fallback: PendingSubmission,
        settled: Result<SettledSubmission, SubmissionError>,
    ) -> Result<ScoreSubmission, SubmissionError> {
        let score = fallback.score;
        match settled.and_then(|s| self.commit_submission(s)) {
            Err(SubmissionError::Cancelled) => {
                log::warn!("Score validation cancelled, scoring locally");
                Ok(self.local_only_submission(fallback))
            }
            Err(SubmissionError::Storage(e)) => {
                log::warn!("Score not persisted: {e}");
                Ok(ScoreSubmission {
                    success: false,
                    score,
                    judgment: fallback.judgment,
                    anti_cheat: fallback.anti_cheat,
                    validation: None,
                    storage_health: self.store.health(),
                    warning: Some(SubmissionWarning::StorageUnavailable),
                })
            }
            other => other,
        }
    }

    /// Deterministic path when validation never finished. Only a clean run
    /// is ranked.
    fn local_only_submission(&mut self, pending: PendingSubmission) -> ScoreSubmission {
        let now = self.env.now_ms();
        self.update_baseline(pending.score, pending.telemetry.reaction_time_ms, now);

        let clean = !pending.anti_cheat.is_cheating;
        if clean {
            self.leaderboard.submit(&pending.nickname, pending.score, now);
            if let Err(e) = self.persist_score(pending.score, now) {
                log::warn!("Local score not persisted: {e}");
            }
        }

        ScoreSubmission {
            success: clean,
            score: pending.score,
            judgment: pending.judgment,
            anti_cheat: pending.anti_cheat,
            validation: None,
            storage_health: self.store.health(),
            warning: Some(SubmissionWarning::LocalOnly),
        }
    }

    fn persist_score(&mut self, score: u64, now: f64) -> Result<(), StorageError> {
        self.leaderboard.save(&mut self.store)?;
        if PersonalBest::record(&mut self.store, &self.player_id, score, now)? {
            log::info!("New personal best: {score}");
        }
        Ok(())
    }

    fn update_baseline(&mut self, score: u64, reaction_ms: f64, now: f64) {
        let baseline = self.monitor.update_baseline(&self.player_id, score, reaction_ms, now).clone();
        if let Err(e) = self.store.set_json(&keys::baseline(&self.player_id), &baseline) {
            log::warn!("Baseline not persisted: {e}");
        }
    }

    // === Profile ===

    /// Validate and store a nickname. Invalid input changes nothing.
    pub fn set_nickname(&mut self, raw: &str) -> Result<String, NicknameError> {
        let nickname = profile::save_nickname(&mut self.store, raw)?;
        self.nickname = nickname.clone();
        self.save.has_set_nickname = true;
        if let Err(e) = self.save.save(&mut self.store) {
            log::warn!("Save not persisted: {e}");
        }
        self.log.record(
            events::NICKNAME_SET,
            json!({ "player_id": self.player_id, "nickname": nickname }),
            self.env.now_ms(),
        );
        Ok(nickname)
    }

    pub fn select_skin(&mut self, skin: Skin) -> bool {
        if !self.save.select_skin(skin) {
            return false;
        }
        if let Err(e) = self.save.save(&mut self.store) {
            log::warn!("Save not persisted: {e}");
        }
        true
    }

    pub fn set_language(&mut self, code: &str) -> bool {
        self.translator.set_language_code(code, &mut self.store)
    }

    pub fn translate<'a>(&self, key: &'a str) -> &'a str {
        self.translator.translate(key)
    }

    // === Accessors ===

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn game_save(&self) -> &GameSave {
        &self.save
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn language(&self) -> Language {
        self.translator.language()
    }

    pub fn event_log(&self) -> &GameLog {
        &self.log
    }

    pub fn monitor(&self) -> &AntiCheatMonitor {
        &self.monitor
    }

    pub fn last_game_over(&self) -> Option<&GameOverSummary> {
        self.last_game_over.as_ref()
    }

    pub fn personal_best(&mut self) -> PersonalBest {
        PersonalBest::load(&mut self.store, &self.player_id)
    }

    /// Probe both storage backends
    pub fn storage_health(&mut self) -> StorageHealth {
        self.store.check_health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anticheat::RiskLevel;
    use crate::judge::JudgmentLabel;
    use crate::platform::HeadlessEnvironment;
    use crate::sim::generator::GeneratorConfig;
    use futures::executor::block_on;

    fn session_on(env: &HeadlessEnvironment) -> GameSession {
        let env: Rc<dyn Environment> = Rc::new(env.clone());
        GameSession::new(
            env,
            PlatformGenerator::new(3, GeneratorConfig::default()),
            PrecisionJudge::new(),
            AntiCheatMonitor::new(),
        )
    }

    fn clean_telemetry() -> JumpTelemetry {
        JumpTelemetry {
            reaction_time_ms: 700.0,
            position_delta: 8.0,
            actual_timing_ms: 500.0,
            player_position: Vec2::new(100.0, 300.0),
            target_position: Vec2::new(100.0, 300.0),
            ..Default::default()
        }
    }

    /// Launch hard and take the platforms away until the run ends
    fn play_until_game_over(session: &mut GameSession) -> FailureReason {
        session.start();
        assert!(session.press());
        for _ in 0..20 {
            session.tick();
        }
        assert!(session.release());
        for _ in 0..600 {
            session.state.platforms.clear();
            if let Some(reason) = session.tick().failure {
                return reason;
            }
        }
        panic!("run never ended");
    }

    #[test]
    fn test_new_session_loads_defaults() {
        let env = HeadlessEnvironment::new(1).with_languages(&["fr-FR", "en-GB"]);
        let session = session_on(&env);

        assert!(session.player_id().starts_with("player_"));
        assert_eq!(session.nickname(), profile::DEFAULT_NICKNAME);
        assert_eq!(session.language(), Language::EnUs);
        assert!(session.leaderboard().is_empty());
        assert!(!session.is_running());
        assert!(env.primary().raw(keys::PLAYER_ID).is_some());

        // Same player on the next visit
        let again = session_on(&env);
        assert_eq!(again.player_id(), session.player_id());
    }

    #[test]
    fn test_requested_language_wins() {
        let env = HeadlessEnvironment::new(1)
            .with_languages(&["en-US"])
            .with_requested_language("ja-JP");
        let mut session = session_on(&env);
        assert_eq!(session.language(), Language::JaJp);
        assert_eq!(session.translate("game.start"), "ゲーム開始");
        assert!(session.set_language("ko-KR"));
        assert_eq!(session.language(), Language::KoKr);
        assert!(env.primary().raw(keys::LANGUAGE).unwrap().contains("ko-KR"));
        assert!(!session.set_language("xx"));
    }

    #[test]
    fn test_tuned_generator_ranges_apply() {
        let env = HeadlessEnvironment::new(14);
        let mut store = DualStore::new(env.primary_store(), env.backup_store(), Rc::new(|| 1.0));
        store.set(
            Tuning::STORAGE_KEY,
            r#"{ "generator": { "min_spacing": 300.0, "max_spacing": 320.0, "moving_chance": 0.0 } }"#,
        );

        let mut session = session_on(&env);
        assert_eq!(session.tuning().generator.min_spacing, 300.0);
        session.start();

        let platforms = &session.state().platforms;
        assert_eq!(platforms.len(), 5);
        // The first two are the fixed opening pair
        for pair in platforms[1..].windows(2) {
            let gap = pair[1].pos.x - pair[0].right();
            assert!(gap >= 300.0 - 1e-3, "gap {gap}");
        }
    }

    #[test]
    fn test_start_and_stop() {
        let env = HeadlessEnvironment::new(2);
        let mut session = session_on(&env);
        // Input is ignored before a run starts
        assert!(!session.press());

        session.start();
        assert!(session.is_running());
        assert_eq!(session.state().platforms.len(), 5);

        session.tick();
        let ticks = session.state().time_ticks;
        session.stop();
        session.tick();
        assert_eq!(session.state().time_ticks, ticks);
        assert_eq!(session.event_log().count(events::SESSION_STARTED), 1);
    }

    #[test]
    fn test_game_over_updates_save() {
        let env = HeadlessEnvironment::new(4);
        let mut session = session_on(&env);
        let reason = play_until_game_over(&mut session);

        assert!(!session.is_running());
        let summary = session.last_game_over().unwrap();
        assert_eq!(summary.reason, reason);
        assert_eq!(summary.score, 0);
        assert_eq!(summary.beat_percentage, 100);
        assert!(!summary.record.prompt_nickname);
        assert_eq!(session.game_save().game_count, 1);
        assert_eq!(session.event_log().count(events::GAME_OVER), 1);

        // Persisted for the next session
        assert_eq!(session_on(&env).game_save().game_count, 1);

        // Missed jump is measured against the nearest platform
        let telemetry = session.submission_telemetry();
        assert_eq!(telemetry.player_position, session.state().character.bottom_center());

        session.reset();
        assert!(session.is_running());
        assert!(session.last_game_over().is_none());
    }

    #[test]
    fn test_clean_submission_is_ranked() {
        let env = HeadlessEnvironment::new(5);
        let mut session = session_on(&env);

        let result = block_on(session.submit_score(120, clean_telemetry())).unwrap();
        assert!(result.success);
        assert_eq!(result.score, 120);
        assert!(!result.anti_cheat.is_cheating);
        assert!(result.validation.is_none());
        assert_eq!(result.warning, None);
        assert!(result.storage_health.overall);
        assert_ne!(result.judgment.label, JudgmentLabel::Miss);

        assert_eq!(session.leaderboard().entries()[0].name, profile::DEFAULT_NICKNAME);
        assert_eq!(session.leaderboard().top_score(), Some(120));
        assert_eq!(session.personal_best().score, 120);
        assert_eq!(session.monitor().baseline(session.player_id()).unwrap().games_played, 1);
        assert_eq!(session.event_log().count(events::SCORE_SUBMITTED), 1);

        // Baseline survives into the next session
        let next = session_on(&env);
        assert_eq!(next.monitor().baseline(next.player_id()).unwrap().games_played, 1);
        assert_eq!(next.leaderboard().top_score(), Some(120));
    }

    #[test]
    fn test_flagged_but_valid_submission() {
        let env = HeadlessEnvironment::new(6);
        let mut session = session_on(&env);
        let telemetry = JumpTelemetry {
            reaction_time_ms: 120.0,
            ..clean_telemetry()
        };

        let result = block_on(session.submit_score(80, telemetry)).unwrap();
        assert!(result.success);
        assert_eq!(result.anti_cheat.risk_level, RiskLevel::Medium);
        assert!(result.validation.as_ref().unwrap().is_valid);
        assert_eq!(result.warning, Some(SubmissionWarning::ValidatedButMonitored));
        assert_eq!(session.leaderboard().top_score(), Some(80));
        assert_eq!(session.event_log().count(events::SUSPICIOUS_SCORE), 1);
        assert_eq!(session.event_log().count(events::VIOLATION_RECORDED), 1);
    }

    #[test]
    fn test_critical_submission_is_rejected() {
        let env = HeadlessEnvironment::new(7);
        let mut session = session_on(&env);
        let telemetry = JumpTelemetry {
            position_delta: 500.0,
            ..clean_telemetry()
        };

        let err = block_on(session.submit_score(20_000, telemetry)).unwrap_err();
        match err {
            SubmissionError::ScoreRejected { anti_cheat, validation } => {
                assert_eq!(anti_cheat.risk_level, RiskLevel::Critical);
                assert!(!validation.is_valid);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.leaderboard().is_empty());
        assert_eq!(session.personal_best().score, 0);
        assert_eq!(session.monitor().suspicious_records(session.player_id()).len(), 1);
        // Rejected runs still feed the baseline
        assert_eq!(session.monitor().baseline(session.player_id()).unwrap().games_played, 1);

        // Play is not blocked
        session.start();
        assert!(session.is_running());
    }

    #[test]
    fn test_baseline_rejects_outlier() {
        let env = HeadlessEnvironment::new(8);
        let mut session = session_on(&env);
        for _ in 0..5 {
            block_on(session.submit_score(100, clean_telemetry())).unwrap();
        }
        // Flagged (medium) and far above a zero-variance history
        let telemetry = JumpTelemetry {
            reaction_time_ms: 100.0,
            ..clean_telemetry()
        };
        let err = block_on(session.submit_score(5000, telemetry)).unwrap_err();
        assert!(matches!(err, SubmissionError::ScoreRejected { .. }));
        assert_eq!(session.leaderboard().top_score(), Some(100));
    }

    #[test]
    fn test_cancelled_settle_falls_back_locally() {
        let env = HeadlessEnvironment::new(9);
        let mut session = session_on(&env);

        let handle = session.submission_abort_handle();
        handle.abort();
        let result = block_on(session.submit_score(60, clean_telemetry())).unwrap();
        assert_eq!(result.warning, Some(SubmissionWarning::LocalOnly));
        assert!(result.success);
        assert_eq!(session.leaderboard().top_score(), Some(60));

        // A flagged run is not ranked on the local path
        session.submission_abort_handle().abort();
        let telemetry = JumpTelemetry {
            reaction_time_ms: 50.0,
            ..clean_telemetry()
        };
        let result = block_on(session.submit_score(90, telemetry)).unwrap();
        assert!(!result.success);
        assert_eq!(session.leaderboard().top_score(), Some(60));
    }

    #[test]
    fn test_split_submission_cancel() {
        let env = HeadlessEnvironment::new(10);
        let mut session = session_on(&env);
        let pending = session.prepare_submission(40, clean_telemetry());
        let handle = session.submission_abort_handle();
        let settle = session.settle_submission(pending);

        // The session is free while settling
        session.start();
        handle.abort();
        assert!(matches!(block_on(settle), Err(SubmissionError::Cancelled)));
        assert!(session.leaderboard().is_empty());
    }

    #[test]
    fn test_restart_aborts_pending_submission() {
        let env = HeadlessEnvironment::new(15);
        let mut session = session_on(&env);
        let pending = session.prepare_submission(45, clean_telemetry());
        let fallback = pending.clone();
        let handle = session.submission_abort_handle();
        let settle = session.settle_submission(pending);

        // Replay starts straight away and drops the outstanding check
        session.reset();
        handle.abort();
        let result = session.finish_submission(fallback, block_on(settle)).unwrap();

        assert!(session.is_running());
        assert!(result.success);
        assert_eq!(result.warning, Some(SubmissionWarning::LocalOnly));
        assert_eq!(session.leaderboard().top_score(), Some(45));
    }

    #[test]
    fn test_storage_loss_degrades() {
        let env = HeadlessEnvironment::new(11);
        let mut session = session_on(&env);
        env.primary().set_failing(true);
        env.backup().set_failing(true);

        let result = block_on(session.submit_score(70, clean_telemetry())).unwrap();
        assert!(!result.success);
        assert_eq!(result.warning, Some(SubmissionWarning::StorageUnavailable));
        // Still ranked for this session
        assert_eq!(session.leaderboard().top_score(), Some(70));
        assert!(!session.storage_health().overall);
    }

    #[test]
    fn test_nickname_flow() {
        let env = HeadlessEnvironment::new(12);
        let mut session = session_on(&env);

        assert_eq!(session.set_nickname("   "), Err(NicknameError::Empty));
        assert_eq!(session.nickname(), profile::DEFAULT_NICKNAME);
        assert!(!session.game_save().has_set_nickname);

        assert_eq!(session.set_nickname(" <b>Zed</b> "), Ok("Zed".to_string()));
        assert!(session.game_save().has_set_nickname);
        assert_eq!(session.event_log().count(events::NICKNAME_SET), 1);

        block_on(session.submit_score(30, clean_telemetry())).unwrap();
        assert_eq!(session.leaderboard().rank_of("Zed"), Some(1));
        assert_eq!(session_on(&env).nickname(), "Zed");
    }

    #[test]
    fn test_skin_selection_persists() {
        let env = HeadlessEnvironment::new(13);
        let mut session = session_on(&env);
        assert!(!session.select_skin(Skin::Cat));
        session.save.record_game(600);
        assert!(session.select_skin(Skin::Cat));
        assert_eq!(session_on(&env).game_save().current_skin, Skin::Cat);
    }
}
