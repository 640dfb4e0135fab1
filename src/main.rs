//! SkyHop entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use futures::future::AbortHandle;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlInputElement, KeyboardEvent, MouseEvent, TouchEvent};

    use skyhop::consts::FRAME_MS;
    use skyhop::platform::{BrowserEnvironment, Environment};
    use skyhop::sim::generator::PlatformGenerator;
    use skyhop::{AntiCheatMonitor, GameSession, PrecisionJudge, SubmissionError, SubmissionWarning};

    /// Catch-up ticks allowed per animation frame
    const MAX_SUBSTEPS: u32 = 4;

    /// Game instance holding the session and loop bookkeeping
    struct Game {
        session: GameSession,
        accumulator: f64,
        last_time: f64,
        /// Stops the animation loop for good
        halted: bool,
        /// Cancels the score check still in flight
        pending_submission: Option<AbortHandle>,
    }

    impl Game {
        fn new(env: Rc<dyn Environment>) -> Self {
            let generator = PlatformGenerator::new(env.entropy(), Default::default());
            let session = GameSession::new(env, generator, PrecisionJudge::new(), AntiCheatMonitor::new());
            Self {
                session,
                accumulator: 0.0,
                last_time: 0.0,
                halted: false,
                pending_submission: None,
            }
        }

        /// Run simulation ticks. Returns true when the run just ended.
        fn update(&mut self, dt_ms: f64) -> bool {
            self.accumulator += dt_ms.min(100.0);

            let mut substeps = 0;
            let mut ended = false;
            while self.accumulator >= FRAME_MS && substeps < MAX_SUBSTEPS {
                let was_running = self.session.is_running();
                self.session.tick();
                ended |= was_running && !self.session.is_running();
                self.accumulator -= FRAME_MS;
                substeps += 1;
            }
            ended
        }

        /// Update HUD elements in DOM
        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let state = self.session.state();

            if let Some(el) = document.query_selector("#hud-score .hud-value").ok().flatten() {
                el.set_text_content(Some(&state.score.to_string()));
            }
            if let Some(el) = document.query_selector("#hud-combo .hud-value").ok().flatten() {
                el.set_text_content(Some(&format!("x{}", state.combo)));
            }
            if let Some(el) = document.get_element_by_id("power-bar") {
                let percent = state.charge.power / self.session.tuning().max_charge * 100.0;
                let _ = el.set_attribute("style", &format!("width: {percent:.0}%"));
            }
            if let Some(el) = document.get_element_by_id("character") {
                let pos = state.character.pos;
                let _ = el.set_attribute("style", &format!("transform: translate({:.1}px, {:.1}px)", pos.x, pos.y));
            }

            if let Some(el) = document.get_element_by_id("game-over") {
                match self.session.last_game_over() {
                    Some(summary) => {
                        let _ = el.set_attribute("class", "");
                        if let Some(score_el) = document.get_element_by_id("final-score") {
                            score_el.set_text_content(Some(&summary.score.to_string()));
                        }
                        if let Some(beat_el) = document.get_element_by_id("beat-percentage") {
                            beat_el.set_text_content(Some(&format!("{}%", summary.beat_percentage)));
                        }
                        if let Some(modal) = document.get_element_by_id("nickname-modal") {
                            let class = if summary.record.prompt_nickname { "" } else { "hidden" };
                            let _ = modal.set_attribute("class", class);
                        }
                    }
                    None => {
                        let _ = el.set_attribute("class", "hidden");
                    }
                }
            }
        }
    }

    fn set_text(id: &str, text: &str) {
        if let Some(el) = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(id))
        {
            el.set_text_content(Some(text));
        }
    }

    /// Validate the run without holding the game borrow across the wait
    fn submit_score(game: Rc<RefCell<Game>>) {
        let (fallback, settle) = {
            let mut g = game.borrow_mut();
            let score = g.session.state().score;
            let telemetry = g.session.submission_telemetry();
            let pending = g.session.prepare_submission(score, telemetry);
            let fallback = pending.clone();
            let handle = g.session.submission_abort_handle();
            g.pending_submission = Some(handle);
            (fallback, g.session.settle_submission(pending))
        };

        wasm_bindgen_futures::spawn_local(async move {
            let settled = settle.await;
            let mut g = game.borrow_mut();
            g.pending_submission = None;
            let key = match g.session.finish_submission(fallback, settled) {
                Ok(result) if result.success => "game.scoreValidated",
                Ok(result) if result.warning == Some(SubmissionWarning::LocalOnly) => "game.suspiciousScore",
                Ok(_) => "game.storageWarning",
                Err(SubmissionError::ScoreRejected { .. }) => "game.scoreRejected",
                Err(e) => {
                    log::warn!("Submission failed: {e}");
                    "game.storageError"
                }
            };
            set_text("submission-status", g.session.translate(key));
        });
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("SkyHop starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let env: Rc<dyn Environment> = Rc::new(BrowserEnvironment);
        let game = Rc::new(RefCell::new(Game::new(env)));
        {
            let mut g = game.borrow_mut();
            g.session.start();
            set_text("title", g.session.translate("game.title"));
            log::info!("Player {} ({})", g.session.nickname(), g.session.language().code());
        }

        setup_input_handlers(game.clone());
        setup_buttons(game.clone());
        setup_page_hide(game.clone());

        request_animation_frame(game);

        log::info!("SkyHop running!");
    }

    fn setup_input_handlers(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        // Keyboard: hold space to charge
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if event.key() == " " && !event.repeat() {
                    event.prevent_default();
                    game.borrow_mut().session.press();
                }
            });
            let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if event.key() == " " {
                    game.borrow_mut().session.release();
                }
            });
            let _ = window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().session.press();
            });
            let _ = document.add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().session.release();
            });
            let _ = document.add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                game.borrow_mut().session.press();
            });
            let _ = document.add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                game.borrow_mut().session.release();
            });
            let _ = document.add_event_listener_with_callback("touchend", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_buttons(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        if let Some(btn) = document.get_element_by_id("restart-btn") {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut g = game.borrow_mut();
                // Replay never waits on the score check
                if let Some(handle) = g.pending_submission.take() {
                    handle.abort();
                }
                g.session.reset();
                set_text("submission-status", "");
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(btn) = document.get_element_by_id("nickname-save-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let Some(input) = web_sys::window()
                    .and_then(|w| w.document())
                    .and_then(|d| d.get_element_by_id("nickname-input"))
                    .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
                else {
                    return;
                };
                let mut g = game.borrow_mut();
                match g.session.set_nickname(&input.value()) {
                    Ok(name) => {
                        log::info!("Nickname set: {name}");
                        set_text("nickname-error", "");
                    }
                    Err(e) => set_text("nickname-error", &e.to_string()),
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_page_hide(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let mut g = game.borrow_mut();
            g.session.stop();
            g.halted = true;
            log::info!("Loop halted (page hidden)");
        });
        let _ = window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        let ended = {
            let mut g = game.borrow_mut();
            if g.halted {
                return;
            }
            let dt = if g.last_time > 0.0 { time - g.last_time } else { FRAME_MS };
            g.last_time = time;

            let ended = g.update(dt);
            g.update_hud();
            ended
        };

        if ended {
            submit_score(game.clone());
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("SkyHop (native) starting...");
    log::info!("Native mode runs a headless autoplay demo - serve the wasm build for the playable version");

    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(42);
    autoplay(seed);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Play one run with a bot that releases once the preview lands on the next
/// platform, then submit the score.
#[cfg(not(target_arch = "wasm32"))]
fn autoplay(seed: u64) {
    use std::rc::Rc;

    use skyhop::platform::{Environment, HeadlessEnvironment};
    use skyhop::sim::generator::PlatformGenerator;
    use skyhop::{AntiCheatMonitor, GameSession, PrecisionJudge};

    const MAX_TICKS: u32 = 20_000;

    let headless = HeadlessEnvironment::new(seed);
    let env: Rc<dyn Environment> = Rc::new(headless.clone());
    let generator = PlatformGenerator::new(seed, Default::default());
    let mut session = GameSession::new(env, generator, PrecisionJudge::new(), AntiCheatMonitor::new());
    let frame_ms = session.tuning().frame_ms;

    session.start();
    for _ in 0..MAX_TICKS {
        let state = session.state();
        if !state.character.is_jumping() {
            if !state.charge.charging {
                session.press();
            } else {
                let standing_on = state.character.attached_platform();
                let on_target = state.preview.as_ref().and_then(|p| p.hit).is_some_and(|hit| {
                    Some(hit.platform_id) != standing_on && hit.accuracy >= 0.7
                });
                if on_target || state.charge.power >= session.tuning().max_charge {
                    session.release();
                }
            }
        }

        let events = session.tick();
        headless.advance(frame_ms);
        if let Some(landing) = events.landing {
            println!(
                "  landed on #{} (+{}{})",
                landing.platform_id,
                landing.points,
                if landing.perfect { ", perfect" } else { "" }
            );
        }
        if !session.is_running() {
            break;
        }
    }
    session.stop();

    let state = session.state();
    println!(
        "\nRun over after {} ticks: score {}, {} perfect, max combo x{}",
        state.time_ticks, state.score, state.perfect_count, state.max_combo
    );
    if let Some(summary) = session.last_game_over() {
        println!("Reason: {}", summary.reason.as_str());
    }

    let score = session.state().score;
    let telemetry = session.submission_telemetry();
    match futures::executor::block_on(session.submit_score(score, telemetry)) {
        Ok(result) => println!(
            "Submitted: judgment {} ({:.2}), risk {}",
            result.judgment.label.as_str(),
            result.judgment.composite_score,
            result.anti_cheat.risk_level.as_str()
        ),
        Err(e) => println!("Submission rejected: {e}"),
    }
}
