//! Platform abstraction layer
//!
//! Everything the game needs from its host goes through `Environment`:
//! - Wall clock and entropy
//! - Primary and backup storage backends
//! - Language hints (URL parameter, browser preferences)
//! - Viewport size
//! - Timers for the asynchronous validation step
//!
//! The browser adapter is wasm-only; `HeadlessEnvironment` runs everywhere
//! and is what tests and the native binary use.

use std::cell::Cell;
use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};

use crate::Viewport;
use crate::persistence::{Clock, KeyValueStore, MemoryStore};

/// Host capabilities
pub trait Environment {
    /// Wall clock (ms since epoch)
    fn now_ms(&self) -> f64;
    fn primary_store(&self) -> Box<dyn KeyValueStore>;
    fn backup_store(&self) -> Box<dyn KeyValueStore>;
    /// Language requested explicitly (e.g. `?lang=` in the URL)
    fn requested_language(&self) -> Option<String>;
    /// Host language preferences, most preferred first
    fn preferred_languages(&self) -> Vec<String>;
    fn viewport(&self) -> crate::Viewport;
    /// Seed material for the run generator
    fn entropy(&self) -> u64;
    /// Future resolving after `ms` milliseconds. Never blocks the caller.
    fn delay(&self, ms: u32) -> LocalBoxFuture<'static, ()>;
}

/// Clock closure backed by an environment
pub fn clock_of(env: &Rc<dyn Environment>) -> Clock {
    let env = Rc::clone(env);
    Rc::new(move || env.now_ms())
}

/// In-memory host with a manual clock. Delays resolve immediately.
#[derive(Debug, Clone)]
pub struct HeadlessEnvironment {
    time: Rc<Cell<f64>>,
    seed: Rc<Cell<u64>>,
    primary: MemoryStore,
    backup: MemoryStore,
    requested_language: Option<String>,
    languages: Vec<String>,
    viewport: Viewport,
}

impl Default for HeadlessEnvironment {
    fn default() -> Self {
        Self::new(0)
    }
}

impl HeadlessEnvironment {
    pub fn new(seed: u64) -> Self {
        Self {
            time: Rc::new(Cell::new(1_700_000_000_000.0)),
            seed: Rc::new(Cell::new(seed)),
            primary: MemoryStore::new(),
            backup: MemoryStore::new(),
            requested_language: None,
            languages: Vec::new(),
            viewport: Viewport::default(),
        }
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_requested_language(mut self, language: &str) -> Self {
        self.requested_language = Some(language.to_string());
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Move the wall clock forward
    pub fn advance(&self, ms: f64) {
        self.time.set(self.time.get() + ms);
    }

    pub fn set_time(&self, ms: f64) {
        self.time.set(ms);
    }

    /// Shared handle to the primary backend
    pub fn primary(&self) -> &MemoryStore {
        &self.primary
    }

    /// Shared handle to the backup backend
    pub fn backup(&self) -> &MemoryStore {
        &self.backup
    }
}

impl Environment for HeadlessEnvironment {
    fn now_ms(&self) -> f64 {
        self.time.get()
    }

    fn primary_store(&self) -> Box<dyn KeyValueStore> {
        Box::new(self.primary.clone())
    }

    fn backup_store(&self) -> Box<dyn KeyValueStore> {
        Box::new(self.backup.clone())
    }

    fn requested_language(&self) -> Option<String> {
        self.requested_language.clone()
    }

    fn preferred_languages(&self) -> Vec<String> {
        self.languages.clone()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn entropy(&self) -> u64 {
        // splitmix64 step so consecutive runs get distinct seeds
        let next = self.seed.get().wrapping_add(0x9E37_79B9_7F4A_7C15);
        self.seed.set(next);
        let mut z = next;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn delay(&self, _ms: u32) -> LocalBoxFuture<'static, ()> {
        Box::pin(future::ready(()))
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserEnvironment;

#[cfg(target_arch = "wasm32")]
mod browser {
    use futures::future::LocalBoxFuture;
    use wasm_bindgen::JsValue;

    use super::Environment;
    use crate::Viewport;
    use crate::persistence::web::WebStore;
    use crate::persistence::{KeyValueStore, MemoryStore};

    /// Browser host: `localStorage` primary, `sessionStorage` backup
    #[derive(Debug, Default, Clone)]
    pub struct BrowserEnvironment;

    impl Environment for BrowserEnvironment {
        fn now_ms(&self) -> f64 {
            js_sys::Date::now()
        }

        fn primary_store(&self) -> Box<dyn KeyValueStore> {
            match WebStore::local() {
                Some(store) => Box::new(store),
                None => {
                    log::warn!("localStorage unavailable, using memory store");
                    Box::new(MemoryStore::new())
                }
            }
        }

        fn backup_store(&self) -> Box<dyn KeyValueStore> {
            match WebStore::session() {
                Some(store) => Box::new(store),
                None => {
                    log::warn!("sessionStorage unavailable, using memory store");
                    Box::new(MemoryStore::new())
                }
            }
        }

        fn requested_language(&self) -> Option<String> {
            let search = web_sys::window()?.location().search().ok()?;
            search
                .trim_start_matches('?')
                .split('&')
                .find_map(|pair| pair.strip_prefix("lang="))
                .filter(|lang| !lang.is_empty())
                .map(str::to_string)
        }

        fn preferred_languages(&self) -> Vec<String> {
            let Some(window) = web_sys::window() else {
                return Vec::new();
            };
            let navigator = window.navigator();
            let mut languages: Vec<String> = navigator
                .languages()
                .iter()
                .filter_map(|value| value.as_string())
                .collect();
            if let Some(language) = navigator.language() {
                languages.push(language);
            }
            languages
        }

        fn viewport(&self) -> Viewport {
            let Some(window) = web_sys::window() else {
                return Viewport::default();
            };
            let width = window.inner_width().ok().and_then(|v| v.as_f64());
            let height = window.inner_height().ok().and_then(|v| v.as_f64());
            match (width, height) {
                (Some(width), Some(height)) => Viewport {
                    width: width as f32,
                    height: height as f32,
                },
                _ => Viewport::default(),
            }
        }

        fn entropy(&self) -> u64 {
            let random = (js_sys::Math::random() * u32::MAX as f64) as u64;
            (js_sys::Date::now() as u64) ^ (random << 32)
        }

        fn delay(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
            let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                let scheduled = web_sys::window().and_then(|w| {
                    w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32)
                        .ok()
                });
                if scheduled.is_none() {
                    let _ = resolve.call0(&JsValue::NULL);
                }
            });
            Box::pin(async move {
                let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
            })
        }
    }
}
