//! Browser storage backends (wasm only)

use super::KeyValueStore;
use crate::error::StorageError;

/// `localStorage` or `sessionStorage`
#[derive(Debug, Clone)]
pub struct WebStore {
    storage: web_sys::Storage,
}

fn js_error(e: wasm_bindgen::JsValue) -> StorageError {
    StorageError::Backend(format!("{e:?}"))
}

impl WebStore {
    /// Persistent `localStorage`, if the browser allows it
    pub fn local() -> Option<Self> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .map(|storage| Self { storage })
    }

    /// Per-tab `sessionStorage`, used as the backup copy
    pub fn session() -> Option<Self> {
        web_sys::window()
            .and_then(|w| w.session_storage().ok())
            .flatten()
            .map(|storage| Self { storage })
    }
}

impl KeyValueStore for WebStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(js_error)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(js_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(js_error)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.clear().map_err(js_error)
    }
}
