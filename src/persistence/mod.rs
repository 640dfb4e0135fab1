//! Key-value persistence with dual-backend redundancy
//!
//! Features:
//! - `KeyValueStore` contract implemented by an in-memory map and, on wasm,
//!   by browser `localStorage`/`sessionStorage`
//! - Timestamped JSON envelope written to both backends
//! - Newest-wins reads with automatic resync of diverged copies
//! - Health probing; nothing fails while either backend still works

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Storage keys
pub mod keys {
    pub const PLAYER_ID: &str = "skyhop_player_id";
    pub const SAVE: &str = "skyhop_save";
    pub const RANKING: &str = "skyhop_ranking";
    pub const PLAYER_NAME: &str = "skyhop_player_name";
    pub const LANGUAGE: &str = "skyhop_language";

    pub fn personal_best(player_id: &str) -> String {
        format!("skyhop_personal_best_{player_id}")
    }

    pub fn baseline(player_id: &str) -> String {
        format!("skyhop_baseline_{player_id}")
    }
}

/// A string key-value backend
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// In-memory store. Clones share the same map, so a test can keep a handle
/// and inspect or sabotage what the game wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Rc<RefCell<BTreeMap<String, String>>>,
    failing: Rc<Cell<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail until turned off again
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    /// Raw stored value, bypassing the failure switch
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.borrow().get(key).cloned()
    }

    /// Overwrite a raw value, bypassing the failure switch
    pub fn put_raw(&self, key: &str, value: &str) {
        self.data.borrow_mut().insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.get() {
            Err(StorageError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.data.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.data.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.data.borrow_mut().remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.check()?;
        self.data.borrow_mut().clear();
        Ok(())
    }
}

/// Current envelope format
pub const ENVELOPE_VERSION: u32 = 1;

/// What actually gets written to each backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub value: String,
    /// Write time (ms since epoch)
    pub timestamp: f64,
    pub version: u32,
}

/// Result of a redundant write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub primary: bool,
    pub backup: bool,
}

/// Backend availability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageHealth {
    pub primary: bool,
    pub backup: bool,
    pub overall: bool,
    pub last_check_ms: f64,
}

/// Shared wall clock (ms since epoch)
pub type Clock = Rc<dyn Fn() -> f64>;

const HEALTH_PROBE_KEY: &str = "__health_check__";

/// Redundant store writing every value to two backends
pub struct DualStore {
    primary: Box<dyn KeyValueStore>,
    backup: Box<dyn KeyValueStore>,
    clock: Clock,
    health: StorageHealth,
}

impl std::fmt::Debug for DualStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualStore").field("health", &self.health).finish()
    }
}

impl DualStore {
    pub fn new(primary: Box<dyn KeyValueStore>, backup: Box<dyn KeyValueStore>, clock: Clock) -> Self {
        Self {
            primary,
            backup,
            clock,
            health: StorageHealth {
                primary: true,
                backup: true,
                overall: true,
                last_check_ms: 0.0,
            },
        }
    }

    /// Two fresh in-memory backends
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()), clock)
    }

    fn encode(&self, value: &str) -> Result<String, StorageError> {
        let envelope = Envelope {
            value: value.to_string(),
            timestamp: (self.clock)(),
            version: ENVELOPE_VERSION,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Write to both backends. Succeeds if either accepted the value.
    pub fn set(&mut self, key: &str, value: &str) -> WriteOutcome {
        let encoded = match self.encode(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Failed to encode {key}: {e}");
                return WriteOutcome {
                    success: false,
                    primary: false,
                    backup: false,
                };
            }
        };

        let primary = match self.primary.set(key, &encoded) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Primary storage write failed for {key}: {e}");
                false
            }
        };
        let backup = match self.backup.set(key, &encoded) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Backup storage write failed for {key}: {e}");
                false
            }
        };

        if primary && backup {
            self.health.primary = true;
            self.health.backup = true;
            self.health.overall = true;
        } else {
            // Only a failed write triggers a full health check
            self.check_health();
        }
        WriteOutcome {
            success: primary || backup,
            primary,
            backup,
        }
    }

    fn read_envelope(store: &dyn KeyValueStore, key: &str, label: &str) -> Result<Option<Envelope>, StorageError> {
        let Some(raw) = store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Envelope>(&raw) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                log::warn!("Discarding malformed {label} entry for {key}: {e}");
                Ok(None)
            }
        }
    }

    /// Read the newest copy, resyncing the backends when they disagree
    pub fn get(&mut self, key: &str) -> Option<String> {
        let primary = Self::read_envelope(self.primary.as_ref(), key, "primary").unwrap_or_else(|e| {
            log::warn!("Primary storage read failed for {key}: {e}");
            self.health.primary = false;
            None
        });
        let backup = Self::read_envelope(self.backup.as_ref(), key, "backup").unwrap_or_else(|e| {
            log::warn!("Backup storage read failed for {key}: {e}");
            self.health.backup = false;
            None
        });
        self.health.overall = self.health.primary || self.health.backup;

        let (winner, needs_sync) = match (primary, backup) {
            (None, None) => return None,
            (Some(p), None) => (p, true),
            (None, Some(b)) => (b, true),
            (Some(p), Some(b)) => {
                if p.timestamp >= b.timestamp {
                    let diverged = p.timestamp > b.timestamp;
                    (p, diverged)
                } else {
                    (b, true)
                }
            }
        };

        if needs_sync {
            self.resync(key, &winner);
        }
        Some(winner.value)
    }

    fn resync(&mut self, key: &str, envelope: &Envelope) {
        let encoded = match serde_json::to_string(envelope) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Resync of {key} failed: {e}");
                return;
            }
        };
        log::debug!("Resyncing diverged key {key}");
        if let Err(e) = self.primary.set(key, &encoded) {
            log::warn!("Resync of {key} to primary failed: {e}");
        }
        if let Err(e) = self.backup.set(key, &encoded) {
            log::warn!("Resync of {key} to backup failed: {e}");
        }
    }

    /// Remove from both backends
    pub fn remove(&mut self, key: &str) -> bool {
        let primary = self.primary.remove(key);
        let backup = self.backup.remove(key);
        match (primary, backup) {
            (Ok(()), Ok(())) => true,
            (p, b) => {
                for e in [p.err(), b.err()].into_iter().flatten() {
                    log::warn!("Remove of {key} failed: {e}");
                }
                false
            }
        }
    }

    /// Wipe both backends
    pub fn clear(&mut self) -> bool {
        let primary = self.primary.clear();
        let backup = self.backup.clear();
        match (primary, backup) {
            (Ok(()), Ok(())) => true,
            (p, b) => {
                for e in [p.err(), b.err()].into_iter().flatten() {
                    log::warn!("Clear storage failed: {e}");
                }
                false
            }
        }
    }

    /// Read and deserialize a JSON value; malformed values read as missing
    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring unreadable value for {key}: {e}");
                None
            }
        }
    }

    /// Serialize and store a JSON value
    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<WriteOutcome, StorageError> {
        let json = serde_json::to_string(value)?;
        let outcome = self.set(key, &json);
        if outcome.success {
            Ok(outcome)
        } else {
            Err(StorageError::Unavailable)
        }
    }

    /// Probe both backends with a throwaway write
    pub fn check_health(&mut self) -> StorageHealth {
        fn probe(store: &mut dyn KeyValueStore) -> bool {
            store.set(HEALTH_PROBE_KEY, "ok").and_then(|()| store.remove(HEALTH_PROBE_KEY)).is_ok()
        }
        self.health.primary = probe(self.primary.as_mut());
        self.health.backup = probe(self.backup.as_mut());
        self.health.overall = self.health.primary || self.health.backup;
        self.health.last_check_ms = (self.clock)();
        self.health
    }

    /// Last known health
    pub fn health(&self) -> StorageHealth {
        self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clocked() -> (Rc<Cell<f64>>, Clock) {
        let time = Rc::new(Cell::new(1000.0));
        let handle = time.clone();
        (time, Rc::new(move || handle.get()))
    }

    fn pair() -> (MemoryStore, MemoryStore, Rc<Cell<f64>>, DualStore) {
        let primary = MemoryStore::new();
        let backup = MemoryStore::new();
        let (time, clock) = clocked();
        let store = DualStore::new(Box::new(primary.clone()), Box::new(backup.clone()), clock);
        (primary, backup, time, store)
    }

    #[test]
    fn test_round_trip_writes_both() {
        let (primary, backup, _, mut store) = pair();
        let outcome = store.set("k", "v");
        assert!(outcome.success && outcome.primary && outcome.backup);
        assert_eq!(store.get("k").as_deref(), Some("v"));

        let envelope: Envelope = serde_json::from_str(&primary.raw("k").unwrap()).unwrap();
        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert_eq!(envelope.timestamp, 1000.0);
        assert_eq!(primary.raw("k"), backup.raw("k"));
    }

    #[test]
    fn test_survives_one_failed_backend() {
        let (primary, backup, _, mut store) = pair();
        primary.set_failing(true);
        let outcome = store.set("k", "v");
        assert!(outcome.success);
        assert!(!outcome.primary);
        assert!(!store.health().primary);
        assert!(store.health().overall);
        assert_eq!(store.get("k").as_deref(), Some("v"));

        backup.set_failing(true);
        assert!(!store.set("k", "w").success);
        assert!(!store.health().overall);
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_newest_wins_and_resyncs() {
        let (primary, backup, time, mut store) = pair();
        store.set("k", "old");

        // Backup gets a newer value behind the store's back
        time.set(2000.0);
        let newer = Envelope {
            value: "new".into(),
            timestamp: 2000.0,
            version: ENVELOPE_VERSION,
        };
        backup.put_raw("k", &serde_json::to_string(&newer).unwrap());

        assert_eq!(store.get("k").as_deref(), Some("new"));
        assert_eq!(primary.raw("k"), backup.raw("k"));
    }

    #[test]
    fn test_missing_copy_is_restored() {
        let (primary, backup, _, mut store) = pair();
        store.set("k", "v");
        // Drop the primary copy behind the store's back
        primary.clone().remove("k").unwrap();
        assert!(primary.raw("k").is_none());

        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(primary.raw("k"), backup.raw("k"));
    }

    #[test]
    fn test_malformed_entry_is_ignored() {
        let (primary, _, _, mut store) = pair();
        store.set("k", "v");
        primary.put_raw("k", "{not json");
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_json_helpers() {
        let (_, _, _, mut store) = pair();
        store.set_json("nums", &vec![1, 2, 3]).unwrap();
        assert_eq!(store.get_json::<Vec<i32>>("nums"), Some(vec![1, 2, 3]));
        store.set("bad", "oops");
        assert_eq!(store.get_json::<Vec<i32>>("bad"), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let (primary, backup, _, mut store) = pair();
        store.set("a", "1");
        store.set("b", "2");
        assert!(store.remove("a"));
        assert_eq!(store.get("a"), None);
        assert!(store.clear());
        assert!(primary.is_empty() && backup.is_empty());
    }

    #[test]
    fn test_health_check_runs_only_after_failed_write() {
        let (primary, _, time, mut store) = pair();
        time.set(3000.0);
        assert!(store.set("k", "v").success);
        assert_eq!(store.health().last_check_ms, 0.0);

        time.set(4000.0);
        primary.set_failing(true);
        store.set("k", "w");
        assert_eq!(store.health().last_check_ms, 4000.0);
        assert!(!store.health().primary);

        // Recovery shows up on the next clean write without a health check
        time.set(6000.0);
        primary.set_failing(false);
        assert!(store.set("k", "x").primary);
        assert!(store.health().primary);
        assert_eq!(store.health().last_check_ms, 4000.0);
    }

    #[test]
    fn test_health_probe_leaves_no_trace() {
        let (primary, _, time, mut store) = pair();
        time.set(5000.0);
        let health = store.check_health();
        assert!(health.primary && health.backup && health.overall);
        assert_eq!(health.last_check_ms, 5000.0);
        assert!(primary.raw(HEALTH_PROBE_KEY).is_none());
    }
}
