//! Local leaderboard
//!
//! One entry per player name, best score kept, top 50 sorted descending.
//! Persisted as a JSON array through the dual store.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::persistence::{DualStore, WriteOutcome, keys};

/// Maximum number of ranking entries to keep
pub const MAX_RANKING_ENTRIES: usize = 50;

/// A single ranking entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Player display name
    pub name: String,
    pub score: u64,
    /// Unix timestamp (ms) the score was achieved
    pub date: f64,
}

/// What a submission did to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingUpdate {
    /// New name added at this rank (1-indexed)
    Inserted(usize),
    /// Existing entry raised to this rank
    Improved(usize),
    /// Existing entry already at least as good
    Unchanged,
    /// Did not make the cut
    Dropped,
}

/// Leaderboard sorted by descending score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<RankingEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary entries, restoring the board invariants
    pub fn from_entries(entries: Vec<RankingEntry>) -> Self {
        let mut board = Self::new();
        for entry in entries {
            board.submit(&entry.name, entry.score, entry.date);
        }
        board
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    /// 1-indexed rank of a player, if listed
    pub fn rank_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name).map(|i| i + 1)
    }

    /// Record a score for `name`. A lower or equal score for a listed name
    /// leaves the board untouched, date included.
    pub fn submit(&mut self, name: &str, score: u64, now_ms: f64) -> RankingUpdate {
        let improved = match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) if score <= existing.score => return RankingUpdate::Unchanged,
            Some(existing) => {
                existing.score = score;
                existing.date = now_ms;
                true
            }
            None => {
                self.entries.push(RankingEntry {
                    name: name.to_string(),
                    score,
                    date: now_ms,
                });
                false
            }
        };

        // Stable sort keeps earlier entries ahead on ties
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.entries.truncate(MAX_RANKING_ENTRIES);

        match (self.rank_of(name), improved) {
            (Some(rank), true) => RankingUpdate::Improved(rank),
            (Some(rank), false) => RankingUpdate::Inserted(rank),
            (None, _) => RankingUpdate::Dropped,
        }
    }

    /// Share of listed entries the score ties or beats, as a rounded
    /// percentage. An empty board counts as fully beaten.
    pub fn beat_percentage(&self, score: u64) -> u32 {
        if self.entries.is_empty() {
            return 100;
        }
        let better = self.entries.iter().filter(|e| e.score > score).count();
        let share = 1.0 - better as f64 / self.entries.len() as f64;
        (share * 100.0).round() as u32
    }

    /// Load the ranking, starting fresh when nothing readable is stored
    pub fn load(store: &mut DualStore) -> Self {
        match store.get_json::<Vec<RankingEntry>>(keys::RANKING) {
            Some(entries) => {
                log::info!("Loaded {} ranking entries", entries.len());
                Self::from_entries(entries)
            }
            None => {
                log::info!("No ranking found, starting fresh");
                Self::new()
            }
        }
    }

    pub fn save(&self, store: &mut DualStore) -> Result<WriteOutcome, StorageError> {
        let outcome = store.set_json(keys::RANKING, &self.entries)?;
        log::info!("Ranking saved ({} entries)", self.entries.len());
        Ok(outcome)
    }
}
