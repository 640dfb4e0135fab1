//! Player profile: save blob, cosmetic skins, nickname and personal best
//!
//! Persisted through the dual store under the player-scoped keys.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{NicknameError, StorageError};
use crate::persistence::{DualStore, WriteOutcome, keys};

/// Name used on the leaderboard until the player picks one
pub const DEFAULT_NICKNAME: &str = "Anonymous";
/// Nickname length limit, in characters
pub const MAX_NICKNAME_CHARS: usize = 20;
/// A first game must beat this to trigger the nickname prompt
pub const NICKNAME_PROMPT_SCORE: u64 = 10;

const NICKNAME_SUGGESTIONS: [&str; 5] = [
    "Jump Master",
    "Block Boss",
    "Precision Pro",
    "Reaction Star",
    "Sky Hopper",
];

/// Cosmetic character skins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Skin {
    #[default]
    Default,
    Cat,
    Astronaut,
    Rainbow,
}

impl Skin {
    pub const ALL: [Skin; 4] = [Skin::Default, Skin::Cat, Skin::Astronaut, Skin::Rainbow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Skin::Default => "default",
            Skin::Cat => "cat",
            Skin::Astronaut => "astronaut",
            Skin::Rainbow => "rainbow",
        }
    }

    /// High score needed to unlock
    pub fn requirement(&self) -> u64 {
        match self {
            Skin::Default => 0,
            Skin::Cat => 500,
            Skin::Astronaut => 1000,
            Skin::Rainbow => 2000,
        }
    }
}

/// Stats of a finished run folded into the save
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameRecord {
    pub new_high_score: bool,
    /// Skins unlocked by this run
    pub unlocked: Vec<Skin>,
    /// The first-game nickname prompt should be shown now
    pub prompt_nickname: bool,
}

/// Persistent player save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSave {
    pub unlocked_skins: BTreeSet<Skin>,
    pub current_skin: Skin,
    pub high_score: u64,
    pub game_count: u32,
    pub is_first_game: bool,
    pub has_set_nickname: bool,
}

impl Default for GameSave {
    fn default() -> Self {
        Self {
            unlocked_skins: BTreeSet::from([Skin::Default]),
            current_skin: Skin::Default,
            high_score: 0,
            game_count: 0,
            is_first_game: true,
            has_set_nickname: false,
        }
    }
}

impl GameSave {
    pub fn is_unlocked(&self, skin: Skin) -> bool {
        self.unlocked_skins.contains(&skin)
    }

    /// Switch skin; locked skins are refused
    pub fn select_skin(&mut self, skin: Skin) -> bool {
        if !self.is_unlocked(skin) {
            return false;
        }
        self.current_skin = skin;
        true
    }

    /// Unlock every skin the high score qualifies for, returning the new ones
    pub fn unlock_skins(&mut self) -> Vec<Skin> {
        let mut unlocked = Vec::new();
        for skin in Skin::ALL {
            if self.high_score >= skin.requirement() && self.unlocked_skins.insert(skin) {
                log::info!("Unlocked skin: {}", skin.as_str());
                unlocked.push(skin);
            }
        }
        unlocked
    }

    /// Fold a finished run into the save
    pub fn record_game(&mut self, score: u64) -> GameRecord {
        let new_high_score = score > self.high_score;
        self.high_score = self.high_score.max(score);
        self.game_count += 1;
        let unlocked = self.unlock_skins();

        let prompt_nickname = self.is_first_game && !self.has_set_nickname && score > NICKNAME_PROMPT_SCORE;
        if prompt_nickname {
            self.is_first_game = false;
        }

        GameRecord {
            new_high_score,
            unlocked,
            prompt_nickname,
        }
    }

    /// Load the save, falling back to a fresh one
    pub fn load(store: &mut DualStore) -> Self {
        match store.get_json::<GameSave>(keys::SAVE) {
            Some(mut save) => {
                // Old saves may predate a skin
                save.unlocked_skins.insert(Skin::Default);
                if !save.is_unlocked(save.current_skin) {
                    save.current_skin = Skin::Default;
                }
                log::info!("Loaded save: {} games, best {}", save.game_count, save.high_score);
                save
            }
            None => Self::default(),
        }
    }

    pub fn save(&self, store: &mut DualStore) -> Result<WriteOutcome, StorageError> {
        store.set_json(keys::SAVE, self)
    }
}

// === Nicknames ===

/// Remove `<script>` blocks and any other tags
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        if tail.get(..7).is_some_and(|t| t.eq_ignore_ascii_case("<script")) {
            let lower = tail.to_ascii_lowercase();
            if let Some(end) = lower.find("</script>") {
                rest = &tail[end + "</script>".len()..];
                continue;
            }
        }

        match tail.find('>') {
            // "<>" is not a tag
            Some(close) if close > 1 => rest = &tail[close + 1..],
            _ => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Clean up and validate a nickname
pub fn validate_nickname(raw: &str) -> Result<String, NicknameError> {
    let cleaned = strip_markup(raw);
    let nickname = cleaned.trim();
    if nickname.is_empty() {
        return Err(NicknameError::Empty);
    }
    if nickname.chars().count() > MAX_NICKNAME_CHARS {
        return Err(NicknameError::TooLong {
            max: MAX_NICKNAME_CHARS,
        });
    }
    Ok(nickname.to_string())
}

/// Names offered by the first-game prompt
pub fn nickname_suggestions() -> &'static [&'static str] {
    &NICKNAME_SUGGESTIONS[..3]
}

/// Stored nickname, or the default
pub fn load_nickname(store: &mut DualStore) -> String {
    store
        .get(keys::PLAYER_NAME)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_NICKNAME.to_string())
}

/// Validate and persist a nickname. Invalid input leaves storage untouched.
pub fn save_nickname(store: &mut DualStore, raw: &str) -> Result<String, NicknameError> {
    let nickname = validate_nickname(raw)?;
    let outcome = store.set(keys::PLAYER_NAME, &nickname);
    if !outcome.success {
        log::warn!("Nickname could not be persisted");
    }
    Ok(nickname)
}

// === Player identity ===

/// Stable player id, created on first use
pub fn load_or_create_player_id(store: &mut DualStore, now_ms: f64, entropy: u64) -> String {
    if let Some(id) = store.get(keys::PLAYER_ID).filter(|id| !id.is_empty()) {
        return id;
    }
    let id = format!("player_{}_{}", now_ms as u64, base36(entropy, 9));
    if !store.set(keys::PLAYER_ID, &id).success {
        log::warn!("Player id could not be persisted");
    }
    log::info!("New player id {id}");
    id
}

pub(crate) fn base36(mut value: u64, digits: usize) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = vec![b'0'; digits];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// === Personal best ===

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonalBest {
    pub score: u64,
    pub timestamp_ms: f64,
}

impl PersonalBest {
    pub fn load(store: &mut DualStore, player_id: &str) -> Self {
        store
            .get_json(&keys::personal_best(player_id))
            .unwrap_or_default()
    }

    /// Store `score` if it beats the current record. Returns whether it did.
    pub fn record(store: &mut DualStore, player_id: &str, score: u64, now_ms: f64) -> Result<bool, StorageError> {
        let current = Self::load(store, player_id);
        if score <= current.score {
            return Ok(false);
        }
        let best = PersonalBest {
            score,
            timestamp_ms: now_ms,
        };
        store.set_json(&keys::personal_best(player_id), &best)?;
        Ok(true)
    }
}
