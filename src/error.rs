//! Error types shared across the crate

use thiserror::Error;

use crate::anticheat::{AntiCheatReport, SecondaryValidation};

/// Failure of a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable")]
    Unavailable,
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Score submission outcome that did not reach the leaderboard
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("score rejected: risk {}, {}", .anti_cheat.risk_level.as_str(), .validation.reason)]
    ScoreRejected {
        anti_cheat: Box<AntiCheatReport>,
        validation: Box<SecondaryValidation>,
    },
    #[error("score validation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Rejected nickname input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NicknameError {
    #[error("nickname is empty")]
    Empty,
    #[error("nickname is longer than {max} characters")]
    TooLong { max: usize },
}
