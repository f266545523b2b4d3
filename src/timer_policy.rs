use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{QkResult, QuickKeysError};

pub const MIN_CUSTOM_SECS: u32 = 10;
pub const MAX_CUSTOM_SECS: u32 = 3600;

/// Difficulty tier; only used to pick a default time allotment and a passage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// (floor seconds, characters per second) for this tier
    fn pacing(self) -> (u32, usize) {
        match self {
            Difficulty::Easy => (30, 8),
            Difficulty::Medium => (45, 6),
            Difficulty::Hard => (60, 4),
        }
    }
}

/// Seconds allotted to a session for `text_length` characters at `difficulty`.
pub fn allocate_seconds(difficulty: Difficulty, text_length: usize) -> u32 {
    let (floor, chars_per_sec) = difficulty.pacing();
    let needed = text_length.div_ceil(chars_per_sec);
    floor.max(u32::try_from(needed).unwrap_or(u32::MAX))
}

/// Checks a caller-supplied custom duration.
pub fn validate_custom_seconds(seconds: u32) -> QkResult<u32> {
    if (MIN_CUSTOM_SECS..=MAX_CUSTOM_SECS).contains(&seconds) {
        Ok(seconds)
    } else {
        Err(QuickKeysError::DurationOutOfRange {
            seconds,
            min: MIN_CUSTOM_SECS,
            max: MAX_CUSTOM_SECS,
        })
    }
}

/// How a session's duration is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSpec {
    Policy(Difficulty),
    Fixed(u32),
}

impl TimerSpec {
    pub fn resolve(self, text_length: usize) -> QkResult<u32> {
        match self {
            TimerSpec::Policy(difficulty) => Ok(allocate_seconds(difficulty, text_length)),
            TimerSpec::Fixed(seconds) => validate_custom_seconds(seconds),
        }
    }
}
