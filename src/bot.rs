//! Simulated race opponent.
//!
//! The bot does not type; on every update it estimates how far a human at
//! its average speed would be, with random speed swings, pauses and
//! slowdowns layered on top.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::{compute_progress_percent, compute_wpm};
use crate::runtime::CancelToken;

/// Interval between bot updates
pub const BOT_TICK_MS: u64 = 200;

/// Minimum elapsed seconds before the bot may finish
pub const DEFAULT_FINISH_FLOOR_SECS: f64 = 10.0;

/// Keeps the bot beatable
const SPEED_DERATING: f64 = 0.8;
const MIN_EFFECTIVE_WPM: f64 = 30.0;
const SPEED_VARIANCE: f64 = 0.25;
const PAUSE_CHANCE: f64 = 0.05;
const PAUSE_FACTOR: f64 = 0.1;
const SLOWDOWN_CHANCE: f64 = 0.15;
const SLOWDOWN_FACTOR: f64 = 0.6;
const MIN_DISPLAY_ACCURACY: f64 = 92.0;

const NAME_PREFIXES: [&str; 8] = [
    "Speed", "Quick", "Fast", "Rapid", "Swift", "Turbo", "Lightning", "Blazing",
];
const NAME_SUFFIXES: [&str; 8] = [
    "Typer", "Keys", "Fingers", "Racer", "Master", "Ninja", "Pro", "Ace",
];
const NAME_NUMBERS: [&str; 7] = ["42", "99", "2K", "X", "007", "88", "77"];
const AVATARS: [&str; 10] = ["🤖", "👾", "🚀", "⚡", "🔥", "💨", "🎯", "🏆", "⭐", "💎"];

/// Per-tick speed factor: a short pause, else a slowdown, else full speed
fn slowdown_factor<R: Rng>(rng: &mut R) -> f64 {
    if rng.gen_bool(PAUSE_CHANCE) {
        PAUSE_FACTOR
    } else if rng.gen_bool(SLOWDOWN_CHANCE) {
        SLOWDOWN_FACTOR
    } else {
        1.0
    }
}

fn pick<R: Rng>(pool: &[&'static str], rng: &mut R) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotProfile {
    pub name: String,
    pub avatar: String,
    pub average_wpm: u32,
}

impl BotProfile {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let name = format!(
            "{}{}{}",
            pick(&NAME_PREFIXES, rng),
            pick(&NAME_SUFFIXES, rng),
            pick(&NAME_NUMBERS, rng)
        );
        Self {
            name,
            avatar: pick(&AVATARS, rng).to_string(),
            average_wpm: rng.gen_range(40..=100),
        }
    }

    /// Same opponent with a slightly different pace
    pub fn rematch<R: Rng>(&self, rng: &mut R) -> Self {
        let delta: i64 = rng.gen_range(-5..=5);
        let wpm = (self.average_wpm as i64 + delta).max(MIN_EFFECTIVE_WPM as i64);
        Self {
            average_wpm: wpm as u32,
            ..self.clone()
        }
    }

    /// Characters per second before per-tick variation
    pub fn chars_per_second(&self) -> f64 {
        let effective_wpm = (self.average_wpm as f64 * SPEED_DERATING).max(MIN_EFFECTIVE_WPM);
        effective_wpm * 5.0 / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSnapshot {
    pub chars_typed: usize,
    pub progress_percent: u32,
    pub wpm: u32,
    pub accuracy_percent: u32,
    pub finished: bool,
}

#[derive(Debug)]
pub struct BotOpponent {
    profile: BotProfile,
    text_length: usize,
    finish_floor_secs: f64,
    rng: StdRng,
    chars_typed: usize,
    wpm: u32,
    accuracy_percent: u32,
    finished: bool,
    token: CancelToken,
}

impl BotOpponent {
    pub fn new(profile: BotProfile, text_length: usize, finish_floor_secs: f64) -> Self {
        Self::with_rng(profile, text_length, finish_floor_secs, StdRng::from_entropy())
    }

    pub fn with_seed(
        profile: BotProfile,
        text_length: usize,
        finish_floor_secs: f64,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            profile,
            text_length,
            finish_floor_secs,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        profile: BotProfile,
        text_length: usize,
        finish_floor_secs: f64,
        rng: StdRng,
    ) -> Self {
        Self {
            profile,
            text_length,
            finish_floor_secs,
            rng,
            chars_typed: 0,
            wpm: 0,
            accuracy_percent: 100,
            finished: false,
            token: CancelToken::new(),
        }
    }

    /// Advances the simulation to `elapsed_secs` since race start.
    ///
    /// Returns `None` once the bot is cancelled or has finished.
    pub fn tick(&mut self, elapsed_secs: f64) -> Option<BotSnapshot> {
        if self.token.is_cancelled() || self.finished {
            return None;
        }

        let variation = self.rng.gen_range(1.0 - SPEED_VARIANCE..=1.0 + SPEED_VARIANCE);
        let expected = (elapsed_secs.max(0.0) * self.profile.chars_per_second() * variation)
            .min(self.text_length as f64);

        let slowdown = slowdown_factor(&mut self.rng);

        let chars = (expected * slowdown).floor() as usize;
        self.chars_typed = self.chars_typed.max(chars).min(self.text_length);
        self.wpm = compute_wpm(self.chars_typed, elapsed_secs);
        self.accuracy_percent = self
            .rng
            .gen_range(MIN_DISPLAY_ACCURACY..=100.0)
            .round() as u32;

        if self.chars_typed >= self.text_length && elapsed_secs > self.finish_floor_secs {
            self.finished = true;
            self.token.cancel();
            info!(bot = %self.profile.name, elapsed_secs, "bot finished");
        }

        let snapshot = self.snapshot();
        debug!(
            bot = %self.profile.name,
            progress = snapshot.progress_percent,
            wpm = snapshot.wpm,
            "bot tick"
        );
        Some(snapshot)
    }

    /// Stops the simulation; later ticks return `None`.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn has_finished(&self) -> bool {
        self.finished
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn profile(&self) -> &BotProfile {
        &self.profile
    }

    pub fn progress_percent(&self) -> u32 {
        compute_progress_percent(self.chars_typed, self.text_length)
    }

    pub fn snapshot(&self) -> BotSnapshot {
        BotSnapshot {
            chars_typed: self.chars_typed,
            progress_percent: self.progress_percent(),
            wpm: self.wpm,
            accuracy_percent: self.accuracy_percent,
            finished: self.finished,
        }
    }
}
