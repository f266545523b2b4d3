//! Pure scoring functions shared by every session mode.
//!
//! Everything here is deterministic: the same inputs always produce the same
//! numbers, so live snapshots and final results can be reproduced in tests.

use serde::{Deserialize, Serialize};

/// Characters counted as one word.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Accuracy shown in live snapshots before anything has been typed.
pub const LIVE_ACCURACY_WHEN_EMPTY: u32 = 100;

/// Accuracy recorded for a finished session with zero attempted characters.
pub const FINAL_ACCURACY_WHEN_EMPTY: u32 = 0;

/// Words per minute from correct characters and elapsed seconds.
///
/// Returns 0 when no time has elapsed (or the clock went backwards).
pub fn compute_wpm(correct_count: usize, elapsed_secs: f64) -> u32 {
    let elapsed_minutes = elapsed_secs / 60.0;
    if !elapsed_minutes.is_finite() || elapsed_minutes <= 0.0 {
        return 0;
    }
    let words = correct_count as f64 / CHARS_PER_WORD;
    (words / elapsed_minutes).round().max(0.0) as u32
}

/// Accuracy as a whole percentage, `empty_default` when nothing was attempted.
pub fn compute_accuracy(correct_count: usize, attempted_count: usize, empty_default: u32) -> u32 {
    if attempted_count == 0 {
        return empty_default;
    }
    let correct = correct_count.min(attempted_count);
    (100.0 * correct as f64 / attempted_count as f64).round() as u32
}

/// Share of the target text attempted, clamped to `[0, 100]`.
pub fn compute_progress_percent(position: usize, total_length: usize) -> u32 {
    if total_length == 0 {
        return 0;
    }
    let pct = (100.0 * position as f64 / total_length as f64).round();
    pct.clamp(0.0, 100.0) as u32
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;
            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Live numbers pushed to the caller on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub wpm: u32,
    pub accuracy_percent: u32,
    pub errors: usize,
    pub progress_percent: u32,
    pub time_remaining_secs: u32,
}
