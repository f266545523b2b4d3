//! Typing session state machine shared by practice, custom and race modes.
//!
//! A [`Session`] moves `Idle -> Running -> Ended` exactly once. Input, clock
//! ticks and stop requests arriving outside `Running` are ignored, so a late
//! timer tick racing a completing keystroke can never produce a second
//! result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{QkResult, QuickKeysError};
use crate::metrics::{
    compute_accuracy, compute_progress_percent, compute_wpm, MetricsSnapshot,
    FINAL_ACCURACY_WHEN_EMPTY, LIVE_ACCURACY_WHEN_EMPTY,
};
use crate::runtime::CancelToken;
use crate::time_series::{consistency, TimeSeriesPoint};

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Practice,
    Race,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EndReason {
    Completed,
    Timeout,
    Stopped,
    Submitted,
}

/// Reasons a caller may end a running session early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stopped,
    Submitted,
}

impl From<StopReason> for EndReason {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Stopped => EndReason::Stopped,
            StopReason::Submitted => EndReason::Submitted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Ended(EndReason),
}

/// Final numbers handed to the result recorder, produced once per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub wpm: u32,
    pub accuracy_percent: u32,
    pub errors: usize,
    pub correct_chars: usize,
    pub elapsed_secs: f64,
    pub end_reason: EndReason,
    pub text_length: usize,
    pub consistency: f64,
}

/// What a state change produced: fresh metrics, and the result if it ended
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub metrics: MetricsSnapshot,
    pub finished: Option<ResultSnapshot>,
}

#[derive(Debug)]
pub struct Session {
    mode: SessionMode,
    clock: Arc<dyn Clock>,
    status: SessionStatus,
    target_text: String,
    target: Vec<char>,
    /// Last character attempted at each index; its length is the position
    attempts: Vec<char>,
    typed_len: usize,
    correct_count: usize,
    error_count: usize,
    total_secs: u32,
    time_remaining_secs: u32,
    started_at_ms: Option<u64>,
    ended_at_ms: Option<u64>,
    countdown: Option<CancelToken>,
    wpm_coords: Vec<TimeSeriesPoint>,
    result: Option<ResultSnapshot>,
}

impl Session {
    pub fn new(mode: SessionMode, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode,
            clock,
            status: SessionStatus::Idle,
            target_text: String::new(),
            target: Vec::new(),
            attempts: Vec::new(),
            typed_len: 0,
            correct_count: 0,
            error_count: 0,
            total_secs: 0,
            time_remaining_secs: 0,
            started_at_ms: None,
            ended_at_ms: None,
            countdown: None,
            wpm_coords: Vec::new(),
            result: None,
        }
    }

    /// Begins the session and its countdown.
    pub fn start(&mut self, target_text: &str, allocated_secs: u32) -> QkResult<MetricsSnapshot> {
        if self.status != SessionStatus::Idle {
            return Err(QuickKeysError::AlreadyStarted);
        }
        if target_text.is_empty() {
            return Err(QuickKeysError::EmptyText);
        }

        self.target_text = target_text.to_string();
        self.target = target_text.chars().collect();
        self.attempts.clear();
        self.typed_len = 0;
        self.correct_count = 0;
        self.error_count = 0;
        self.total_secs = allocated_secs;
        self.time_remaining_secs = allocated_secs;
        self.started_at_ms = Some(self.clock.now_ms());
        self.countdown = Some(CancelToken::new());
        self.status = SessionStatus::Running;

        info!(
            mode = %self.mode,
            text_length = self.target.len(),
            seconds = allocated_secs,
            "session started"
        );
        Ok(self.metrics())
    }

    /// Applies the user's full typed text. Called on every change.
    pub fn apply_input(&mut self, typed_prefix: &str) -> Option<Update> {
        if !self.is_running() {
            debug!(status = ?self.status, "input ignored, session not running");
            return None;
        }

        let typed: Vec<char> = typed_prefix.chars().take(self.target.len()).collect();
        for (idx, &c) in typed.iter().enumerate() {
            match self.attempts.get_mut(idx) {
                Some(slot) => *slot = c,
                None => self.attempts.push(c),
            }
        }
        self.typed_len = typed.len();
        self.recount();

        let finished = if typed == self.target {
            Some(self.end(EndReason::Completed))
        } else {
            None
        };

        Some(Update {
            metrics: self.metrics(),
            finished,
        })
    }

    /// One second of the countdown.
    pub fn tick(&mut self) -> Option<Update> {
        if !self.is_running() {
            debug!(status = ?self.status, "tick ignored, session not running");
            return None;
        }

        self.time_remaining_secs = self.time_remaining_secs.saturating_sub(1);
        let elapsed = self.elapsed_secs();
        self.wpm_coords.push(TimeSeriesPoint::new(
            elapsed,
            compute_wpm(self.correct_count, elapsed),
        ));

        let finished = if self.time_remaining_secs == 0 {
            Some(self.end(EndReason::Timeout))
        } else {
            None
        };

        Some(Update {
            metrics: self.metrics(),
            finished,
        })
    }

    /// Ends a running session immediately, freezing its metrics.
    pub fn stop(&mut self, reason: StopReason) -> Option<ResultSnapshot> {
        if !self.is_running() {
            debug!(status = ?self.status, "stop ignored, session not running");
            return None;
        }
        Some(self.end(reason.into()))
    }

    fn end(&mut self, reason: EndReason) -> ResultSnapshot {
        self.status = SessionStatus::Ended(reason);
        self.ended_at_ms = Some(self.clock.now_ms());
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }

        let result = self.finalize(reason);
        info!(
            reason = %reason,
            wpm = result.wpm,
            accuracy = result.accuracy_percent,
            errors = result.errors,
            "session ended"
        );
        self.result = Some(result.clone());
        result
    }

    fn finalize(&self, end_reason: EndReason) -> ResultSnapshot {
        debug_assert!(self.result.is_none(), "session finalized twice");
        let elapsed_secs = self.elapsed_secs();
        ResultSnapshot {
            wpm: compute_wpm(self.correct_count, elapsed_secs),
            accuracy_percent: compute_accuracy(
                self.correct_count,
                self.position(),
                FINAL_ACCURACY_WHEN_EMPTY,
            ),
            errors: self.error_count,
            correct_chars: self.correct_count,
            elapsed_secs,
            end_reason,
            text_length: self.target.len(),
            consistency: consistency(&self.wpm_coords),
        }
    }

    fn recount(&mut self) {
        self.correct_count = self
            .attempts
            .iter()
            .zip(self.target.iter())
            .filter(|(typed, expected)| typed == expected)
            .count();
        self.error_count = self.attempts.len() - self.correct_count;
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            wpm: compute_wpm(self.correct_count, self.elapsed_secs()),
            accuracy_percent: compute_accuracy(
                self.correct_count,
                self.position(),
                LIVE_ACCURACY_WHEN_EMPTY,
            ),
            errors: self.error_count,
            progress_percent: self.progress_percent(),
            time_remaining_secs: self.time_remaining_secs,
        }
    }

    /// Seconds since start, frozen once the session has ended
    pub fn elapsed_secs(&self) -> f64 {
        match self.started_at_ms {
            Some(started) => {
                let until = self.ended_at_ms.unwrap_or_else(|| self.clock.now_ms());
                until.saturating_sub(started) as f64 / 1000.0
            }
            None => 0.0,
        }
    }

    /// Outcome per currently typed character, for rendering
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.attempts[..self.typed_len]
            .iter()
            .zip(self.target.iter())
            .map(|(typed, expected)| {
                if typed == expected {
                    Outcome::Correct
                } else {
                    Outcome::Incorrect
                }
            })
            .collect()
    }

    /// Handle for the interval timer driving [`Session::tick`]
    pub fn countdown_token(&self) -> Option<CancelToken> {
        self.countdown.clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn has_ended(&self) -> bool {
        matches!(self.status, SessionStatus::Ended(_))
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        match self.status {
            SessionStatus::Ended(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    pub fn text_length(&self) -> usize {
        self.target.len()
    }

    pub fn position(&self) -> usize {
        self.attempts.len()
    }

    pub fn typed_len(&self) -> usize {
        self.typed_len
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn progress_percent(&self) -> u32 {
        compute_progress_percent(self.position(), self.target.len())
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    pub fn wpm_coords(&self) -> &[TimeSeriesPoint] {
        &self.wpm_coords
    }

    pub fn result(&self) -> Option<&ResultSnapshot> {
        self.result.as_ref()
    }
}
