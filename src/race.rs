use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bot::{BotOpponent, BotProfile, BotSnapshot, DEFAULT_FINISH_FLOOR_SECS};
use crate::clock::Clock;
use crate::error::{QkResult, QuickKeysError};
use crate::runtime::CancelToken;
use crate::session::{EndReason, ResultSnapshot, Session, SessionMode, StopReason, Update};

/// Seconds of "3, 2, 1" before a race goes live
pub const DEFAULT_COUNTDOWN_SECS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RaceOutcome {
    PlayerWon,
    BotWon,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceSettings {
    pub finish_floor_secs: f64,
    /// Pre-start countdown; 0 starts the race immediately
    pub countdown_secs: u32,
    /// Fixed bot randomness, for reproducible races
    pub seed: Option<u64>,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            finish_floor_secs: DEFAULT_FINISH_FLOOR_SECS,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    /// Input is ignored and neither clock runs
    Countdown { remaining: u32 },
    Racing,
    /// Called off during the countdown; nothing to record
    Abandoned,
}

/// Player session racing a simulated opponent over the same text.
#[derive(Debug)]
pub struct Race {
    session: Session,
    bot: BotOpponent,
    outcome: Option<RaceOutcome>,
    phase: RacePhase,
    race_text: String,
    seconds: u32,
    countdown: CancelToken,
}

impl Race {
    /// Sets up the race and begins its countdown, or starts it right away
    /// when the countdown is 0.
    pub fn start(
        clock: Arc<dyn Clock>,
        race_text: &str,
        seconds: u32,
        profile: BotProfile,
        settings: RaceSettings,
    ) -> QkResult<Self> {
        if race_text.is_empty() {
            return Err(QuickKeysError::EmptyText);
        }

        let session = Session::new(SessionMode::Race, clock);
        let text_length = race_text.chars().count();
        let bot = match settings.seed {
            Some(seed) => {
                BotOpponent::with_seed(profile, text_length, settings.finish_floor_secs, seed)
            }
            None => BotOpponent::new(profile, text_length, settings.finish_floor_secs),
        };

        let mut race = Self {
            session,
            bot,
            outcome: None,
            phase: RacePhase::Countdown {
                remaining: settings.countdown_secs,
            },
            race_text: race_text.to_string(),
            seconds,
            countdown: CancelToken::new(),
        };
        if settings.countdown_secs == 0 {
            race.go()?;
        } else {
            info!(
                opponent = %race.bot.profile().name,
                secs = settings.countdown_secs,
                "race countdown started"
            );
        }
        Ok(race)
    }

    /// Starts the player's session, and with it the bot's clock
    fn go(&mut self) -> QkResult<()> {
        self.countdown.cancel();
        self.session.start(&self.race_text, self.seconds)?;
        self.phase = RacePhase::Racing;
        info!(
            opponent = %self.bot.profile().name,
            wpm = self.bot.profile().average_wpm,
            "race started"
        );
        Ok(())
    }

    pub fn submit_input(&mut self, typed_prefix: &str) -> Option<Update> {
        if self.phase != RacePhase::Racing {
            debug!(phase = ?self.phase, "input ignored, race not live");
            return None;
        }
        let update = self.session.apply_input(typed_prefix)?;
        if let Some(result) = &update.finished {
            self.resolve_player_end(result.end_reason);
        }
        Some(update)
    }

    /// One second: counts down before the start, then drives the session timer.
    pub fn tick_clock(&mut self) -> Option<Update> {
        match self.phase {
            RacePhase::Countdown { remaining } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    if let Err(e) = self.go() {
                        warn!(error = %e, "race could not start");
                        self.abandon();
                        return None;
                    }
                } else {
                    self.phase = RacePhase::Countdown { remaining };
                }
                Some(Update {
                    metrics: self.session.metrics(),
                    finished: None,
                })
            }
            RacePhase::Racing => {
                let update = self.session.tick()?;
                if let Some(result) = &update.finished {
                    self.resolve_player_end(result.end_reason);
                }
                Some(update)
            }
            RacePhase::Abandoned => None,
        }
    }

    /// Ends the race early. During the countdown the race is called off
    /// without a result.
    pub fn force_stop(&mut self, reason: StopReason) -> Option<ResultSnapshot> {
        match self.phase {
            RacePhase::Countdown { .. } => {
                self.abandon();
                None
            }
            RacePhase::Racing => {
                let result = self.session.stop(reason)?;
                self.resolve_player_end(result.end_reason);
                Some(result)
            }
            RacePhase::Abandoned => None,
        }
    }

    fn abandon(&mut self) {
        self.countdown.cancel();
        self.bot.cancel();
        self.phase = RacePhase::Abandoned;
        info!("race called off before the start");
    }

    /// Advances the bot. A finished bot wins if the race is still open and
    /// stops the player's session.
    pub fn tick_bot(&mut self) -> Option<(BotSnapshot, Option<ResultSnapshot>)> {
        if self.outcome.is_some() || self.phase != RacePhase::Racing {
            return None;
        }

        let snapshot = self.bot.tick(self.session.elapsed_secs())?;
        let mut player_result = None;
        if snapshot.finished {
            self.outcome = Some(RaceOutcome::BotWon);
            player_result = self.session.stop(StopReason::Stopped);
            info!(opponent = %self.bot.profile().name, "race won by bot");
        }
        Some((snapshot, player_result))
    }

    fn resolve_player_end(&mut self, reason: EndReason) {
        if self.outcome.is_some() {
            return;
        }
        // cancel first so no later bot tick can claim the race
        self.bot.cancel();

        let outcome = match reason {
            EndReason::Completed => RaceOutcome::PlayerWon,
            _ if self.session.progress_percent() >= self.bot.progress_percent() => {
                RaceOutcome::PlayerWon
            }
            _ => RaceOutcome::BotWon,
        };
        self.outcome = Some(outcome);
        info!(%outcome, %reason, "race resolved");
    }

    pub fn outcome(&self) -> Option<RaceOutcome> {
        self.outcome
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    /// Seconds left before the start, while counting down
    pub fn countdown_remaining(&self) -> Option<u32> {
        match self.phase {
            RacePhase::Countdown { remaining } => Some(remaining),
            _ => None,
        }
    }

    pub fn is_counting_down(&self) -> bool {
        self.countdown_remaining().is_some()
    }

    /// Handle for the interval driving the countdown, until the race starts
    pub fn countdown_token(&self) -> Option<CancelToken> {
        self.is_counting_down().then(|| self.countdown.clone())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn bot(&self) -> &BotOpponent {
        &self.bot
    }

    /// True when the player is ahead, for leader indicators
    pub fn player_leading(&self) -> bool {
        self.session.progress_percent() > self.bot.progress_percent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_matches::assert_matches;

    const TEXT: &str = "Pack my box with five dozen liquor jugs.";

    fn race(wpm: u32, seed: u64) -> (Race, ManualClock) {
        let clock = ManualClock::new(0);
        let profile = BotProfile {
            name: "SwiftKeys42".into(),
            avatar: "🚀".into(),
            average_wpm: wpm,
        };
        let race = Race::start(
            Arc::new(clock.clone()),
            TEXT,
            120,
            profile,
            RaceSettings {
                seed: Some(seed),
                countdown_secs: 0,
                ..RaceSettings::default()
            },
        )
        .unwrap();
        (race, clock)
    }

    #[test]
    fn player_finishing_before_floor_cancels_bot() {
        let (mut race, clock) = race(100, 9);
        for _ in 0..25 {
            clock.advance_ms(200);
            race.tick_bot();
        }

        let update = race.submit_input(TEXT).unwrap();
        assert_matches!(
            update.finished,
            Some(ResultSnapshot {
                end_reason: EndReason::Completed,
                ..
            })
        );
        assert_eq!(race.outcome(), Some(RaceOutcome::PlayerWon));
        assert!(race.bot().is_cancelled());

        // the bot would have finished by now, but it never reports again
        for _ in 0..500 {
            clock.advance_ms(200);
            assert!(race.tick_bot().is_none());
        }
        assert_eq!(race.outcome(), Some(RaceOutcome::PlayerWon));
        assert!(!race.bot().has_finished());
    }

    #[test]
    fn bot_wins_when_player_is_idle() {
        let (mut race, clock) = race(100, 4);
        race.submit_input("Pack my");

        let mut player_result = None;
        for _ in 0..1_000 {
            clock.advance_ms(200);
            if let Some((snap, result)) = race.tick_bot() {
                if snap.finished {
                    player_result = result;
                    break;
                }
            }
        }

        assert_eq!(race.outcome(), Some(RaceOutcome::BotWon));
        let result = player_result.expect("player session stopped");
        assert_eq!(result.end_reason, EndReason::Stopped);
        assert!(race.session().elapsed_secs() > DEFAULT_FINISH_FLOOR_SECS);
        // the player can no longer type
        assert!(race.submit_input(TEXT).is_none());
    }

    #[test]
    fn timeout_goes_to_higher_progress() {
        let clock = ManualClock::new(0);
        let profile = BotProfile {
            name: "Bot".into(),
            avatar: "🤖".into(),
            average_wpm: 40,
        };
        let mut race = Race::start(
            Arc::new(clock.clone()),
            TEXT,
            10,
            profile,
            RaceSettings {
                seed: Some(1),
                finish_floor_secs: 1_000.0,
                countdown_secs: 0,
            },
        )
        .unwrap();
        race.submit_input(&TEXT[..30]);
        clock.advance_ms(200);
        race.tick_bot();

        for _ in 0..10 {
            clock.advance_secs(1);
            race.tick_clock();
        }
        assert_eq!(race.session().end_reason(), Some(EndReason::Timeout));
        assert_eq!(race.outcome(), Some(RaceOutcome::PlayerWon));
        assert!(race.bot().is_cancelled());
    }

    #[test]
    fn stopping_with_no_progress_loses_to_moving_bot() {
        let (mut race, clock) = race(100, 2);
        for _ in 0..20 {
            clock.advance_ms(200);
            race.tick_bot();
        }
        assert!(race.bot().progress_percent() > 0);
        race.force_stop(StopReason::Stopped).unwrap();
        assert_eq!(race.outcome(), Some(RaceOutcome::BotWon));
        assert!(race.force_stop(StopReason::Stopped).is_none());
    }

    fn counting_race(clock: &ManualClock) -> Race {
        let profile = BotProfile {
            name: "Bot".into(),
            avatar: "🤖".into(),
            average_wpm: 100,
        };
        Race::start(
            Arc::new(clock.clone()),
            TEXT,
            60,
            profile,
            RaceSettings {
                seed: Some(8),
                ..RaceSettings::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn input_during_countdown_is_ignored() {
        let clock = ManualClock::new(0);
        let mut race = counting_race(&clock);
        assert_eq!(race.countdown_remaining(), Some(DEFAULT_COUNTDOWN_SECS));
        assert!(race.countdown_token().is_some());

        assert!(race.submit_input("Pack").is_none());
        clock.advance_secs(1);
        assert!(race.tick_bot().is_none());
        assert!(race.tick_clock().unwrap().finished.is_none());
        assert_eq!(race.countdown_remaining(), Some(2));
        assert!(race.submit_input("Pack").is_none());
        assert_eq!(race.session().position(), 0);
        assert!(!race.session().is_running());
    }

    #[test]
    fn race_goes_live_after_countdown() {
        let clock = ManualClock::new(0);
        let mut race = counting_race(&clock);
        let token = race.countdown_token().unwrap();
        for _ in 0..DEFAULT_COUNTDOWN_SECS {
            clock.advance_secs(1);
            race.tick_clock();
        }
        assert_eq!(race.phase(), RacePhase::Racing);
        assert!(token.is_cancelled());
        assert!(race.countdown_token().is_none());
        assert!(race.session().is_running());
        assert_eq!(race.session().time_remaining_secs(), 60);

        // both clocks start at GO, not at setup
        assert_eq!(race.session().elapsed_secs(), 0.0);
        clock.advance_ms(200);
        let (snap, _) = race.tick_bot().unwrap();
        assert!(snap.chars_typed <= 2);
        assert_eq!(race.submit_input("Pack").unwrap().metrics.errors, 0);
    }

    #[test]
    fn stopping_during_countdown_calls_race_off() {
        let clock = ManualClock::new(0);
        let mut race = counting_race(&clock);
        let token = race.countdown_token().unwrap();
        assert!(race.force_stop(StopReason::Stopped).is_none());
        assert_eq!(race.phase(), RacePhase::Abandoned);
        assert!(token.is_cancelled());
        assert!(race.bot().is_cancelled());
        assert!(race.tick_clock().is_none());
        assert!(race.session().result().is_none());
        assert_eq!(race.outcome(), None);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(RaceOutcome::PlayerWon.to_string(), "player_won");
        assert_eq!(RaceOutcome::BotWon.to_string(), "bot_won");
    }
}
