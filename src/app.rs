//! Application controller: owns the one active session and routes every
//! input, clock tick and bot tick to it.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::bot::{BotProfile, BotSnapshot};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{QkResult, QuickKeysError};
use crate::metrics::MetricsSnapshot;
use crate::passages::{random_passage, random_race_text, validate_custom_text};
use crate::race::{Race, RaceSettings};
use crate::recorder::{HistoryEntry, ProfileStats, ResultRecorder};
use crate::runtime::{spawn_interval, AppEvent};
use crate::session::{ResultSnapshot, Session, SessionMode, StopReason, Update};
use crate::timer_policy::{Difficulty, TimerSpec};

#[derive(Debug)]
pub enum ActiveSession {
    Solo {
        session: Session,
        difficulty: Option<Difficulty>,
    },
    Race(Race),
}

impl ActiveSession {
    /// The player's session, in either mode
    pub fn session(&self) -> &Session {
        match self {
            ActiveSession::Solo { session, .. } => session,
            ActiveSession::Race(race) => race.session(),
        }
    }

    pub fn race(&self) -> Option<&Race> {
        match self {
            ActiveSession::Race(race) => Some(race),
            ActiveSession::Solo { .. } => None,
        }
    }

    /// Running, or a race still counting down to its start
    pub fn is_live(&self) -> bool {
        self.session().is_running() || self.is_counting_down()
    }

    pub fn is_counting_down(&self) -> bool {
        self.race().is_some_and(Race::is_counting_down)
    }
}

/// How the current session was launched, so it can be retried
#[derive(Debug, Clone)]
enum Launch {
    Practice {
        difficulty: Difficulty,
        text: String,
    },
    Custom {
        text: String,
        seconds: u32,
    },
    Race {
        profile: BotProfile,
    },
}

pub struct App {
    config: Config,
    clock: Arc<dyn Clock>,
    recorder: Option<Box<dyn ResultRecorder>>,
    rng: StdRng,
    seeded: bool,
    timer_tx: Option<Sender<AppEvent>>,
    current: Option<ActiveSession>,
    last_launch: Option<Launch>,
    recorded: bool,
    last_profile: Option<ProfileStats>,
}

impl App {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        recorder: Option<Box<dyn ResultRecorder>>,
    ) -> Self {
        Self {
            config,
            clock,
            recorder,
            rng: StdRng::from_entropy(),
            seeded: false,
            timer_tx: None,
            current: None,
            last_launch: None,
            recorded: false,
            last_profile: None,
        }
    }

    /// Fixes passage choice and bot behavior, for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.seeded = true;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn start_practice(&mut self, difficulty: Difficulty) -> QkResult<MetricsSnapshot> {
        let text = random_passage(difficulty, &mut self.rng).to_string();
        self.launch(Launch::Practice { difficulty, text })
    }

    /// Validates the text and timer before any session exists.
    pub fn start_custom(&mut self, text: &str, seconds: Option<u32>) -> QkResult<MetricsSnapshot> {
        let text = validate_custom_text(text)?;
        let spec = match seconds.or(self.config.custom_seconds) {
            Some(secs) => TimerSpec::Fixed(secs),
            None => TimerSpec::Policy(self.config.difficulty),
        };
        let seconds = spec.resolve(text.chars().count())?;
        self.launch(Launch::Custom { text, seconds })
    }

    pub fn start_race(&mut self) -> QkResult<MetricsSnapshot> {
        let profile = BotProfile::random(&mut self.rng);
        self.launch(Launch::Race { profile })
    }

    /// Starts a fresh session like the last one. Races get a rematch against
    /// the same opponent with a slightly different pace.
    pub fn retry(&mut self) -> QkResult<MetricsSnapshot> {
        let launch = match self.last_launch.clone() {
            Some(Launch::Race { profile }) => Launch::Race {
                profile: profile.rematch(&mut self.rng),
            },
            Some(other) => other,
            None => return Err(QuickKeysError::NoActiveSession),
        };
        self.launch(launch)
    }

    fn launch(&mut self, launch: Launch) -> QkResult<MetricsSnapshot> {
        self.abandon_current();

        let active = match &launch {
            Launch::Practice { difficulty, text } => {
                let seconds = TimerSpec::Policy(*difficulty).resolve(text.chars().count())?;
                let mut session = Session::new(SessionMode::Practice, self.clock.clone());
                session.start(text, seconds)?;
                ActiveSession::Solo {
                    session,
                    difficulty: Some(*difficulty),
                }
            }
            Launch::Custom { text, seconds } => {
                let mut session = Session::new(SessionMode::Practice, self.clock.clone());
                session.start(text, *seconds)?;
                ActiveSession::Solo {
                    session,
                    difficulty: None,
                }
            }
            Launch::Race { profile } => {
                let text = random_race_text(&mut self.rng);
                let seconds = TimerSpec::Fixed(self.config.race_seconds).resolve(text.len())?;
                let seed = self.next_race_seed();
                let settings = RaceSettings {
                    finish_floor_secs: self.config.bot_finish_floor_secs,
                    countdown_secs: self.config.race_countdown_secs,
                    seed,
                };
                ActiveSession::Race(Race::start(
                    self.clock.clone(),
                    text,
                    seconds,
                    profile.clone(),
                    settings,
                )?)
            }
        };

        let metrics = active.session().metrics();
        self.current = Some(active);
        self.last_launch = Some(launch);
        self.recorded = false;
        Ok(metrics)
    }

    /// Each race, rematches included, draws its own bot seed
    fn next_race_seed(&mut self) -> Option<u64> {
        self.seeded.then(|| self.rng.gen())
    }

    /// Ends a still-running session without recording it
    fn abandon_current(&mut self) {
        if let Some(active) = self.current.take() {
            if active.is_live() {
                info!("abandoning running session");
                self.recorded = true;
                match active {
                    ActiveSession::Solo { mut session, .. } => {
                        session.stop(StopReason::Stopped);
                    }
                    ActiveSession::Race(mut race) => {
                        race.force_stop(StopReason::Stopped);
                    }
                }
            }
        }
    }

    pub fn submit_input(&mut self, typed_prefix: &str) -> Option<Update> {
        let update = match self.current.as_mut()? {
            ActiveSession::Solo { session, .. } => session.apply_input(typed_prefix),
            ActiveSession::Race(race) => race.submit_input(typed_prefix),
        };
        self.record_if_finished();
        update
    }

    pub fn tick_clock(&mut self) -> Option<Update> {
        let (update, went_live) = match self.current.as_mut()? {
            ActiveSession::Solo { session, .. } => (session.tick(), false),
            ActiveSession::Race(race) => {
                let was_counting = race.is_counting_down();
                let update = race.tick_clock();
                (update, was_counting && race.session().is_running())
            }
        };
        if went_live {
            self.spawn_timers();
        }
        self.record_if_finished();
        update
    }

    pub fn tick_bot(&mut self) -> Option<BotSnapshot> {
        let snapshot = match self.current.as_mut()? {
            ActiveSession::Race(race) => race.tick_bot().map(|(snap, _)| snap),
            ActiveSession::Solo { .. } => None,
        };
        self.record_if_finished();
        snapshot
    }

    pub fn force_stop(&mut self, reason: StopReason) -> Option<ResultSnapshot> {
        let result = match self.current.as_mut()? {
            ActiveSession::Solo { session, .. } => session.stop(reason),
            ActiveSession::Race(race) => race.force_stop(reason),
        };
        self.record_if_finished();
        result
    }

    fn record_if_finished(&mut self) {
        if self.recorded {
            return;
        }
        let Some(active) = self.current.as_ref() else {
            return;
        };
        let session = active.session();
        let Some(result) = session.result() else {
            return;
        };
        self.recorded = true;

        let mut entry = HistoryEntry::new(result.clone(), session.mode(), session.target_text());
        match active {
            ActiveSession::Solo {
                difficulty: Some(difficulty),
                ..
            } => entry = entry.with_difficulty(*difficulty),
            ActiveSession::Race(race) => {
                if let Some(outcome) = race.outcome() {
                    entry = entry.with_race(outcome, &race.bot().profile().name);
                }
            }
            _ => {}
        }

        if let Some(recorder) = self.recorder.as_mut() {
            match recorder.record(&entry) {
                Ok(stats) => self.last_profile = Some(stats),
                Err(e) => warn!(error = %e, "failed to record result"),
            }
        }
    }

    /// Spawns the intervals for the current session on `tx`. They stop on
    /// their own once the session ends. A race still counting down only
    /// gets its countdown; the session and bot intervals follow at the start.
    pub fn schedule_timers(&mut self, tx: &Sender<AppEvent>) {
        self.timer_tx = Some(tx.clone());
        self.spawn_timers();
    }

    fn spawn_timers(&self) {
        let (Some(active), Some(tx)) = (self.current.as_ref(), self.timer_tx.as_ref()) else {
            return;
        };
        if let Some(token) = active.race().and_then(Race::countdown_token) {
            spawn_interval(
                Duration::from_secs(1),
                tx.clone(),
                AppEvent::ClockTick,
                token,
            );
            return;
        }
        if let Some(token) = active.session().countdown_token() {
            spawn_interval(
                Duration::from_secs(1),
                tx.clone(),
                AppEvent::ClockTick,
                token,
            );
        }
        if let Some(race) = active.race() {
            spawn_interval(
                Duration::from_millis(self.config.bot_tick_ms),
                tx.clone(),
                AppEvent::BotTick,
                race.bot().token(),
            );
        }
    }

    pub fn current(&self) -> Option<&ActiveSession> {
        self.current.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref().map(ActiveSession::session)
    }

    pub fn last_profile(&self) -> Option<&ProfileStats> {
        self.last_profile.as_ref()
    }

    pub fn recorder(&self) -> Option<&dyn ResultRecorder> {
        self.recorder.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::recorder::SqliteRecorder;
    use crate::session::EndReason;
    use assert_matches::assert_matches;

    fn app_with_recorder() -> (App, ManualClock) {
        let clock = ManualClock::new(0);
        let recorder = SqliteRecorder::open_in_memory(50).unwrap();
        let app = App::new(
            Config::default(),
            Arc::new(clock.clone()),
            Some(Box::new(recorder)),
        )
        .with_seed(17);
        (app, clock)
    }

    #[test]
    fn custom_session_rejects_bad_input_before_starting() {
        let (mut app, _) = app_with_recorder();
        assert_matches!(
            app.start_custom("short", Some(60)),
            Err(QuickKeysError::TextTooShort { .. })
        );
        assert_matches!(
            app.start_custom("a perfectly reasonable practice text", Some(5)),
            Err(QuickKeysError::DurationOutOfRange { seconds: 5, .. })
        );
        assert!(app.current().is_none());
    }

    #[test]
    fn custom_session_uses_fixed_timer() {
        let (mut app, _) = app_with_recorder();
        let metrics = app
            .start_custom("  a perfectly reasonable practice text ", Some(25))
            .unwrap();
        assert_eq!(metrics.time_remaining_secs, 25);
        assert_eq!(
            app.session().unwrap().target_text(),
            "a perfectly reasonable practice text"
        );
    }

    #[test]
    fn custom_session_without_timer_uses_policy() {
        let (mut app, _) = app_with_recorder();
        let metrics = app
            .start_custom("a perfectly reasonable practice text", None)
            .unwrap();
        // medium floor
        assert_eq!(metrics.time_remaining_secs, 45);
    }

    #[test]
    fn completed_practice_is_recorded_once() {
        let (mut app, clock) = app_with_recorder();
        app.start_practice(Difficulty::Easy).unwrap();
        let text = app.session().unwrap().target_text().to_string();

        clock.advance_secs(10);
        let update = app.submit_input(&text).unwrap();
        assert!(update.finished.is_some());
        assert!(app.tick_clock().is_none());
        assert!(app.force_stop(StopReason::Stopped).is_none());

        let recorder = app.recorder().unwrap();
        let history = recorder.history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].difficulty, Some(Difficulty::Easy));
        assert_eq!(history[0].result.end_reason, EndReason::Completed);
        assert_eq!(app.last_profile().unwrap().total_games, 1);
    }

    #[test]
    fn retry_restarts_same_text() {
        let (mut app, _) = app_with_recorder();
        app.start_practice(Difficulty::Hard).unwrap();
        let text = app.session().unwrap().target_text().to_string();
        app.submit_input("Q");
        app.force_stop(StopReason::Submitted).unwrap();

        app.retry().unwrap();
        let session = app.session().unwrap();
        assert!(session.is_running());
        assert_eq!(session.target_text(), text);
        assert_eq!(session.position(), 0);
    }

    #[test]
    fn retry_without_session_fails() {
        let (mut app, _) = app_with_recorder();
        assert_matches!(app.retry(), Err(QuickKeysError::NoActiveSession));
    }

    #[test]
    fn abandoned_session_is_not_recorded() {
        let (mut app, _) = app_with_recorder();
        app.start_practice(Difficulty::Medium).unwrap();
        let token = app.session().unwrap().countdown_token().unwrap();
        app.start_practice(Difficulty::Easy).unwrap();
        assert!(token.is_cancelled());
        assert!(app.recorder().unwrap().history(10).unwrap().is_empty());
    }

    #[test]
    fn race_records_outcome() {
        let (mut app, clock) = app_with_recorder();
        app.start_race().unwrap();
        let race = app.current().unwrap().race().unwrap();
        let text = race.session().target_text().to_string();
        let opponent = race.bot().profile().name.clone();

        for _ in 0..app.config().race_countdown_secs {
            clock.advance_secs(1);
            app.tick_clock();
        }
        clock.advance_secs(5);
        app.tick_bot();
        app.submit_input(&text).unwrap();
        assert!(app.tick_bot().is_none());

        let history = app.recorder().unwrap().history(1).unwrap();
        assert_eq!(history[0].mode, SessionMode::Race);
        assert_eq!(
            history[0].race_outcome,
            Some(crate::race::RaceOutcome::PlayerWon)
        );
        assert_eq!(history[0].opponent.as_deref(), Some(opponent.as_str()));
        assert_eq!(app.last_profile().unwrap().races_won, 1);
    }

    #[test]
    fn race_countdown_ignores_typing() {
        let (mut app, clock) = app_with_recorder();
        app.start_race().unwrap();
        let text = app.session().unwrap().target_text().to_string();
        assert!(app.current().unwrap().is_counting_down());
        assert!(app.current().unwrap().is_live());

        assert!(app.submit_input(&text).is_none());
        clock.advance_secs(1);
        app.tick_clock();
        assert!(app.submit_input(&text).is_none());
        assert_eq!(app.session().unwrap().position(), 0);
        assert!(app.recorder().unwrap().history(10).unwrap().is_empty());
    }

    #[test]
    fn stopping_during_countdown_records_nothing() {
        let (mut app, _) = app_with_recorder();
        app.start_race().unwrap();
        assert!(app.force_stop(StopReason::Stopped).is_none());
        assert!(!app.current().unwrap().is_live());
        assert!(app.recorder().unwrap().history(10).unwrap().is_empty());
        // a rematch starts a fresh countdown
        app.retry().unwrap();
        assert!(app.current().unwrap().is_counting_down());
    }

    #[test]
    fn bot_interval_starts_at_go() {
        let clock = ManualClock::new(0);
        let config = Config {
            bot_tick_ms: 5,
            ..Config::default()
        };
        let mut app = App::new(config, Arc::new(clock.clone()), None).with_seed(2);
        app.start_race().unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        app.schedule_timers(&tx);
        // only the 1 s countdown interval is running
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        for _ in 0..app.config().race_countdown_secs {
            clock.advance_secs(1);
            app.tick_clock();
        }
        assert!(app.session().unwrap().is_running());
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(500)),
            Ok(AppEvent::BotTick)
        ));
        app.force_stop(StopReason::Stopped);
    }

    #[test]
    fn seeded_races_draw_fresh_bot_seeds() {
        let (mut app, _) = app_with_recorder();
        let first = app.next_race_seed().unwrap();
        let second = app.next_race_seed().unwrap();
        assert_ne!(first, second);

        let mut unseeded = App::new(Config::default(), Arc::new(ManualClock::new(0)), None);
        assert_eq!(unseeded.next_race_seed(), None);
    }

    #[test]
    fn solo_sessions_ignore_bot_ticks() {
        let (mut app, _) = app_with_recorder();
        assert!(app.tick_bot().is_none());
        app.start_practice(Difficulty::Easy).unwrap();
        assert!(app.tick_bot().is_none());
    }
}
