use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use quickkeys::app::App;
use quickkeys::clock::ManualClock;
use quickkeys::config::Config;
use quickkeys::runtime::{AppEvent, Runner, TestEventSource};
use quickkeys::session::EndReason;

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Feeds keystrokes and clock ticks through the runner channel the way the
// binary does, without a TTY.
#[test]
fn headless_typing_flow_completes() {
    let clock = ManualClock::new(0);
    let mut app = App::new(Config::default(), Arc::new(clock.clone()), None);
    let text = "headless runs need no tty";
    app.start_custom(text, Some(30)).unwrap();

    let runner = Runner::new(TestEventSource::new(), Duration::from_millis(5));
    let tx = runner.sender();
    for c in text.chars() {
        tx.send(key(c)).unwrap();
    }

    let mut typed = String::new();
    for _ in 0..200u32 {
        match runner.step() {
            AppEvent::Key(k) => {
                if let KeyCode::Char(c) = k.code {
                    typed.push(c);
                    clock.advance_ms(200);
                    app.submit_input(&typed);
                }
            }
            AppEvent::ClockTick => {
                app.tick_clock();
            }
            AppEvent::BotTick => {
                app.tick_bot();
            }
            AppEvent::Frame | AppEvent::Resize => {}
        }
        if app.session().is_some_and(|s| s.has_ended()) {
            break;
        }
    }

    let session = app.session().unwrap();
    assert_eq!(session.end_reason(), Some(EndReason::Completed));
    let result = session.result().unwrap();
    assert_eq!(result.accuracy_percent, 100);
    // 25 chars in 5 s
    assert_eq!(result.wpm, 60);
}

#[test]
fn headless_timed_session_finishes_by_clock_ticks() {
    let clock = ManualClock::new(0);
    let mut app = App::new(Config::default(), Arc::new(clock.clone()), None);
    app.start_custom("the timer runs out before this", Some(10))
        .unwrap();

    let runner = Runner::new(TestEventSource::new(), Duration::from_millis(5));
    let tx = runner.sender();
    for _ in 0..12 {
        tx.send(AppEvent::ClockTick).unwrap();
    }

    let mut updates = 0;
    for _ in 0..50u32 {
        if let AppEvent::ClockTick = runner.step() {
            clock.advance_secs(1);
            if app.tick_clock().is_some() {
                updates += 1;
            }
        }
    }

    // ticks after the timeout are ignored
    assert_eq!(updates, 10);
    let session = app.session().unwrap();
    assert_eq!(session.end_reason(), Some(EndReason::Timeout));
    assert_eq!(session.time_remaining_secs(), 0);
    assert_eq!(session.wpm_coords().len(), 10);
}

#[test]
fn scheduled_timers_stop_with_the_session() {
    let clock = ManualClock::new(0);
    let config = Config {
        bot_tick_ms: 5,
        race_countdown_secs: 0,
        ..Config::default()
    };
    let mut app = App::new(config, Arc::new(clock.clone()), None).with_seed(9);
    app.start_race().unwrap();

    let runner = Runner::new(TestEventSource::new(), Duration::from_millis(200));
    app.schedule_timers(&runner.sender());
    let countdown = app.session().unwrap().countdown_token().unwrap();

    assert!(matches!(runner.step(), AppEvent::BotTick));
    assert!(app.tick_bot().is_some());

    app.force_stop(quickkeys::session::StopReason::Stopped).unwrap();
    let race = app.current().unwrap().race().unwrap();
    assert!(race.bot().is_cancelled());
    assert!(countdown.is_cancelled());
    assert_eq!(countdown.cancellation_count(), 1);
    assert!(race.session().countdown_token().is_none());
    assert!(app.tick_bot().is_none());
}
