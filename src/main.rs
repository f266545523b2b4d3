use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc::Sender, Arc, Mutex},
    time::Duration,
};

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{info, warn};

use quickkeys::{
    app::App,
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    recorder::{export_csv, ResultRecorder, SqliteRecorder},
    runtime::{AppEvent, CrosstermEventSource, Runner},
    session::StopReason,
    timer_policy::Difficulty,
    QkResult,
};

const FRAME_MS: u64 = 100;

/// typing speed practice with timed sessions, custom texts and bot races
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// what to play
    #[clap(short = 'm', long, value_enum, default_value_t = Mode::Practice)]
    mode: Mode,

    /// passage tier and timer policy
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// text to type in custom mode
    #[clap(short = 't', long)]
    text: Option<String>,

    /// fixed timer for custom mode, in seconds
    #[clap(short = 's', long)]
    seconds: Option<u32>,

    /// print recent results and exit
    #[clap(long)]
    history: bool,

    /// write result history as CSV and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,

    /// delete all recorded results and profile averages, then exit
    #[clap(long)]
    reset_stats: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Practice,
    Custom,
    Race,
}

impl Cli {
    /// Stored settings with command line overrides applied
    fn effective_config(&self, stored: Config) -> Config {
        Config {
            difficulty: self.difficulty.unwrap_or(stored.difficulty),
            custom_seconds: self.seconds.or(stored.custom_seconds),
            ..stored
        }
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn open_recorder(config: &Config) -> Option<SqliteRecorder> {
    match SqliteRecorder::open_default(config.history_limit) {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!(error = %e, "results will not be saved");
            None
        }
    }
}

fn print_history(recorder: &dyn ResultRecorder, limit: usize) -> QkResult<()> {
    let profile = recorder.profile()?;
    println!(
        "{} games   avg {} wpm   best {} wpm   avg {}% acc   {} races won",
        profile.total_games,
        profile.avg_wpm,
        profile.best_wpm,
        profile.avg_accuracy,
        profile.races_won
    );
    for entry in recorder.history(limit)? {
        println!(
            "{}  {:<8} {:>3} wpm {:>3}% {:<9}  {}",
            entry.recorded_at.format("%Y-%m-%d %H:%M"),
            entry.mode,
            entry.result.wpm,
            entry.result.accuracy_percent,
            entry.result.end_reason,
            entry.text_sample
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let store = FileConfigStore::new();
    let config = cli.effective_config(store.load());
    if let Err(e) = config.validate() {
        Cli::command().error(ErrorKind::ValueValidation, e).exit();
    }
    if cli.save_config {
        store.save(&config)?;
        println!("saved settings to {}", store.path().display());
    }

    let recorder = open_recorder(&config);

    if cli.history || cli.export_csv.is_some() || cli.reset_stats {
        let Some(recorder) = recorder else {
            Cli::command()
                .error(ErrorKind::Io, "result history is unavailable")
                .exit();
        };
        if cli.history {
            print_history(&recorder, config.history_limit)?;
        }
        if let Some(path) = &cli.export_csv {
            let entries = recorder.history(config.history_limit)?;
            export_csv(&entries, File::create(path)?)?;
            println!("exported {} results to {}", entries.len(), path.display());
        }
        if cli.reset_stats {
            recorder.clear()?;
            println!("cleared result history and profile averages");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = App::new(
        config.clone(),
        Arc::new(SystemClock),
        recorder.map(|r| Box::new(r) as Box<dyn ResultRecorder>),
    );
    let started = match cli.mode {
        Mode::Practice => app.start_practice(config.difficulty),
        Mode::Custom => match &cli.text {
            Some(text) => app.start_custom(text, cli.seconds),
            None => Cli::command()
                .error(ErrorKind::MissingRequiredArgument, "--text is required in custom mode")
                .exit(),
        },
        Mode::Race => app.start_race(),
    };
    if let Err(e) = started {
        Cli::command().error(ErrorKind::ValueValidation, e).exit();
    }
    info!(mode = %cli.mode, "session started");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, Tui::new(app));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Continue,
    /// A new session started and needs its timers
    Restarted,
    Quit,
}

/// Terminal-side state: the typed buffer fed to the engine as a prefix
struct Tui {
    app: App,
    typed: String,
}

impl Tui {
    fn new(app: App) -> Self {
        Self {
            app,
            typed: String::new(),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.app.force_stop(StopReason::Stopped);
            return Control::Quit;
        }

        if self.app.current().is_some_and(|a| a.is_counting_down()) {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.app.force_stop(StopReason::Stopped);
                }
                _ => {}
            }
            return Control::Continue;
        }

        let running = self.app.session().is_some_and(|s| s.is_running());
        if running {
            match key.code {
                KeyCode::Char(c) => {
                    let limit = self.app.session().map_or(0, |s| s.text_length());
                    if self.typed.chars().count() < limit {
                        self.typed.push(c);
                        self.app.submit_input(&self.typed);
                    }
                }
                KeyCode::Backspace => {
                    self.typed.pop();
                    self.app.submit_input(&self.typed);
                }
                KeyCode::Enter => {
                    self.app.force_stop(StopReason::Submitted);
                }
                KeyCode::Esc => {
                    self.app.force_stop(StopReason::Stopped);
                }
                _ => {}
            }
            return Control::Continue;
        }

        match key.code {
            KeyCode::Char('r') => match self.app.retry() {
                Ok(_) => {
                    self.typed.clear();
                    Control::Restarted
                }
                Err(e) => {
                    warn!(error = %e, "retry failed");
                    Control::Continue
                }
            },
            KeyCode::Char('q') | KeyCode::Esc => Control::Quit,
            _ => Control::Continue,
        }
    }

    fn handle_event(&mut self, event: AppEvent, tx: &Sender<AppEvent>) -> Control {
        match event {
            AppEvent::Key(key) => {
                let control = self.handle_key(key);
                if control == Control::Restarted {
                    self.app.schedule_timers(tx);
                }
                control
            }
            AppEvent::ClockTick => {
                self.app.tick_clock();
                Control::Continue
            }
            AppEvent::BotTick => {
                self.app.tick_bot();
                Control::Continue
            }
            AppEvent::Resize | AppEvent::Frame => Control::Continue,
        }
    }
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, mut tui: Tui) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(FRAME_MS),
    );
    let tx = runner.sender();
    tui.app.schedule_timers(&tx);

    loop {
        terminal.draw(|f| f.render_widget(&tui.app, f.area()))?;
        if tui.handle_event(runner.step(), &tx) == Control::Quit {
            break;
        }
    }
    Ok(())
}
