pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, Gauge, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{ActiveSession, App},
    race::{Race, RaceOutcome, RacePhase},
    session::{Outcome, Session},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width <= HORIZONTAL_MARGIN * 2 || area.height == 0 {
            return;
        }
        match self.current() {
            None => {
                Paragraph::new(Span::styled(
                    "no session - (q)uit",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
                ))
                .alignment(Alignment::Center)
                .render(area, buf);
            }
            Some(active) if active.is_live() => render_typing(active, area, buf),
            Some(active) => render_results(self, active, area, buf),
        }
    }
}

/// Target text colored by what has been typed so far
pub fn prompt_spans(session: &Session) -> Vec<Span<'static>> {
    let green = bold().fg(Color::Green);
    let red = bold().fg(Color::Red);
    let chars: Vec<char> = session.target_text().chars().collect();

    let mut spans: Vec<Span<'static>> = session
        .outcomes()
        .iter()
        .zip(chars.iter())
        .map(|(outcome, expected)| match outcome {
            Outcome::Correct => Span::styled(expected.to_string(), green),
            Outcome::Incorrect => Span::styled(
                match expected {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                },
                red,
            ),
        })
        .collect();

    let cursor = session.typed_len().min(chars.len());
    if let Some(c) = chars.get(cursor) {
        spans.push(Span::styled(
            c.to_string(),
            dim_bold().add_modifier(Modifier::UNDERLINED),
        ));
    }
    if cursor + 1 < chars.len() {
        let rest: String = chars[cursor + 1..].iter().collect();
        spans.push(Span::styled(rest, dim_bold()));
    }
    spans
}

fn render_typing(active: &ActiveSession, area: Rect, buf: &mut Buffer) {
    let session = active.session();
    let max_chars_per_line = (area.width - HORIZONTAL_MARGIN * 2) as usize;
    let text_width = session.target_text().width();
    let prompt_lines = if text_width <= max_chars_per_line {
        1
    } else {
        (text_width.div_ceil(max_chars_per_line) + 1) as u16
    };
    let race_lines = if active.race().is_some() { 4 } else { 0 };
    let padding = area.height.saturating_sub(prompt_lines + race_lines + 2) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(race_lines),
            Constraint::Length(2),
            Constraint::Length(prompt_lines),
            Constraint::Min(0),
        ])
        .split(area);

    if let Some(race) = active.race() {
        render_race_bars(race, chunks[1], buf);
    }

    let status = match active.race().and_then(Race::countdown_remaining) {
        Some(remaining) => Span::styled(
            format!("race starts in {remaining}"),
            bold().fg(Color::Yellow),
        ),
        None => {
            let metrics = session.metrics();
            Span::styled(
                format!(
                    "{}s   {} wpm   {}% acc   {} err",
                    metrics.time_remaining_secs,
                    metrics.wpm,
                    metrics.accuracy_percent,
                    metrics.errors
                ),
                dim_bold(),
            )
        }
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(Line::from(prompt_spans(session)))
        .alignment(if prompt_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);
}

fn render_race_bars(race: &Race, area: Rect, buf: &mut Buffer) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Length(2)])
        .split(area);

    let session = race.session();
    let bot = race.bot();
    let (you_color, bot_color) = if race.player_leading() {
        (Color::Green, Color::Magenta)
    } else {
        (Color::Cyan, Color::Green)
    };

    Gauge::default()
        .gauge_style(Style::default().fg(you_color))
        .label(format!("you  {}%", session.progress_percent()))
        .percent(session.progress_percent().min(100) as u16)
        .render(rows[0], buf);

    let snapshot = bot.snapshot();
    Gauge::default()
        .gauge_style(Style::default().fg(bot_color))
        .label(format!(
            "{} {}  {}% ({} wpm)",
            bot.profile().avatar,
            bot.profile().name,
            snapshot.progress_percent,
            snapshot.wpm
        ))
        .percent(snapshot.progress_percent.min(100) as u16)
        .render(rows[1], buf);
}

fn render_results(app: &App, active: &ActiveSession, area: Rect, buf: &mut Buffer) {
    let session = active.session();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // race / profile summary
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let points: Vec<(f64, f64)> = session
        .wpm_coords()
        .iter()
        .copied()
        .map(Into::into)
        .collect();
    let (overall_duration, highest_wpm) =
        charting::compute_chart_params(&points, Some(session.total_secs() as f64));

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&points)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, overall_duration])
                .labels(vec![
                    Span::styled("1", bold()),
                    Span::styled(charting::format_label(overall_duration), bold()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(highest_wpm), bold()),
                ]),
        )
        .render(chunks[0], buf);

    if let Some(result) = session.result() {
        Paragraph::new(Span::styled(
            format!(
                "{} wpm   {}% acc   {} err   {:.2} sd   {}",
                result.wpm,
                result.accuracy_percent,
                result.errors,
                result.consistency,
                result.end_reason
            ),
            bold(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
    }

    let summary = match active.race().and_then(|race| race.outcome().map(|o| (race, o))) {
        Some((race, RaceOutcome::PlayerWon)) => {
            format!("you beat {}!", race.bot().profile().name)
        }
        Some((race, RaceOutcome::BotWon)) => {
            format!("{} won this one", race.bot().profile().name)
        }
        None => match app.last_profile() {
            Some(profile) => format!(
                "{} games   avg {} wpm   best {} wpm",
                profile.total_games, profile.avg_wpm, profile.best_wpm
            ),
            None => String::new(),
        },
    };
    Paragraph::new(Span::styled(
        summary,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    if active.race().is_some_and(|race| race.phase() == RacePhase::Abandoned) {
        Paragraph::new(Span::styled("race called off", bold()))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    }

    let legend = if active.race().is_some() {
        "(r)ematch / (q)uit"
    } else {
        "(r)etry / (q)uit"
    };
    Paragraph::new(Span::styled(
        legend,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}
