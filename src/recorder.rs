//! Persistence for finished sessions: a rolling history and profile aggregates.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app_dirs::AppDirs;
use crate::error::QkResult;
use crate::race::RaceOutcome;
use crate::session::{ResultSnapshot, SessionMode};
use crate::timer_policy::Difficulty;

/// Entries kept in the rolling history
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

const TEXT_SAMPLE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Local>,
    pub mode: SessionMode,
    pub difficulty: Option<Difficulty>,
    pub race_outcome: Option<RaceOutcome>,
    pub opponent: Option<String>,
    pub text_sample: String,
    pub result: ResultSnapshot,
}

impl HistoryEntry {
    pub fn new(result: ResultSnapshot, mode: SessionMode, text: &str) -> Self {
        Self {
            recorded_at: Local::now(),
            mode,
            difficulty: None,
            race_outcome: None,
            opponent: None,
            text_sample: text_sample(text),
            result,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_race(mut self, outcome: RaceOutcome, opponent: &str) -> Self {
        self.race_outcome = Some(outcome);
        self.opponent = Some(opponent.to_string());
        self
    }
}

fn text_sample(text: &str) -> String {
    if text.chars().count() > TEXT_SAMPLE_CHARS {
        let head: String = text.chars().take(TEXT_SAMPLE_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Running aggregates over every recorded session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub total_games: u32,
    pub avg_wpm: u32,
    pub best_wpm: u32,
    pub avg_accuracy: u32,
    pub best_accuracy: u32,
    pub total_time_secs: u64,
    pub races_won: u32,
}

/// `round((old_avg * old_count + value) / (old_count + 1))`
pub fn running_average(old_avg: u32, old_count: u32, value: u32) -> u32 {
    let total = old_avg as f64 * old_count as f64 + value as f64;
    (total / (old_count as f64 + 1.0)).round() as u32
}

impl ProfileStats {
    pub fn apply(&mut self, entry: &HistoryEntry) {
        let result = &entry.result;
        self.avg_wpm = running_average(self.avg_wpm, self.total_games, result.wpm);
        self.avg_accuracy =
            running_average(self.avg_accuracy, self.total_games, result.accuracy_percent);
        self.best_wpm = self.best_wpm.max(result.wpm);
        self.best_accuracy = self.best_accuracy.max(result.accuracy_percent);
        self.total_games += 1;
        self.total_time_secs += result.elapsed_secs.round().max(0.0) as u64;
        if entry.race_outcome == Some(RaceOutcome::PlayerWon) {
            self.races_won += 1;
        }
    }
}

/// Receives terminal snapshots for persistence.
pub trait ResultRecorder {
    /// Stores the entry and returns the updated aggregates.
    fn record(&mut self, entry: &HistoryEntry) -> QkResult<ProfileStats>;

    /// Most recent entries first.
    fn history(&self, limit: usize) -> QkResult<Vec<HistoryEntry>>;

    fn profile(&self) -> QkResult<ProfileStats>;
}

/// SQLite-backed recorder
#[derive(Debug)]
pub struct SqliteRecorder {
    conn: Connection,
    history_limit: usize,
}

impl SqliteRecorder {
    /// Opens the database at the default state location
    pub fn open_default(history_limit: usize) -> QkResult<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("quickkeys_stats.db"));
        Self::open(path, history_limit)
    }

    pub fn open<P: AsRef<Path>>(path: P, history_limit: usize) -> QkResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, history_limit)
    }

    pub fn open_in_memory(history_limit: usize) -> QkResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, history_limit)
    }

    fn with_connection(conn: Connection, history_limit: usize) -> QkResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                mode TEXT NOT NULL,
                difficulty TEXT,
                race_outcome TEXT,
                opponent TEXT,
                text_sample TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                errors INTEGER NOT NULL,
                correct_chars INTEGER NOT NULL,
                elapsed_secs REAL NOT NULL,
                end_reason TEXT NOT NULL,
                text_length INTEGER NOT NULL,
                consistency REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS profile (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total_games INTEGER NOT NULL,
                avg_wpm INTEGER NOT NULL,
                best_wpm INTEGER NOT NULL,
                avg_accuracy INTEGER NOT NULL,
                best_accuracy INTEGER NOT NULL,
                total_time_secs INTEGER NOT NULL,
                races_won INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn,
            history_limit: history_limit.max(1),
        })
    }

    fn load_profile(conn: &Connection) -> QkResult<ProfileStats> {
        let stats = conn
            .query_row(
                r#"
                SELECT total_games, avg_wpm, best_wpm, avg_accuracy, best_accuracy,
                       total_time_secs, races_won
                FROM profile WHERE id = 1
                "#,
                [],
                |row| {
                    Ok(ProfileStats {
                        total_games: row.get(0)?,
                        avg_wpm: row.get(1)?,
                        best_wpm: row.get(2)?,
                        avg_accuracy: row.get(3)?,
                        best_accuracy: row.get(4)?,
                        total_time_secs: row.get::<_, i64>(5)? as u64,
                        races_won: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(stats.unwrap_or_default())
    }

    fn insert_entry(tx: &Transaction, entry: &HistoryEntry) -> QkResult<()> {
        let r = &entry.result;
        tx.execute(
            r#"
            INSERT INTO history
            (recorded_at, mode, difficulty, race_outcome, opponent, text_sample,
             wpm, accuracy, errors, correct_chars, elapsed_secs, end_reason,
             text_length, consistency)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                entry.recorded_at.to_rfc3339(),
                to_sql_text(&entry.mode)?,
                entry.difficulty.as_ref().map(to_sql_text).transpose()?,
                entry.race_outcome.as_ref().map(to_sql_text).transpose()?,
                entry.opponent,
                entry.text_sample,
                r.wpm,
                r.accuracy_percent,
                r.errors as i64,
                r.correct_chars as i64,
                r.elapsed_secs,
                to_sql_text(&r.end_reason)?,
                r.text_length as i64,
                r.consistency,
            ],
        )?;
        Ok(())
    }

    fn store_profile(tx: &Transaction, stats: &ProfileStats) -> QkResult<()> {
        tx.execute(
            r#"
            INSERT OR REPLACE INTO profile
            (id, total_games, avg_wpm, best_wpm, avg_accuracy, best_accuracy,
             total_time_secs, races_won)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                stats.total_games,
                stats.avg_wpm,
                stats.best_wpm,
                stats.avg_accuracy,
                stats.best_accuracy,
                stats.total_time_secs as i64,
                stats.races_won,
            ],
        )?;
        Ok(())
    }

    /// Removes every entry and resets the aggregates
    pub fn clear(&self) -> QkResult<()> {
        self.conn
            .execute_batch("DELETE FROM history; DELETE FROM profile;")?;
        Ok(())
    }
}

impl ResultRecorder for SqliteRecorder {
    fn record(&mut self, entry: &HistoryEntry) -> QkResult<ProfileStats> {
        let mut stats = Self::load_profile(&self.conn)?;
        stats.apply(entry);

        let tx = self.conn.transaction()?;
        Self::insert_entry(&tx, entry)?;
        tx.execute(
            "DELETE FROM history WHERE id NOT IN (SELECT id FROM history ORDER BY id DESC LIMIT ?1)",
            [self.history_limit as i64],
        )?;
        Self::store_profile(&tx, &stats)?;
        tx.commit()?;

        info!(
            wpm = entry.result.wpm,
            games = stats.total_games,
            avg_wpm = stats.avg_wpm,
            "result recorded"
        );
        Ok(stats)
    }

    fn history(&self, limit: usize) -> QkResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT recorded_at, mode, difficulty, race_outcome, opponent, text_sample,
                   wpm, accuracy, errors, correct_chars, elapsed_secs, end_reason,
                   text_length, consistency
            FROM history
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], entry_from_row)?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn profile(&self) -> QkResult<ProfileStats> {
        Self::load_profile(&self.conn)
    }
}

fn entry_from_row(row: &Row) -> rusqlite::Result<HistoryEntry> {
    let recorded_at: String = row.get(0)?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?
        .with_timezone(&Local);

    let difficulty: Option<String> = row.get(2)?;
    let race_outcome: Option<String> = row.get(3)?;

    Ok(HistoryEntry {
        recorded_at,
        mode: from_sql_text(1, row.get(1)?)?,
        difficulty: difficulty.map(|d| from_sql_text(2, d)).transpose()?,
        race_outcome: race_outcome.map(|o| from_sql_text(3, o)).transpose()?,
        opponent: row.get(4)?,
        text_sample: row.get(5)?,
        result: ResultSnapshot {
            wpm: row.get(6)?,
            accuracy_percent: row.get(7)?,
            errors: row.get::<_, i64>(8)? as usize,
            correct_chars: row.get::<_, i64>(9)? as usize,
            elapsed_secs: row.get(10)?,
            end_reason: from_sql_text(11, row.get(11)?)?,
            text_length: row.get::<_, i64>(12)? as usize,
            consistency: row.get(13)?,
        },
    })
}

/// Unit enums are stored by their serde name
fn to_sql_text<T: Serialize>(value: &T) -> QkResult<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn from_sql_text<T: DeserializeOwned>(idx: usize, text: String) -> rusqlite::Result<T> {
    serde_json::from_value(serde_json::Value::String(text))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    mode: SessionMode,
    difficulty: Option<Difficulty>,
    wpm: u32,
    accuracy: u32,
    errors: usize,
    elapsed_secs: String,
    end_reason: crate::session::EndReason,
    text_length: usize,
    race_outcome: Option<RaceOutcome>,
    opponent: Option<&'a str>,
}

/// Writes entries as CSV with a header row
pub fn export_csv<W: Write>(entries: &[HistoryEntry], writer: W) -> QkResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for entry in entries {
        wtr.serialize(CsvRow {
            date: entry.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            mode: entry.mode,
            difficulty: entry.difficulty,
            wpm: entry.result.wpm,
            accuracy: entry.result.accuracy_percent,
            errors: entry.result.errors,
            elapsed_secs: format!("{:.2}", entry.result.elapsed_secs),
            end_reason: entry.result.end_reason,
            text_length: entry.result.text_length,
            race_outcome: entry.race_outcome,
            opponent: entry.opponent.as_deref(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
